use crate::density::LegendEntry;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct LegendRowProps {
    pub entry: LegendEntry,
    pub bin: usize,
}

// One density bin: swatch, range label, tooltip naming the bin
#[function_component(LegendRow)]
pub fn legend_row(props: &LegendRowProps) -> Html {
    let LegendEntry { color, label } = &props.entry;
    let title = format!("Density class {}: {} trees/ha", props.bin + 1, label);
    html! {
        <div title={title} style="display:flex; align-items:center; gap:6px; margin:2px 0;">
            <i style={format!("display:inline-block; width:18px; height:12px; background:{}; opacity:0.8;", color)}></i>
            <span style="font-variant-numeric:tabular-nums;">{ label.clone() }</span>
        </div>
    }
}
