use super::legend::LegendRow;
use crate::density::{legend_entries, DensityBreaks};
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct LegendPanelProps {
    pub breaks: DensityBreaks,
    /// Blocks are drawn blank while no model is active, so the legend hides too.
    pub any_active: bool,
    pub show_blocks: bool,
}

#[function_component]
pub fn LegendPanel(props: &LegendPanelProps) -> Html {
    let entries = legend_entries(&props.breaks);
    if !props.any_active || !props.show_blocks || entries.is_empty() {
        return html! {};
    }
    html! {<div style="position:absolute; right:12px; bottom:24px; background:rgba(22,27,34,0.9); border:1px solid #30363d; border-radius:8px; padding:8px 10px; min-width:150px; font-size:12px;">
        <div style="font-weight:600; margin-bottom:6px; line-height:1.3;">{"Census Blocks"}<br/>{"Tree Density"}<br/>{"(trees/ha)"}</div>
        { for entries.into_iter().enumerate().map(|(bin, entry)| html!{ <LegendRow entry={entry} bin={bin} /> }) }
    </div>}
}
