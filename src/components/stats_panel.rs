use crate::impact::{ImpactStats, Pm25Estimate};
use crate::util::fixed;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct StatsPanelProps {
    pub stats: Option<ImpactStats>,
    /// A backend query for the current region is still out.
    #[prop_or(false)]
    pub pending: bool,
}

fn tree_benefits() -> Html {
    html! {<>
        <div style="font-weight:600; font-size:15px;">{"Tree Benefits"}</div>
        <div><b>{"How Much CO2 Does A Tree Absorb?"}</b></div>
        <div>{"On average, each tree absorbs 10 kilograms/22 pounds of CO2 per year"}</div>
        <hr style="border-color:#30363d; width:100%;" />
        <div><b>{"How much pollutant (PM₂.₅) can a tree remove?"}</b></div>
        <div>{"An urban tree removes 0.015 kg (15 g) PM₂.₅ pollutant per year"}</div>
        <div>{"1 hectare of healthy tree canopy can remove ≈ 4.7 kg of PM2.5 per year"}</div>
    </>}
}

#[function_component]
pub fn StatsPanel(props: &StatsPanelProps) -> Html {
    let row_style = "display:flex; justify-content:space-between; gap:12px;";
    let value_style = "font-variant-numeric:tabular-nums; font-weight:600;";
    let body = match &props.stats {
        None => tree_benefits(),
        Some(s) => {
            let pm25 = match s.pm25 {
                Pm25Estimate::Canopy {
                    canopy_hectares,
                    kg,
                    tonnes,
                    ..
                } => html! {<>
                    <div>{ format!("An estimated {}ha canopy area are detected in the selection.", fixed(canopy_hectares, 2)) }</div>
                    <div>{ format!("The canopy removed approximately {} kg ({} tonnes) pollution (PM₂.₅) per year", fixed(kg, 2), fixed(tonnes, 4)) }</div>
                </>},
                Pm25Estimate::PerTree { kg, tonnes } => html! {
                    <div>{ format!("The selected area removed approximately {} kg ({} tonnes) pollution (PM₂.₅) per year", fixed(kg, 2), fixed(tonnes, 4)) }</div>
                },
            };
            html! {<>
                <div style="font-weight:600; font-size:15px;">{"Selected Area"}</div>
                <div style={row_style}><span>{"Area"}</span><span style={value_style}>{ format!("{} Acre", fixed(s.acres, 0)) }</span></div>
                <div style={row_style}><span>{"Model Selected"}</span><span style={value_style}>{ s.active_models }</span></div>
                <div style={row_style}><span>{"Avg Tree Count"}</span><span style={value_style}>{ fixed(s.avg_tree_count, 0) }</span></div>
                <div style={row_style}><span>{"Density"}</span><span style={value_style}>{ format!("{} (count/hectare)", fixed(s.avg_density, 2)) }</span></div>
                <hr style="border-color:#30363d; width:100%;" />
                <div>{ format!("The selected area absorbed a total of {} kg ({} tonnes) CO₂ per year", fixed(s.co2_kg, 2), fixed(s.co2_tonnes, 2)) }</div>
                <hr style="border-color:#30363d; width:100%;" />
                { pm25 }
            </>}
        }
    };
    html! {
        <div style="position:absolute; top:12px; right:12px; background:rgba(22,27,34,0.9); border:1px solid #30363d; border-radius:8px; padding:10px 14px; width:270px; display:flex; flex-direction:column; gap:6px; font-size:13px; line-height:1.35;">
            { body }
            { if props.pending { html!{ <div style="font-size:11px; opacity:0.7;">{"Updating..."}</div> } } else { html!{} } }
        </div>
    }
}
