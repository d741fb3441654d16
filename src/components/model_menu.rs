use crate::model::{GeometryKind, ModelDescriptor};
use crate::registry::{LoadStatus, ModelRegistry};
use yew::prelude::*;

/// What the menu needs per model; kept apart from the registry so props stay cheap to compare.
#[derive(PartialEq, Clone)]
pub struct ModelRow {
    pub descriptor: ModelDescriptor,
    pub status: LoadStatus,
    pub active: bool,
}

impl ModelRow {
    pub fn from_registry(registry: &ModelRegistry) -> Vec<ModelRow> {
        registry
            .descriptors()
            .iter()
            .map(|d| ModelRow {
                descriptor: d.clone(),
                status: registry.status(&d.id).cloned().unwrap_or(LoadStatus::Pending),
                active: registry.is_active(&d.id),
            })
            .collect()
    }
}

#[derive(Properties, PartialEq, Clone)]
pub struct ModelMenuProps {
    pub rows: Vec<ModelRow>,
    pub on_toggle: Callback<(String, bool)>,
}

fn swatch(d: &ModelDescriptor) -> Html {
    let px = d.size * 4.0;
    let radius = match d.kind {
        GeometryKind::Point => "50%",
        GeometryKind::Polygon => "0",
    };
    html! { <span style={format!("display:inline-block; width:{}px; height:{}px; background:{}; border-radius:{}; flex-shrink:0;", px, px, d.color, radius)}></span> }
}

#[function_component]
pub fn ModelMenu(props: &ModelMenuProps) -> Html {
    let rows = props.rows.iter().map(|row| {
        let d = &row.descriptor;
        let status = &row.status;
        let suffix = match status {
            LoadStatus::Pending | LoadStatus::Loading => " (loading...)",
            LoadStatus::Failed(_) => " (failed)",
            LoadStatus::Ready { .. } => "",
        };
        let enabled = matches!(status, LoadStatus::Ready { .. });
        let checked = row.active;
        let onclick = {
            let cb = props.on_toggle.clone();
            let id = d.id.clone();
            Callback::from(move |_| cb.emit((id.clone(), !checked)))
        };
        let title = match status {
            LoadStatus::Failed(reason) => format!("{}\n\n{}", d.tooltip, reason),
            _ => d.tooltip.clone(),
        };
        html! {
            <label title={title} style={format!("display:flex; align-items:center; gap:8px; cursor:{}; opacity:{};", if enabled { "pointer" } else { "default" }, if enabled { 1.0 } else { 0.6 })}>
                <input type="checkbox" checked={checked} disabled={!enabled} onclick={onclick} />
                { swatch(d) }
                <span>{ format!("{}{}", d.label, suffix) }</span>
            </label>
        }
    });
    html! {<div style="position:absolute; top:12px; left:12px; background:rgba(22,27,34,0.9); border:1px solid #30363d; border-radius:8px; padding:10px 14px; min-width:230px; display:flex; flex-direction:column; gap:8px; font-size:13px;">
        <div style="font-weight:600;">{"Models"}</div>
        { for rows }
    </div>}
}
