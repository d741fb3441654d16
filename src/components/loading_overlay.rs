use crate::registry::LoadProgress;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct LoadingOverlayProps {
    pub progress: LoadProgress,
}

#[function_component(LoadingOverlay)]
pub fn loading_overlay(props: &LoadingOverlayProps) -> Html {
    if props.progress.is_done() {
        return html! {};
    }
    let pct = props.progress.percent();
    html! {
        <div style="position:absolute; top:50%; left:50%; transform:translate(-50%, -50%); background:rgba(0,0,0,0.85); border:2px solid #30363d; padding:18px 28px; border-radius:12px; text-align:center; min-width:260px;">
            <div style="font-size:16px; margin-bottom:10px;">{ format!("Loading models... {}%", pct) }</div>
            <div style="height:6px; background:#30363d; border-radius:3px; overflow:hidden;">
                <div style={format!("height:100%; width:{}%; background:#2ea043;", pct)}></div>
            </div>
        </div>
    }
}
