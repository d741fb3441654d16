use crate::config::BaseLayer;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct SettingsModalProps {
    pub show: bool,
    pub on_close: Callback<()>,
    pub base_layer: BaseLayer,
    pub on_base_layer: Callback<BaseLayer>,
    pub show_blocks: bool,
    pub on_toggle_blocks: Callback<()>,
}

#[function_component]
pub fn SettingsModal(props: &SettingsModalProps) -> Html {
    if !props.show {
        return html! {};
    }

    let close_cb = {
        let cb = props.on_close.clone();
        Callback::from(move |_| cb.emit(()))
    };
    let toggle_blocks_cb = {
        let cb = props.on_toggle_blocks.clone();
        Callback::from(move |_| cb.emit(()))
    };
    let layers = BaseLayer::ALL.into_iter().map(|layer| {
        let cb = props.on_base_layer.clone();
        let onclick = Callback::from(move |_| cb.emit(layer));
        html! {
            <label style="display:flex; align-items:center; gap:8px; cursor:pointer;">
                <input type="radio" name="base-layer" checked={props.base_layer == layer} onclick={onclick} />
                <span>{ layer.label() }</span>
            </label>
        }
    });

    html! {<div style="position:absolute; inset:0; display:flex; align-items:center; justify-content:center; background:rgba(0,0,0,0.55); z-index:50;">
        <div style="background:#161b22; border:1px solid #30363d; border-radius:12px; padding:16px 20px; min-width:300px; max-width:420px; display:flex; flex-direction:column; gap:14px;">
            <div style="display:flex; justify-content:space-between; align-items:center;">
                <h3 style="margin:0; font-size:18px;">{"Map Settings"}</h3>
                <button onclick={close_cb.clone()} style="padding:4px 8px;">{"Close"}</button>
            </div>
            <div style="display:flex; flex-direction:column; gap:8px;">
                <div style="font-weight:600;">{"Base Layer"}</div>
                { for layers }
            </div>
            <label style="display:flex; align-items:center; gap:8px; cursor:pointer;">
                <input type="checkbox" checked={props.show_blocks} onclick={toggle_blocks_cb} />
                <span>{"Show Census Blocks"}</span>
            </label>
            <div style="display:flex; justify-content:flex-end;">
                <button onclick={close_cb}>{"Done"}</button>
            </div>
        </div>
    </div>}
}
