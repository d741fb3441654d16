use crate::tools::Tool;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct ToolPanelProps {
    pub current: Tool,
    pub on_select: Callback<Tool>,
    pub on_open_settings: Callback<()>,
}

#[function_component(ToolPanel)]
pub fn tool_panel(props: &ToolPanelProps) -> Html {
    let settings_cb = {
        let cb = props.on_open_settings.clone();
        Callback::from(move |_| cb.emit(()))
    };
    let buttons = Tool::ALL.into_iter().map(|tool| {
        let cb = props.on_select.clone();
        let onclick = Callback::from(move |_| cb.emit(tool));
        let style = if tool == props.current {
            "background:#2ea043; border:1px solid #238636; color:#fff;"
        } else {
            ""
        };
        html! { <button onclick={onclick} style={style}>{ tool.label() }</button> }
    });
    html! {<div style="position:absolute; left:12px; bottom:24px; background:rgba(22,27,34,0.9); border:1px solid #30363d; border-radius:8px; padding:8px; display:flex; gap:6px; align-items:center;">
        { for buttons }
        <span style="width:8px;"></span>
        <button onclick={settings_cb}>{"Settings"}</button>
    </div>}
}
