use crate::model::{Notice, TOO_LARGE_TEXT};
use crate::state::Viewport;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct NoticeOverlayProps {
    pub notice: Option<Notice>,
    pub viewport: Viewport,
    pub on_dismiss: Callback<()>,
}

#[function_component]
pub fn NoticeOverlay(props: &NoticeOverlayProps) -> Html {
    let Some(notice) = &props.notice else {
        return html! {};
    };
    let dismiss = {
        let cb = props.on_dismiss.clone();
        Callback::from(move |_| cb.emit(()))
    };
    match notice {
        Notice::TooLarge { at } => {
            let (x, y) = props.viewport.to_screen(*at);
            html! {
                <div style={format!("position:absolute; left:{:.0}px; top:{:.0}px; transform:translate(-50%, calc(-100% - 10px)); background:#fff; color:#222; border-radius:8px; padding:10px 28px 10px 12px; max-width:260px; font-size:13px; line-height:1.35; box-shadow:0 3px 14px rgba(0,0,0,0.4);", x, y)}>
                    <button onclick={dismiss} style="position:absolute; top:2px; right:4px; background:none; border:none; color:#757575; cursor:pointer;">{"×"}</button>
                    { TOO_LARGE_TEXT }
                </div>
            }
        }
        Notice::Error(msg) => html! {
            <div style="position:absolute; top:12px; left:50%; transform:translateX(-50%); background:rgba(0,0,0,0.85); border:2px solid #f85149; padding:8px 14px; border-radius:10px; display:flex; gap:12px; align-items:center; font-size:13px;">
                <span style="color:#f85149;">{ msg.clone() }</span>
                <button onclick={dismiss}>{"Dismiss"}</button>
            </div>
        },
    }
}
