use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use super::{
    legend_panel::LegendPanel, loading_overlay::LoadingOverlay, map_view::MapView,
    model_menu::{ModelMenu, ModelRow}, notice_overlay::NoticeOverlay,
    settings_modal::SettingsModal, stats_panel::StatsPanel, tool_panel::ToolPanel,
};
use crate::cache::{LocalStorageStore, MemoryStore};
use crate::config::{BaseLayer, ViewerConfig};
use crate::model::{ModelId, ViewerAction, ViewerState};
use crate::service::{fetch_blocks, load_dataset, ApiClient};
use crate::tools::Tool;
use crate::util::{clog, cwarn, now_ms};

const BASE_LAYER_KEY: &str = "gc_setting_base_layer";
const SHOW_BLOCKS_KEY: &str = "gc_setting_show_blocks";

fn read_setting(key: &str) -> Option<String> {
    web_sys::window()?.local_storage().ok().flatten()?.get_item(key).ok().flatten()
}

fn write_setting(key: &str, value: &str) {
    if let Some(win) = web_sys::window() {
        if let Ok(Some(store)) = win.local_storage() {
            let _ = store.set_item(key, value);
        }
    }
}

async fn load_model(viewer: UseReducerHandle<ViewerState>, config: Rc<ViewerConfig>, model: ModelId) {
    if !config.backend.is_local() {
        viewer.dispatch(ViewerAction::ModelServed(model));
        return;
    }
    viewer.dispatch(ViewerAction::ModelLoadStarted(model.clone()));
    let started = now_ms();
    let result = match LocalStorageStore::open() {
        Some(store) => load_dataset(&store, &config.backend, &model).await,
        None => load_dataset(&MemoryStore::new(), &config.backend, &model).await,
    };
    match result {
        Ok(dataset) => {
            clog(&format!(
                "{}: {} features ready in {:.0} ms",
                model,
                dataset.features.len(),
                now_ms() - started
            ));
            viewer.dispatch(ViewerAction::ModelLoaded(dataset));
        }
        Err(e) => {
            cwarn(&format!("{}: load failed ({})", model, e));
            viewer.dispatch(ViewerAction::ModelLoadFailed {
                model,
                reason: e.to_string(),
            });
        }
    }
}

#[function_component(App)]
pub fn app() -> Html {
    let viewer = use_reducer(ViewerState::default);
    let base_layer_choice = use_state(|| read_setting(BASE_LAYER_KEY).and_then(|v| BaseLayer::from_key(&v)));
    let show_blocks = use_state(|| {
        read_setting(SHOW_BLOCKS_KEY).map_or(true, |v| !(v == "0" || v == "false"))
    });
    let open_settings = use_state(|| false);

    // Startup: config, then census blocks and every model in parallel
    {
        let viewer = viewer.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                let config = Rc::new(ViewerConfig::load().await);
                viewer.dispatch(ViewerAction::Configure(config.clone()));
                {
                    let viewer = viewer.clone();
                    let url = config.blocks_url.clone();
                    spawn_local(async move {
                        match fetch_blocks(&url).await {
                            Ok(blocks) => {
                                clog(&format!("{} census blocks loaded", blocks.len()));
                                viewer.dispatch(ViewerAction::BlocksLoaded(blocks));
                            }
                            Err(e) => {
                                cwarn(&format!("census blocks: {}", e));
                                viewer.dispatch(ViewerAction::BlocksFailed(e.to_string()));
                            }
                        }
                    });
                }
                for d in &config.models {
                    spawn_local(load_model(viewer.clone(), config.clone(), d.id.clone()));
                }
            });
            || ()
        });
    }
    // Filter queries issued by the reducer
    {
        let viewer = viewer.clone();
        let pending = viewer.pending_filter.clone();
        let backend = viewer.config.backend.clone();
        use_effect_with(pending.as_ref().map(|p| p.tag), move |_| {
            if let Some(p) = pending {
                spawn_local(async move {
                    let client = ApiClient::new(backend);
                    match client.filtered_trees(&p.region, &p.models).await {
                        Ok(outcome) => viewer.dispatch(ViewerAction::FilterResponse { tag: p.tag, outcome }),
                        Err(e) => {
                            cwarn(&format!("filter request failed: {}", e));
                            viewer.dispatch(ViewerAction::FilterFailed {
                                tag: p.tag,
                                reason: e.to_string(),
                            });
                        }
                    }
                });
            }
            || ()
        });
    }
    // Density queries issued by the reducer
    {
        let viewer = viewer.clone();
        let pending = viewer.pending_density.clone();
        let backend = viewer.config.backend.clone();
        use_effect_with(pending.as_ref().map(|p| p.tag), move |_| {
            if let Some(p) = pending {
                spawn_local(async move {
                    let client = ApiClient::new(backend);
                    match client.density(&p.models).await {
                        Ok(densities) => {
                            clog(&format!("densities for {} blocks", densities.len()));
                            viewer.dispatch(ViewerAction::DensityResponse { tag: p.tag, densities });
                        }
                        Err(e) => {
                            cwarn(&format!("density request failed: {}", e));
                            viewer.dispatch(ViewerAction::DensityFailed {
                                tag: p.tag,
                                reason: e.to_string(),
                            });
                        }
                    }
                });
            }
            || ()
        });
    }
    // Persist map settings
    {
        let choice = *base_layer_choice;
        use_effect_with(choice, move |_| {
            if let Some(layer) = choice {
                write_setting(BASE_LAYER_KEY, layer.key());
            }
            || ()
        });
    }
    {
        let flag = *show_blocks;
        use_effect_with(flag, move |_| {
            write_setting(SHOW_BLOCKS_KEY, if flag { "1" } else { "0" });
            || ()
        });
    }

    let on_toggle = {
        let viewer = viewer.clone();
        Callback::from(move |(model, on): (String, bool)| viewer.dispatch(ViewerAction::ToggleModel { model, on }))
    };
    let on_select_tool = {
        let viewer = viewer.clone();
        Callback::from(move |tool: Tool| viewer.dispatch(ViewerAction::SelectTool(tool)))
    };
    let on_dismiss = {
        let viewer = viewer.clone();
        Callback::from(move |_| viewer.dispatch(ViewerAction::DismissNotice))
    };
    let on_open_settings = {
        let open_settings = open_settings.clone();
        Callback::from(move |_| open_settings.set(true))
    };
    let on_close_settings = {
        let open_settings = open_settings.clone();
        Callback::from(move |_| open_settings.set(false))
    };
    let on_base_layer = {
        let base_layer_choice = base_layer_choice.clone();
        Callback::from(move |layer: BaseLayer| base_layer_choice.set(Some(layer)))
    };
    let on_toggle_blocks = {
        let show_blocks = show_blocks.clone();
        Callback::from(move |_| show_blocks.set(!*show_blocks))
    };

    let base_layer = base_layer_choice.unwrap_or(viewer.config.base_layer);
    html! {
        <div id="root" style="position:relative; width:100vw; height:100vh; overflow:hidden;">
            <MapView viewer={viewer.clone()} base_layer={base_layer} show_blocks={*show_blocks} />
            <ModelMenu rows={ModelRow::from_registry(&viewer.registry)} on_toggle={on_toggle} />
            <StatsPanel stats={viewer.stats} pending={viewer.pending_filter.is_some()} />
            <LegendPanel
                breaks={viewer.breaks.clone()}
                any_active={viewer.registry.active_count() > 0}
                show_blocks={*show_blocks}
            />
            <ToolPanel current={viewer.tool()} on_select={on_select_tool} on_open_settings={on_open_settings} />
            <NoticeOverlay notice={viewer.notice.clone()} viewport={viewer.viewport} on_dismiss={on_dismiss} />
            { if viewer.configured { html!{ <LoadingOverlay progress={viewer.registry.load_progress()} /> } } else { html!{} } }
            <SettingsModal
                show={*open_settings}
                on_close={on_close_settings}
                base_layer={base_layer}
                on_base_layer={on_base_layer}
                show_blocks={*show_blocks}
                on_toggle_blocks={on_toggle_blocks}
            />
        </div>
    }
}
