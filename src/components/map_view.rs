use std::collections::HashMap;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlImageElement};
use yew::prelude::*;

use crate::config::BaseLayer;
use crate::model::{BlockId, Bounds, ViewerAction, ViewerState};
use crate::render::{build_scene, draw_scene, visible_tiles, CanvasSurface, MapSurface};
use crate::state::{DragTarget, PointerState};
use crate::tools::Tool;

const TILE_CACHE_LIMIT: usize = 512;

#[derive(Properties, PartialEq, Clone)]
pub struct MapViewProps {
    pub viewer: UseReducerHandle<ViewerState>,
    pub base_layer: BaseLayer,
    pub show_blocks: bool,
}

fn canvas_xy(canvas: &HtmlCanvasElement, e: &web_sys::MouseEvent) -> (f64, f64) {
    let r = canvas.get_bounding_client_rect();
    (e.client_x() as f64 - r.left(), e.client_y() as f64 - r.top())
}

fn tile_image(
    cache: &mut HashMap<String, HtmlImageElement>,
    url: &str,
    on_load: &js_sys::Function,
) -> Option<HtmlImageElement> {
    if let Some(img) = cache.get(url) {
        return Some(img.clone());
    }
    if cache.len() >= TILE_CACHE_LIMIT {
        cache.clear();
    }
    let img = HtmlImageElement::new().ok()?;
    img.set_onload(Some(on_load));
    img.set_src(url);
    cache.insert(url.to_string(), img.clone());
    Some(img)
}

#[function_component(MapView)]
pub fn map_view(props: &MapViewProps) -> Html {
    let canvas_ref = use_node_ref();
    // local camera: moves live while dragging, the reducer only hears about settled views
    let view = use_mut_ref(|| props.viewer.viewport);
    let pointer = use_mut_ref(PointerState::default);
    let hovered = use_mut_ref(|| None::<BlockId>);
    let drag_rect = use_mut_ref(|| None::<Bounds>);
    let tiles = use_mut_ref(HashMap::<String, HtmlImageElement>::new);
    let draw_ref = use_mut_ref(|| None::<Rc<dyn Fn()>>);
    let viewer_ref = use_mut_ref(|| props.viewer.clone());
    let settings = use_mut_ref(|| (props.base_layer, props.show_blocks));

    // Effect: base layer / block visibility
    {
        let draw_ref = draw_ref.clone();
        let settings = settings.clone();
        use_effect_with((props.base_layer, props.show_blocks), move |deps| {
            *settings.borrow_mut() = *deps;
            if let Some(f) = &*draw_ref.borrow() {
                f();
            }
            || ()
        });
    }
    // Effect: follow the reducer each version
    {
        let viewer_ref = viewer_ref.clone();
        let current_handle = props.viewer.clone();
        let view = view.clone();
        let pointer = pointer.clone();
        let draw_ref = draw_ref.clone();
        use_effect_with(props.viewer.version, move |_| {
            if pointer.borrow().target != DragTarget::Map {
                *view.borrow_mut() = current_handle.viewport;
            }
            *viewer_ref.borrow_mut() = current_handle;
            if let Some(f) = &*draw_ref.borrow() {
                f();
            }
            || ()
        });
    }
    // Main mount effect (canvas size, events)
    {
        let canvas_ref = canvas_ref.clone();
        let view = view.clone();
        let pointer = pointer.clone();
        let hovered = hovered.clone();
        let drag_rect = drag_rect.clone();
        let tiles = tiles.clone();
        let draw_ref_setup = draw_ref.clone();
        let viewer_ref = viewer_ref.clone();
        let settings = settings.clone();
        use_effect_with((), move |_| {
            let window = web_sys::window().expect("window");
            let canvas: HtmlCanvasElement = canvas_ref.cast::<HtmlCanvasElement>().expect("canvas");

            let fit_to_window: Rc<dyn Fn()> = {
                let canvas = canvas.clone();
                let window = window.clone();
                let view = view.clone();
                let viewer_ref = viewer_ref.clone();
                Rc::new(move || {
                    let width = window
                        .inner_width()
                        .ok()
                        .and_then(|v| v.as_f64())
                        .unwrap_or(800.0);
                    let height = window
                        .inner_height()
                        .ok()
                        .and_then(|v| v.as_f64())
                        .unwrap_or(600.0);
                    canvas.set_width(width.max(0.0) as u32);
                    canvas.set_height(height.max(0.0) as u32);
                    let next = view.borrow().resized(width, height);
                    *view.borrow_mut() = next;
                    let handle = viewer_ref.borrow().clone();
                    handle.dispatch(ViewerAction::ViewportChanged(next));
                })
            };

            // Tiles redraw the map as they arrive
            let tile_loaded_cb = {
                let draw_ref = draw_ref_setup.clone();
                Closure::wrap(Box::new(move || {
                    if let Some(f) = &*draw_ref.borrow() {
                        f();
                    }
                }) as Box<dyn FnMut()>)
            };

            // Draw closure
            let draw_closure: Rc<dyn Fn()> = {
                let canvas = canvas.clone();
                let view = view.clone();
                let viewer_ref = viewer_ref.clone();
                let settings = settings.clone();
                let hovered = hovered.clone();
                let drag_rect = drag_rect.clone();
                let tiles = tiles.clone();
                let on_tile: js_sys::Function = tile_loaded_cb.as_ref().unchecked_ref::<js_sys::Function>().clone();
                Rc::new(move || {
                    if !canvas.is_connected() {
                        return;
                    }
                    let Some(ctx) = CanvasSurface::context_2d(&canvas) else {
                        return;
                    };
                    let v = *view.borrow();
                    let (base, show_blocks) = *settings.borrow();
                    let handle = viewer_ref.borrow().clone();
                    let mut surface = CanvasSurface::new(&ctx, v);
                    surface.clear();
                    {
                        let mut cache = tiles.borrow_mut();
                        for tile in visible_tiles(&v, base.max_zoom()) {
                            let Some(url) = base.tile_url(tile.z, tile.x, tile.y) else {
                                break;
                            };
                            if let Some(img) = tile_image(&mut cache, &url, &on_tile) {
                                if img.complete() && img.natural_width() > 0 {
                                    surface.draw_tile(&img, &tile);
                                }
                            }
                        }
                    }
                    let hovered = hovered.borrow().clone();
                    let mut input = handle.scene_input(hovered.as_deref(), show_blocks);
                    if let Some(r) = *drag_rect.borrow() {
                        input.rectangle = Some(r);
                    }
                    draw_scene(&mut surface, &build_scene(&input));
                })
            };
            *draw_ref_setup.borrow_mut() = Some(draw_closure.clone());
            fit_to_window();
            (draw_closure)();

            // Wheel zoom
            let wheel_cb = {
                let view = view.clone();
                let viewer_ref = viewer_ref.clone();
                let draw_ref = draw_ref_setup.clone();
                Closure::wrap(Box::new(move |e: web_sys::WheelEvent| {
                    e.prevent_default();
                    let handle = viewer_ref.borrow().clone();
                    if handle.zoom_lock.is_some() {
                        return;
                    }
                    let v = *view.borrow();
                    let zoom_change = (-e.delta_y() * 0.001).exp();
                    let next = v.zoomed_around(e.offset_x() as f64, e.offset_y() as f64, v.zoom + zoom_change.log2());
                    *view.borrow_mut() = next;
                    if let Some(f) = &*draw_ref.borrow() {
                        f();
                    }
                    handle.dispatch(ViewerAction::ViewportChanged(next));
                }) as Box<dyn FnMut(_)>)
            };
            canvas
                .add_event_listener_with_callback("wheel", wheel_cb.as_ref().unchecked_ref())
                .ok();

            let mousedown_cb = {
                let canvas_md = canvas.clone();
                let view = view.clone();
                let viewer_ref = viewer_ref.clone();
                let pointer = pointer.clone();
                let drag_rect = drag_rect.clone();
                Closure::wrap(Box::new(move |e: web_sys::MouseEvent| {
                    if e.button() != 0 {
                        return;
                    }
                    let (x, y) = canvas_xy(&canvas_md, &e);
                    let at = view.borrow().to_lat_lng(x, y);
                    let handle = viewer_ref.borrow().clone();
                    let target = match (handle.tool(), handle.tools.rectangle()) {
                        (Tool::Rectangle, Some(r)) if r.contains(at) => {
                            *drag_rect.borrow_mut() = Some(r);
                            DragTarget::Rectangle
                        }
                        _ => DragTarget::Map,
                    };
                    pointer.borrow_mut().press(target, x, y);
                }) as Box<dyn FnMut(_)>)
            };
            canvas
                .add_event_listener_with_callback("mousedown", mousedown_cb.as_ref().unchecked_ref())
                .ok();

            let mousemove_cb = {
                let canvas_mm = canvas.clone();
                let view = view.clone();
                let viewer_ref = viewer_ref.clone();
                let pointer = pointer.clone();
                let hovered = hovered.clone();
                let drag_rect = drag_rect.clone();
                let draw_ref = draw_ref_setup.clone();
                Closure::wrap(Box::new(move |e: web_sys::MouseEvent| {
                    let (x, y) = canvas_xy(&canvas_mm, &e);
                    let dragged = pointer.borrow_mut().drag_to(x, y);
                    if let Some((dx, dy)) = dragged {
                        let target = pointer.borrow().target;
                        match target {
                            DragTarget::Map => {
                                let next = view.borrow().panned(dx, dy);
                                *view.borrow_mut() = next;
                            }
                            DragTarget::Rectangle => {
                                let v = *view.borrow();
                                let mut rect = drag_rect.borrow_mut();
                                if let Some(r) = *rect {
                                    let (cx, cy) = v.to_screen(r.center());
                                    *rect = Some(r.recentered(v.to_lat_lng(cx + dx, cy + dy)));
                                }
                            }
                            DragTarget::None => {}
                        }
                    } else {
                        let handle = viewer_ref.borrow().clone();
                        let at = view.borrow().to_lat_lng(x, y);
                        let id = handle.block_at(at).map(|b| b.id.clone());
                        if *hovered.borrow() == id {
                            return;
                        }
                        *hovered.borrow_mut() = id;
                    }
                    if let Some(f) = &*draw_ref.borrow() {
                        f();
                    }
                }) as Box<dyn FnMut(_)>)
            };
            canvas
                .add_event_listener_with_callback("mousemove", mousemove_cb.as_ref().unchecked_ref())
                .ok();

            let mouseleave_cb = {
                let hovered = hovered.clone();
                let draw_ref = draw_ref_setup.clone();
                Closure::wrap(Box::new(move |_e: web_sys::MouseEvent| {
                    if hovered.borrow_mut().take().is_some() {
                        if let Some(f) = &*draw_ref.borrow() {
                            f();
                        }
                    }
                }) as Box<dyn FnMut(_)>)
            };
            canvas
                .add_event_listener_with_callback("mouseleave", mouseleave_cb.as_ref().unchecked_ref())
                .ok();

            let mouseup_cb = {
                let view = view.clone();
                let viewer_ref = viewer_ref.clone();
                let pointer = pointer.clone();
                let drag_rect = drag_rect.clone();
                let draw_ref = draw_ref_setup.clone();
                Closure::wrap(Box::new(move |_e: web_sys::MouseEvent| {
                    let (target, click) = pointer.borrow_mut().release();
                    let (sx, sy) = {
                        let p = pointer.borrow();
                        (p.start_x, p.start_y)
                    };
                    let moved_rect = drag_rect.borrow_mut().take();
                    let v = *view.borrow();
                    let handle = viewer_ref.borrow().clone();
                    match target {
                        DragTarget::None => return,
                        _ if click => handle.dispatch(ViewerAction::MapClick(v.to_lat_lng(sx, sy))),
                        DragTarget::Map => handle.dispatch(ViewerAction::ViewportChanged(v)),
                        DragTarget::Rectangle => {
                            if let Some(r) = moved_rect {
                                handle.dispatch(ViewerAction::RectangleMoved(r.center()));
                            }
                        }
                    }
                    if let Some(f) = &*draw_ref.borrow() {
                        f();
                    }
                }) as Box<dyn FnMut(_)>)
            };
            window
                .add_event_listener_with_callback("mouseup", mouseup_cb.as_ref().unchecked_ref())
                .ok();

            let resize_cb = {
                let fit_to_window = fit_to_window.clone();
                let draw_ref = draw_ref_setup.clone();
                Closure::wrap(Box::new(move |_e: web_sys::Event| {
                    fit_to_window();
                    if let Some(f) = &*draw_ref.borrow() {
                        f();
                    }
                }) as Box<dyn FnMut(_)>)
            };
            window
                .add_event_listener_with_callback("resize", resize_cb.as_ref().unchecked_ref())
                .ok();

            // Cleanup
            let window_clone = window.clone();
            move || {
                let _ = canvas.remove_event_listener_with_callback(
                    "wheel",
                    wheel_cb.as_ref().unchecked_ref(),
                );
                let _ = canvas.remove_event_listener_with_callback(
                    "mousedown",
                    mousedown_cb.as_ref().unchecked_ref(),
                );
                let _ = canvas.remove_event_listener_with_callback(
                    "mousemove",
                    mousemove_cb.as_ref().unchecked_ref(),
                );
                let _ = canvas.remove_event_listener_with_callback(
                    "mouseleave",
                    mouseleave_cb.as_ref().unchecked_ref(),
                );
                let _ = window_clone.remove_event_listener_with_callback(
                    "mouseup",
                    mouseup_cb.as_ref().unchecked_ref(),
                );
                let _ = window_clone.remove_event_listener_with_callback(
                    "resize",
                    resize_cb.as_ref().unchecked_ref(),
                );
                for img in tiles.borrow().values() {
                    img.set_onload(None);
                }
                let _keep_alive = (
                    &tile_loaded_cb,
                    &wheel_cb,
                    &mousedown_cb,
                    &mousemove_cb,
                    &mouseleave_cb,
                    &mouseup_cb,
                    &resize_cb,
                );
            }
        });
    }

    html! { <canvas ref={canvas_ref} style="display:block; cursor:grab;" /> }
}
