mod cache;
mod components;
mod config;
mod density;
mod error;
mod geojson;
mod geometry;
mod impact;
mod model;
mod registry;
mod render;
mod selection;
mod service;
mod state;
mod tools;
mod util;

use components::app::App;

fn main() {
    console_error_panic_hook::set_once();
    yew::Renderer::<App>::new().render();
}
