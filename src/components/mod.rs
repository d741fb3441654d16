pub mod app;
pub mod legend;
pub mod legend_panel;
pub mod loading_overlay;
pub mod map_view;
pub mod model_menu;
pub mod notice_overlay;
pub mod settings_modal;
pub mod stats_panel;
pub mod tool_panel;
