pub mod pointer;
pub mod viewport;

pub use pointer::{DragTarget, PointerState};
pub use viewport::Viewport;
