// Mouse drag tracking for the map canvas.

/// Pixels a press may wander before it stops counting as a click.
pub const CLICK_SLOP_PX: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragTarget {
    #[default]
    None,
    Map,
    /// The selection rectangle is being moved by its body.
    Rectangle,
}

#[derive(Default, Debug, Clone)]
pub struct PointerState {
    pub target: DragTarget,
    pub start_x: f64,
    pub start_y: f64,
    pub last_x: f64,
    pub last_y: f64,
    pub moved: bool,
}

impl PointerState {
    pub fn press(&mut self, target: DragTarget, x: f64, y: f64) {
        self.target = target;
        self.start_x = x;
        self.start_y = y;
        self.last_x = x;
        self.last_y = y;
        self.moved = false;
    }

    /// Returns the delta since the last move while a drag is in progress.
    pub fn drag_to(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        if self.target == DragTarget::None {
            return None;
        }
        let delta = (x - self.last_x, y - self.last_y);
        self.last_x = x;
        self.last_y = y;
        if (x - self.start_x).hypot(y - self.start_y) > CLICK_SLOP_PX {
            self.moved = true;
        }
        Some(delta)
    }

    /// Ends the drag; returns what was dragged and whether it was a plain click.
    pub fn release(&mut self) -> (DragTarget, bool) {
        let target = std::mem::take(&mut self.target);
        (target, target != DragTarget::None && !self.moved)
    }
}
