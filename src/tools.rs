use std::rc::Rc;

use crate::model::{Bounds, CensusBlock, LatLng, RegionShape};
use crate::state::Viewport;

/// Half-extent of the fixed selection box (roughly 100 acres).
pub const RECT_HALF_LAT: f64 = 0.00286;
pub const RECT_HALF_LNG: f64 = 0.00345;
pub const RECTANGLE_ZOOM: f64 = 15.0;
pub const STREET_ZOOM: f64 = 18.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tool {
    #[default]
    Blocks,
    Rectangle,
    Street,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Blocks, Tool::Rectangle, Tool::Street];

    pub fn label(self) -> &'static str {
        match self {
            Tool::Blocks => "Census Blocks",
            Tool::Rectangle => "100 Acre Box",
            Tool::Street => "Street View",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    /// A click that did not turn into a drag. `block` is the census block under it, if any.
    Clicked {
        at: LatLng,
        block: Option<Rc<CensusBlock>>,
    },
    /// The selection rectangle was dropped with its centre at this location.
    RectangleMoved(LatLng),
    ViewSettled(Viewport),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolEffect {
    /// Drop the current region, its features and statistics.
    ClearRegion,
    Filter(RegionShape),
    SetZoom(f64),
    /// `Some(z)` pins the zoom level, `None` releases it.
    LockZoom(Option<f64>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolStateMachine {
    tool: Tool,
    selected_block: Option<Rc<CensusBlock>>,
    rectangle: Option<Bounds>,
    street: Option<Bounds>,
}

impl ToolStateMachine {
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn selected_block(&self) -> Option<&Rc<CensusBlock>> {
        self.selected_block.as_ref()
    }

    pub fn rectangle(&self) -> Option<Bounds> {
        self.rectangle
    }

    pub fn current_region(&self) -> Option<RegionShape> {
        match self.tool {
            Tool::Blocks => self.selected_block.clone().map(RegionShape::CensusBlock),
            Tool::Rectangle => self.rectangle.map(RegionShape::Rectangle),
            Tool::Street => self.street.map(RegionShape::StreetTile),
        }
    }

    pub fn switch(&mut self, to: Tool, view: &Viewport) -> Vec<ToolEffect> {
        if to == self.tool {
            return Vec::new();
        }
        let mut effects = vec![ToolEffect::ClearRegion];
        if self.tool == Tool::Street {
            effects.push(ToolEffect::LockZoom(None));
        }
        self.rectangle = None;
        self.street = None;
        self.tool = to;
        match to {
            Tool::Blocks => {
                // the block survives tool switches
                if let Some(block) = &self.selected_block {
                    effects.push(ToolEffect::Filter(RegionShape::CensusBlock(block.clone())));
                }
            }
            Tool::Rectangle => {
                let rect = Bounds::around(view.center, RECT_HALF_LAT, RECT_HALF_LNG);
                self.rectangle = Some(rect);
                effects.push(ToolEffect::SetZoom(RECTANGLE_ZOOM));
                effects.push(ToolEffect::Filter(RegionShape::Rectangle(rect)));
            }
            Tool::Street => {
                let tile = view.with_zoom(STREET_ZOOM).bounds();
                self.street = Some(tile);
                effects.push(ToolEffect::LockZoom(Some(STREET_ZOOM)));
                effects.push(ToolEffect::SetZoom(STREET_ZOOM));
                effects.push(ToolEffect::Filter(RegionShape::StreetTile(tile)));
            }
        }
        effects
    }

    pub fn handle(&mut self, event: MapEvent) -> Vec<ToolEffect> {
        match (self.tool, event) {
            (Tool::Blocks, MapEvent::Clicked { block: Some(block), .. }) => {
                self.selected_block = Some(block.clone());
                vec![ToolEffect::Filter(RegionShape::CensusBlock(block))]
            }
            (Tool::Blocks, MapEvent::ViewSettled(_)) => self
                .current_region()
                .map(ToolEffect::Filter)
                .into_iter()
                .collect(),
            (Tool::Rectangle, MapEvent::Clicked { at, .. })
            | (Tool::Rectangle, MapEvent::RectangleMoved(at)) => {
                let rect = match self.rectangle {
                    Some(r) => r.recentered(at),
                    None => Bounds::around(at, RECT_HALF_LAT, RECT_HALF_LNG),
                };
                self.rectangle = Some(rect);
                vec![ToolEffect::Filter(RegionShape::Rectangle(rect))]
            }
            (Tool::Rectangle, MapEvent::ViewSettled(_)) => self
                .rectangle
                .map(|r| ToolEffect::Filter(RegionShape::Rectangle(r)))
                .into_iter()
                .collect(),
            (Tool::Street, MapEvent::ViewSettled(view)) => {
                let tile = view.bounds();
                self.street = Some(tile);
                vec![ToolEffect::Filter(RegionShape::StreetTile(tile))]
            }
            _ => Vec::new(),
        }
    }
}
