use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

use geo::{BoundingRect, Intersects, MultiPolygon, Point, Rect};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, CanvasWindingRule};

use crate::density::{density_color, DensityBreaks};
use crate::model::{BlockId, Bounds, CensusBlock, FeatureGeometry};
use crate::registry::ModelRegistry;
use crate::selection::RegionSelection;
use crate::state::viewport::{Viewport, TILE_PX};

const BLANK_FILL: &str = "#b8fca7";
const BLOCK_BORDER: &str = "#888";
const HIGHLIGHT: &str = "#fff";
const MARKER_STROKE: &str = "#333333";
const BACKGROUND: &str = "#0e1116";

#[derive(Clone, Debug, PartialEq)]
pub struct PathStyle {
    pub stroke: String,
    pub weight: f64,
    pub fill: Option<String>,
    pub fill_opacity: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StyledShape<'a> {
    pub shape: Cow<'a, MultiPolygon<f64>>,
    pub bbox: Option<Rect<f64>>,
    pub style: PathStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub at: Point<f64>,
    pub radius: f64,
    pub fill: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct Scene<'a> {
    pub blocks: Vec<StyledShape<'a>>,
    pub canopy: Vec<StyledShape<'a>>,
    pub markers: Vec<Marker>,
    /// The draggable selection box.
    pub outline: Option<StyledShape<'a>>,
}

pub trait MapSurface {
    fn clear(&mut self);
    fn draw_polygon_layer(&mut self, shapes: &[StyledShape<'_>]);
    fn draw_point_layer(&mut self, markers: &[Marker]);
}

/// Block fill before any model is active.
pub fn blank_block_style() -> PathStyle {
    PathStyle {
        stroke: BLOCK_BORDER.to_string(),
        weight: 1.0,
        fill: Some(BLANK_FILL.to_string()),
        fill_opacity: 0.3,
    }
}

pub fn block_style(
    density: f64,
    breaks: &DensityBreaks,
    any_active: bool,
    selected: bool,
    hovered: bool,
) -> PathStyle {
    let mut style = if any_active {
        PathStyle {
            stroke: BLOCK_BORDER.to_string(),
            weight: 1.0,
            fill: Some(density_color(density, &breaks.breaks).to_string()),
            fill_opacity: 0.5,
        }
    } else {
        blank_block_style()
    };
    if selected {
        style.stroke = HIGHLIGHT.to_string();
        style.weight = 2.0;
        style.fill_opacity = 0.5;
    } else if hovered && any_active {
        style.stroke = HIGHLIGHT.to_string();
        style.weight = 3.0;
    }
    style
}

pub struct SceneInput<'a> {
    pub blocks: &'a [Rc<CensusBlock>],
    pub densities: &'a HashMap<BlockId, f64>,
    pub breaks: &'a DensityBreaks,
    pub models: &'a ModelRegistry,
    pub selected_block: Option<&'a str>,
    pub hovered_block: Option<&'a str>,
    pub selection: Option<&'a RegionSelection>,
    pub rectangle: Option<Bounds>,
    pub show_blocks: bool,
}

pub fn build_scene<'a>(input: &SceneInput<'a>) -> Scene<'a> {
    let any_active = input.models.active_count() > 0;
    let mut blocks = Vec::new();
    let mut highlighted = Vec::new();
    if input.show_blocks {
        for block in input.blocks {
            let selected = input.selected_block == Some(block.id.as_str());
            let hovered = input.hovered_block == Some(block.id.as_str());
            let density = input.densities.get(&block.id).copied().unwrap_or(0.0);
            let shape = StyledShape {
                shape: Cow::Borrowed(&block.shape),
                bbox: block.bbox,
                style: block_style(density, input.breaks, any_active, selected, hovered),
            };
            // outlined blocks go on top so their border is not painted over
            if selected || (hovered && any_active) {
                highlighted.push(shape);
            } else {
                blocks.push(shape);
            }
        }
    }
    blocks.extend(highlighted);

    let mut canopy = Vec::new();
    let mut markers = Vec::new();
    if let Some(selection) = input.selection {
        for m in &selection.per_model {
            let Some(d) = input.models.descriptor(&m.model) else {
                continue;
            };
            for f in &m.features {
                match &f.feature.geometry {
                    FeatureGeometry::Point(p) => markers.push(Marker {
                        at: *p,
                        radius: d.size,
                        fill: d.color.clone(),
                    }),
                    FeatureGeometry::Polygon(shape) => canopy.push(StyledShape {
                        shape: Cow::Borrowed(shape),
                        bbox: shape.bounding_rect(),
                        style: PathStyle {
                            stroke: d.color.clone(),
                            weight: d.size,
                            fill: Some(d.color.clone()),
                            fill_opacity: 0.1,
                        },
                    }),
                }
            }
        }
    }

    let outline = input.rectangle.map(|b| StyledShape {
        shape: Cow::Owned(MultiPolygon(vec![b.to_rect().to_polygon()])),
        bbox: Some(b.to_rect()),
        style: PathStyle {
            stroke: HIGHLIGHT.to_string(),
            weight: 3.0,
            fill: Some(HIGHLIGHT.to_string()),
            fill_opacity: 0.1,
        },
    });

    Scene {
        blocks,
        canopy,
        markers,
        outline,
    }
}

/// Blocks, then canopy boxes, then tree markers, then the selection box.
pub fn draw_scene<S: MapSurface + ?Sized>(surface: &mut S, scene: &Scene<'_>) {
    surface.draw_polygon_layer(&scene.blocks);
    surface.draw_polygon_layer(&scene.canopy);
    surface.draw_point_layer(&scene.markers);
    if let Some(outline) = &scene.outline {
        surface.draw_polygon_layer(std::slice::from_ref(outline));
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileRef {
    pub z: u32,
    pub x: u32,
    pub y: u32,
    pub left: f64,
    pub top: f64,
    pub size: f64,
}

/// Slippy-map tiles covering the viewport, with their on-screen placement.
pub fn visible_tiles(view: &Viewport, max_zoom: u32) -> Vec<TileRef> {
    let z = (view.zoom.floor().max(0.0) as u32).min(max_zoom);
    let n = 1u64 << z;
    let size = TILE_PX * 2f64.powf(view.zoom - z as f64);
    let (cx, cy) = view.project(view.center);
    let left = cx - view.width * 0.5;
    let top = cy - view.height * 0.5;
    let tx0 = (left / size).floor() as i64;
    let tx1 = ((left + view.width) / size).floor() as i64;
    let ty0 = ((top / size).floor() as i64).max(0);
    let ty1 = (((top + view.height) / size).floor() as i64).min(n as i64 - 1);
    let mut tiles = Vec::new();
    for ty in ty0..=ty1 {
        for tx in tx0..=tx1 {
            tiles.push(TileRef {
                z,
                x: tx.rem_euclid(n as i64) as u32,
                y: ty as u32,
                left: tx as f64 * size - left,
                top: ty as f64 * size - top,
                size,
            });
        }
    }
    tiles
}

/// 2D canvas backend.
pub struct CanvasSurface<'c> {
    ctx: &'c CanvasRenderingContext2d,
    view: Viewport,
}

impl<'c> CanvasSurface<'c> {
    pub fn new(ctx: &'c CanvasRenderingContext2d, view: Viewport) -> Self {
        Self { ctx, view }
    }

    pub fn context_2d(canvas: &web_sys::HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
        canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
    }

    pub fn draw_tile(&self, image: &web_sys::HtmlImageElement, tile: &TileRef) {
        let _ = self
            .ctx
            .draw_image_with_html_image_element_and_dw_and_dh(image, tile.left, tile.top, tile.size, tile.size);
    }

    fn trace(&self, shape: &MultiPolygon<f64>) {
        for poly in &shape.0 {
            for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
                let mut first = true;
                for c in &ring.0 {
                    let (x, y) = self.view.to_screen(crate::model::LatLng::new(c.y, c.x));
                    if first {
                        self.ctx.move_to(x, y);
                        first = false;
                    } else {
                        self.ctx.line_to(x, y);
                    }
                }
                self.ctx.close_path();
            }
        }
    }
}

impl MapSurface for CanvasSurface<'_> {
    fn clear(&mut self) {
        self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0).ok();
        self.ctx.set_global_alpha(1.0);
        self.ctx.set_fill_style_str(BACKGROUND);
        self.ctx.fill_rect(0.0, 0.0, self.view.width, self.view.height);
    }

    fn draw_polygon_layer(&mut self, shapes: &[StyledShape<'_>]) {
        let visible = self.view.bounds().to_rect();
        for s in shapes {
            if s.bbox.is_some_and(|b| !b.intersects(&visible)) {
                continue;
            }
            self.ctx.begin_path();
            self.trace(&s.shape);
            if let Some(fill) = &s.style.fill {
                self.ctx.set_global_alpha(s.style.fill_opacity);
                self.ctx.set_fill_style_str(fill);
                self.ctx.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);
            }
            self.ctx.set_global_alpha(1.0);
            self.ctx.set_stroke_style_str(&s.style.stroke);
            self.ctx.set_line_width(s.style.weight);
            self.ctx.stroke();
        }
    }

    fn draw_point_layer(&mut self, markers: &[Marker]) {
        let visible = self.view.bounds();
        self.ctx.set_global_alpha(1.0);
        self.ctx.set_line_width(0.5);
        self.ctx.set_stroke_style_str(MARKER_STROKE);
        for m in markers {
            let at = crate::model::LatLng::new(m.at.y(), m.at.x());
            if !visible.contains(at) {
                continue;
            }
            let (x, y) = self.view.to_screen(at);
            self.ctx.begin_path();
            self.ctx
                .arc(x, y, m.radius, 0.0, std::f64::consts::PI * 2.0)
                .ok();
            self.ctx.set_fill_style_str(&m.fill);
            self.ctx.fill();
            self.ctx.stroke();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::compute_breaks;
    use crate::model::{DetectionFeature, GeometryKind, ModelDataset, ModelDescriptor, TaggedFeature};
    use crate::selection::ModelSelection;
    use geo::{point, polygon};

    fn block(id: &str, x: f64) -> Rc<CensusBlock> {
        Rc::new(CensusBlock::new(
            id.into(),
            MultiPolygon(vec![polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 0.0)]]),
        ))
    }

    fn registry(active: &[&str]) -> ModelRegistry {
        let mut reg = ModelRegistry::new();
        for (id, kind, color) in [
            ("pts", GeometryKind::Point, "#4842f5"),
            ("boxes", GeometryKind::Polygon, "#59fff1"),
        ] {
            reg.register_model(ModelDescriptor {
                id: id.into(),
                kind,
                color: color.into(),
                size: 3.0,
                label: id.into(),
                tooltip: String::new(),
            });
            reg.finish_load(ModelDataset {
                model_id: id.into(),
                features: Vec::new(),
                block_densities: None,
            });
        }
        for id in active {
            reg.activate(id);
        }
        reg
    }

    fn input<'a>(
        blocks: &'a [Rc<CensusBlock>],
        densities: &'a HashMap<BlockId, f64>,
        breaks: &'a DensityBreaks,
        models: &'a ModelRegistry,
    ) -> SceneInput<'a> {
        SceneInput {
            blocks,
            densities,
            breaks,
            models,
            selected_block: None,
            hovered_block: None,
            selection: None,
            rectangle: None,
            show_blocks: true,
        }
    }

    #[test]
    fn blocks_are_blank_until_a_model_is_active() {
        let blocks = vec![block("1", 0.0), block("2", 2.0)];
        let densities = HashMap::from([("1".to_string(), 3.0)]);
        let breaks = compute_breaks(&[0.0, 3.0, 8.0]);
        let idle = registry(&[]);
        let scene = build_scene(&input(&blocks, &densities, &breaks, &idle));
        assert!(scene.blocks.iter().all(|b| b.style == blank_block_style()));

        let busy = registry(&["pts"]);
        let scene = build_scene(&input(&blocks, &densities, &breaks, &busy));
        assert_eq!(scene.blocks[0].style.fill_opacity, 0.5);
        assert_eq!(
            scene.blocks[0].style.fill.as_deref(),
            Some(density_color(3.0, &breaks.breaks))
        );
        // missing density colours as zero
        assert_eq!(
            scene.blocks[1].style.fill.as_deref(),
            Some(density_color(0.0, &breaks.breaks))
        );
    }

    #[test]
    fn selected_block_is_outlined_and_drawn_last() {
        let blocks = vec![block("1", 0.0), block("2", 2.0), block("3", 4.0)];
        let densities = HashMap::new();
        let breaks = DensityBreaks::default();
        let reg = registry(&["pts"]);
        let mut inp = input(&blocks, &densities, &breaks, &reg);
        inp.selected_block = Some("1");
        let scene = build_scene(&inp);
        let last = scene.blocks.last().unwrap();
        assert_eq!(last.style.stroke, HIGHLIGHT);
        assert_eq!(last.style.weight, 2.0);
        assert_eq!(scene.blocks.len(), 3);
        inp.show_blocks = false;
        assert!(build_scene(&inp).blocks.is_empty());
    }

    #[test]
    fn detections_are_styled_by_their_model() {
        let blocks = Vec::new();
        let densities = HashMap::new();
        let breaks = DensityBreaks::default();
        let reg = registry(&["pts", "boxes"]);
        let pts: Rc<str> = Rc::from("pts");
        let boxes: Rc<str> = Rc::from("boxes");
        let selection = RegionSelection {
            per_model: vec![
                ModelSelection {
                    model: pts.clone(),
                    kind: GeometryKind::Point,
                    features: vec![TaggedFeature {
                        model: pts.clone(),
                        feature: Rc::new(DetectionFeature {
                            geometry: FeatureGeometry::Point(point!(x: 0.5, y: 0.5)),
                            confidence: None,
                            density: None,
                        }),
                    }],
                },
                ModelSelection {
                    model: boxes.clone(),
                    kind: GeometryKind::Polygon,
                    features: vec![TaggedFeature {
                        model: boxes.clone(),
                        feature: Rc::new(DetectionFeature {
                            geometry: FeatureGeometry::Polygon(MultiPolygon(vec![polygon![
                                (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0),
                            ]])),
                            confidence: None,
                            density: None,
                        }),
                    }],
                },
            ],
        };
        let mut inp = input(&blocks, &densities, &breaks, &reg);
        inp.selection = Some(&selection);
        inp.rectangle = Some(Bounds {
            west: 0.0,
            south: 0.0,
            east: 1.0,
            north: 1.0,
        });
        let scene = build_scene(&inp);
        assert_eq!(scene.markers.len(), 1);
        assert_eq!(scene.markers[0].fill, "#4842f5");
        assert_eq!(scene.markers[0].radius, 3.0);
        assert_eq!(scene.canopy.len(), 1);
        assert_eq!(scene.canopy[0].style.stroke, "#59fff1");
        assert_eq!(scene.canopy[0].style.fill_opacity, 0.1);
        assert_eq!(scene.outline.as_ref().unwrap().style.weight, 3.0);
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl MapSurface for Recorder {
        fn clear(&mut self) {
            self.calls.push("clear".into());
        }
        fn draw_polygon_layer(&mut self, shapes: &[StyledShape<'_>]) {
            self.calls.push(format!("polygons:{}", shapes.len()));
        }
        fn draw_point_layer(&mut self, markers: &[Marker]) {
            self.calls.push(format!("points:{}", markers.len()));
        }
    }

    #[test]
    fn scene_draws_bottom_up() {
        let mut r = Recorder::default();
        let scene = Scene {
            blocks: vec![],
            canopy: vec![],
            markers: vec![Marker {
                at: point!(x: 0.0, y: 0.0),
                radius: 2.0,
                fill: "#000".into(),
            }],
            outline: None,
        };
        draw_scene(&mut r, &scene);
        assert_eq!(r.calls, vec!["polygons:0", "polygons:0", "points:1"]);
    }

    #[test]
    fn tiles_cover_the_viewport() {
        let view = Viewport::default();
        let tiles = visible_tiles(&view, 19);
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.z == 13 && t.size == 256.0));
        let min_left = tiles.iter().map(|t| t.left).fold(f64::INFINITY, f64::min);
        let max_right = tiles.iter().map(|t| t.left + t.size).fold(f64::NEG_INFINITY, f64::max);
        assert!(min_left <= 0.0 && max_right >= view.width);
    }

    #[test]
    fn tiles_overzoom_past_the_layer_maximum() {
        let view = Viewport::default().with_zoom(18.0);
        let tiles = visible_tiles(&view, 17);
        assert!(tiles.iter().all(|t| t.z == 17 && (t.size - 512.0).abs() < 1e-9));
    }
}
