//! Core data models for the tree-density viewer.
//! Detection datasets, census blocks, selection regions and the reducer that
//! ties registry, tools, selection and statistics together.

use geo::{Coord, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use yew::prelude::Reducible;

use crate::config::ViewerConfig;
use crate::density::{average_block_densities, compute_breaks, DensityBreaks};
use crate::geometry::{Geodesic, GeometryAdapter};
use crate::impact::{ImpactAggregator, ImpactStats};
use crate::registry::ModelRegistry;
use crate::render::SceneInput;
use crate::selection::{
    FilterOutcome, RequestTag, RequestTracker, SelectionCache, SelectionEngine, SelectionKey,
};
use crate::state::Viewport;
use crate::tools::{MapEvent, Tool, ToolEffect, ToolStateMachine};

pub type ModelId = String;
/// Census block OBJECTID, stringified the way the density endpoint keys it.
pub type BlockId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    #[serde(rename = "pt")]
    Point,
    /// Bounding boxes around tree crowns (canopy).
    #[serde(rename = "box")]
    Polygon,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub fn around(center: LatLng, half_lat: f64, half_lng: f64) -> Self {
        Self {
            west: center.lng - half_lng,
            south: center.lat - half_lat,
            east: center.lng + half_lng,
            north: center.lat + half_lat,
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new((self.south + self.north) * 0.5, (self.west + self.east) * 0.5)
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }

    /// Same size, moved so that its center lands on `center`.
    pub fn recentered(&self, center: LatLng) -> Self {
        let half_lat = (self.north - self.south) * 0.5;
        let half_lng = (self.east - self.west) * 0.5;
        Self::around(center, half_lat, half_lng)
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.west, y: self.south },
            Coord { x: self.east, y: self.north },
        )
    }

    fn key_bits(&self) -> [u64; 4] {
        [self.west.to_bits(), self.south.to_bits(), self.east.to_bits(), self.north.to_bits()]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FeatureGeometry {
    Point(Point<f64>),
    Polygon(MultiPolygon<f64>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectionFeature {
    pub geometry: FeatureGeometry,
    pub confidence: Option<f64>,
    pub density: Option<f64>,
}

/// A feature kept by a selection, carrying the id of the model it came from.
/// Shares the dataset's feature instead of copying or mutating it.
#[derive(Clone, Debug, PartialEq)]
pub struct TaggedFeature {
    pub model: Rc<str>,
    pub feature: Rc<DetectionFeature>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: ModelId,
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub color: String,
    /// Marker radius for points, stroke width for boxes.
    pub size: f64,
    pub label: String,
    pub tooltip: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelDataset {
    pub model_id: ModelId,
    pub features: Vec<Rc<DetectionFeature>>,
    /// Precomputed trees/hectare per census block, when the dataset ships them.
    pub block_densities: Option<HashMap<BlockId, f64>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CensusBlock {
    pub id: BlockId,
    pub shape: MultiPolygon<f64>,
    pub bbox: Option<Rect<f64>>,
}

impl CensusBlock {
    pub fn new(id: BlockId, shape: MultiPolygon<f64>) -> Self {
        use geo::BoundingRect;
        let bbox = shape.bounding_rect();
        Self { id, shape, bbox }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RegionShape {
    CensusBlock(Rc<CensusBlock>),
    Rectangle(Bounds),
    StreetTile(Bounds),
}

/// Hashable identity of a region, used for the selection cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegionKey {
    Block(BlockId),
    Rectangle([u64; 4]),
    Street([u64; 4]),
}

impl RegionShape {
    pub fn polygon(&self) -> MultiPolygon<f64> {
        match self {
            RegionShape::CensusBlock(block) => block.shape.clone(),
            RegionShape::Rectangle(b) | RegionShape::StreetTile(b) => {
                MultiPolygon(vec![b.to_rect().to_polygon()])
            }
        }
    }

    pub fn key(&self) -> RegionKey {
        match self {
            RegionShape::CensusBlock(block) => RegionKey::Block(block.id.clone()),
            RegionShape::Rectangle(b) => RegionKey::Rectangle(b.key_bits()),
            RegionShape::StreetTile(b) => RegionKey::Street(b.key_bits()),
        }
    }
}

// ---------------- Viewer state & reducer -----------------

pub const TOO_LARGE_TEXT: &str =
    "The area is too big, please use either 100 Acre box or street view selection.";

#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    /// Popup anchored on the refused region.
    TooLarge { at: LatLng },
    Error(String),
}

/// A filter query the backend still has to answer.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingFilter {
    pub tag: RequestTag,
    pub region: RegionShape,
    pub models: Vec<ModelDescriptor>,
    key: SelectionKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PendingDensity {
    pub tag: RequestTag,
    pub models: Vec<ModelId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerState {
    /// Bumped on every change that reached the reducer.
    pub version: u64,
    pub configured: bool,
    pub config: Rc<ViewerConfig>,
    pub registry: ModelRegistry,
    pub blocks: Rc<Vec<Rc<CensusBlock>>>,
    pub block_densities: Rc<HashMap<BlockId, f64>>,
    pub breaks: DensityBreaks,
    pub tools: ToolStateMachine,
    pub viewport: Viewport,
    pub zoom_lock: Option<f64>,
    pub region: Option<RegionShape>,
    pub outcome: Option<Rc<FilterOutcome>>,
    pub stats: Option<ImpactStats>,
    pub notice: Option<Notice>,
    pub pending_filter: Option<PendingFilter>,
    pub pending_density: Option<PendingDensity>,
    filter_requests: RequestTracker,
    density_requests: RequestTracker,
    cache: SelectionCache,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new(Rc::new(ViewerConfig::default()))
    }
}

impl ViewerState {
    pub fn new(config: Rc<ViewerConfig>) -> Self {
        let mut registry = ModelRegistry::new();
        for d in &config.models {
            registry.register_model(d.clone());
        }
        let size = Viewport::default();
        let viewport = Viewport::new(config.initial_center, config.initial_zoom, size.width, size.height);
        Self {
            version: 0,
            configured: false,
            config,
            registry,
            blocks: Rc::new(Vec::new()),
            block_densities: Rc::new(HashMap::new()),
            breaks: DensityBreaks::default(),
            tools: ToolStateMachine::default(),
            viewport,
            zoom_lock: None,
            region: None,
            outcome: None,
            stats: None,
            notice: None,
            pending_filter: None,
            pending_density: None,
            filter_requests: RequestTracker::default(),
            density_requests: RequestTracker::default(),
            cache: SelectionCache::default(),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tools.tool()
    }

    pub fn block_at(&self, at: LatLng) -> Option<Rc<CensusBlock>> {
        let p = at.to_point();
        self.blocks
            .iter()
            .find(|b| {
                b.bbox.map_or(true, |r| {
                    at.lng >= r.min().x && at.lng <= r.max().x && at.lat >= r.min().y && at.lat <= r.max().y
                }) && Geodesic.contains_point(&b.shape, &p)
            })
            .cloned()
    }

    pub fn scene_input<'a>(&'a self, hovered_block: Option<&'a str>, show_blocks: bool) -> SceneInput<'a> {
        let selected_block = match self.tools.tool() {
            Tool::Blocks => self.tools.selected_block().map(|b| b.id.as_str()),
            _ => None,
        };
        let selection = match self.outcome.as_deref() {
            Some(FilterOutcome::Selected(sel)) => Some(sel),
            _ => None,
        };
        SceneInput {
            blocks: &self.blocks,
            densities: &self.block_densities,
            breaks: &self.breaks,
            models: &self.registry,
            selected_block,
            hovered_block,
            selection,
            rectangle: self.tools.rectangle(),
            show_blocks,
        }
    }

    fn apply(&mut self, action: ViewerAction) -> bool {
        use ViewerAction::*;
        match action {
            Configure(config) => {
                let (width, height) = (self.viewport.width, self.viewport.height);
                let version = self.version;
                *self = ViewerState::new(config);
                self.viewport = self.viewport.resized(width, height);
                self.version = version;
                self.configured = true;
            }
            ModelLoadStarted(id) => self.registry.begin_load(&id),
            ModelLoaded(dataset) => {
                let id = dataset.model_id.clone();
                self.cache.invalidate_model(&id);
                if !self.registry.finish_load(dataset) {
                    return false;
                }
                self.on_model_ready(&id);
            }
            ModelServed(id) => {
                if !self.registry.mark_remote(&id) {
                    return false;
                }
                self.on_model_ready(&id);
            }
            ModelLoadFailed { model, reason } => self.registry.fail_load(&model, reason),
            BlocksLoaded(blocks) => {
                self.blocks = Rc::new(blocks.into_iter().map(Rc::new).collect());
                self.recompute_breaks();
            }
            BlocksFailed(reason) => {
                self.notice = Some(Notice::Error(format!("Census blocks unavailable: {}", reason)));
            }
            ToggleModel { model, on } => {
                let changed = if on {
                    self.registry.activate(&model)
                } else {
                    self.registry.deactivate(&model)
                };
                if !changed {
                    return false;
                }
                self.refresh_densities();
                self.refilter();
            }
            SelectTool(tool) => {
                let effects = self.tools.switch(tool, &self.viewport);
                if effects.is_empty() {
                    return false;
                }
                self.apply_effects(effects);
            }
            MapClick(at) => {
                let block = self.block_at(at);
                let effects = self.tools.handle(MapEvent::Clicked { at, block });
                if effects.is_empty() {
                    return false;
                }
                self.apply_effects(effects);
            }
            RectangleMoved(at) => {
                let effects = self.tools.handle(MapEvent::RectangleMoved(at));
                self.apply_effects(effects);
            }
            ViewportChanged(view) => {
                let view = match self.zoom_lock {
                    Some(z) => view.with_zoom(z),
                    None => view,
                };
                if view == self.viewport {
                    return false;
                }
                self.viewport = view;
                let effects = self.tools.handle(MapEvent::ViewSettled(view));
                self.apply_effects(effects);
            }
            FilterResponse { tag, outcome } => {
                if !self.filter_requests.is_current(tag) {
                    return false;
                }
                let Some(pending) = self.pending_filter.take() else {
                    return false;
                };
                let outcome = Rc::new(outcome);
                self.cache.insert(pending.key, outcome.clone());
                self.apply_outcome(&pending.region, outcome, pending.models.len());
            }
            FilterFailed { tag, reason } => {
                if !self.filter_requests.is_current(tag) {
                    return false;
                }
                self.pending_filter = None;
                self.outcome = None;
                self.stats = None;
                self.notice = Some(Notice::Error(reason));
            }
            DensityResponse { tag, densities } => {
                if !self.density_requests.is_current(tag) {
                    return false;
                }
                self.pending_density = None;
                self.block_densities = Rc::new(densities);
                self.recompute_breaks();
            }
            DensityFailed { tag, reason } => {
                if !self.density_requests.is_current(tag) {
                    return false;
                }
                self.pending_density = None;
                self.notice = Some(Notice::Error(reason));
            }
            DismissNotice => return self.notice.take().is_some(),
        }
        true
    }

    fn on_model_ready(&mut self, id: &str) {
        if self.config.default_model.as_deref() == Some(id) {
            self.registry.activate(id);
        }
        if self.registry.is_active(id) {
            self.refresh_densities();
            self.refilter();
        }
    }

    fn apply_effects(&mut self, effects: Vec<ToolEffect>) {
        for effect in effects {
            match effect {
                ToolEffect::ClearRegion => self.clear_region(),
                ToolEffect::Filter(region) => self.run_filter(region),
                ToolEffect::SetZoom(z) => self.viewport = self.viewport.with_zoom(z),
                ToolEffect::LockZoom(z) => self.zoom_lock = z,
            }
        }
    }

    fn clear_region(&mut self) {
        self.filter_requests.invalidate();
        self.pending_filter = None;
        self.region = None;
        self.outcome = None;
        self.stats = None;
        if matches!(self.notice, Some(Notice::TooLarge { .. })) {
            self.notice = None;
        }
    }

    fn refilter(&mut self) {
        match self.tools.current_region() {
            Some(region) => self.run_filter(region),
            None => self.clear_region(),
        }
    }

    fn run_filter(&mut self, region: RegionShape) {
        let moved = self.region.replace(region.clone()).as_ref() != Some(&region);
        let active: Vec<ModelDescriptor> =
            self.registry.active_descriptors().into_iter().cloned().collect();
        if active.is_empty() {
            self.filter_requests.invalidate();
            self.pending_filter = None;
            self.outcome = None;
            self.stats = None;
            return;
        }
        let ids: Vec<ModelId> = active.iter().map(|d| d.id.clone()).collect();
        let key = SelectionKey::new(&region, &ids);
        if let Some(hit) = self.cache.get(&key) {
            self.filter_requests.invalidate();
            self.pending_filter = None;
            self.apply_outcome(&region, hit, active.len());
            return;
        }

        let engine = SelectionEngine::new(Geodesic, self.config.max_region_acres);
        if self.config.backend.is_local() {
            let refs: Vec<&ModelDescriptor> = active.iter().collect();
            let outcome = Rc::new(engine.filter_region(&region, &refs, self.registry.datasets()));
            self.cache.insert(key, outcome.clone());
            self.filter_requests.invalidate();
            self.pending_filter = None;
            self.apply_outcome(&region, outcome, active.len());
        } else if engine.exceeds_limit(&region.polygon()) {
            // refused locally, no request goes out
            self.filter_requests.invalidate();
            self.pending_filter = None;
            self.apply_outcome(&region, Rc::new(FilterOutcome::TooLarge), active.len());
        } else {
            // figures for another region must not sit beside the new outline
            if moved {
                self.outcome = None;
                self.stats = None;
            }
            let tag = self.filter_requests.issue();
            self.pending_filter = Some(PendingFilter {
                tag,
                region,
                models: active,
                key,
            });
        }
    }

    fn apply_outcome(&mut self, region: &RegionShape, outcome: Rc<FilterOutcome>, active_models: usize) {
        match &*outcome {
            FilterOutcome::TooLarge => {
                let at = Geodesic
                    .centroid(&region.polygon())
                    .map(|p| LatLng::new(p.y(), p.x()))
                    .unwrap_or(self.viewport.center);
                self.notice = Some(Notice::TooLarge { at });
                self.stats = None;
            }
            FilterOutcome::Selected(selection) => {
                self.stats = Some(ImpactAggregator::new(Geodesic).aggregate(region, selection, active_models));
                if matches!(self.notice, Some(Notice::TooLarge { .. })) {
                    self.notice = None;
                }
            }
        }
        self.outcome = Some(outcome);
    }

    fn refresh_densities(&mut self) {
        let ids = self.registry.active_ids();
        if ids.is_empty() || self.config.backend.is_local() {
            self.density_requests.invalidate();
            self.pending_density = None;
            let datasets = ids.iter().filter_map(|id| self.registry.get_dataset(id));
            self.block_densities = Rc::new(average_block_densities(datasets.map(|ds| ds.as_ref())));
            self.recompute_breaks();
        } else {
            let tag = self.density_requests.issue();
            self.pending_density = Some(PendingDensity { tag, models: ids });
        }
    }

    /// Breaks run over every block; a block without a value counts as 0.
    fn recompute_breaks(&mut self) {
        let values: Vec<f64> = self
            .blocks
            .iter()
            .map(|b| self.block_densities.get(&b.id).copied().unwrap_or(0.0))
            .collect();
        self.breaks = compute_breaks(&values);
    }
}

#[derive(Clone, Debug)]
pub enum ViewerAction {
    Configure(Rc<ViewerConfig>),
    ModelLoadStarted(ModelId),
    ModelLoaded(ModelDataset),
    /// Server mode: the model is filtered remotely and needs no download.
    ModelServed(ModelId),
    ModelLoadFailed { model: ModelId, reason: String },
    BlocksLoaded(Vec<CensusBlock>),
    BlocksFailed(String),
    ToggleModel { model: ModelId, on: bool },
    SelectTool(Tool),
    MapClick(LatLng),
    RectangleMoved(LatLng),
    /// Pan or zoom finished (or the canvas was resized).
    ViewportChanged(Viewport),
    FilterResponse { tag: RequestTag, outcome: FilterOutcome },
    FilterFailed { tag: RequestTag, reason: String },
    DensityResponse { tag: RequestTag, densities: HashMap<BlockId, f64> },
    DensityFailed { tag: RequestTag, reason: String },
    DismissNotice,
}

impl Reducible for ViewerState {
    type Action = ViewerAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        let mut new = (*self).clone();
        if !new.apply(action) {
            return self;
        }
        new.version = new.version.wrapping_add(1);
        Rc::new(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use crate::impact::Pm25Estimate;
    use crate::selection::RegionSelection;
    use crate::tools::STREET_ZOOM;
    use geo::{point, polygon};

    fn local_config(max_region_acres: Option<f64>) -> Rc<ViewerConfig> {
        Rc::new(ViewerConfig {
            backend: Backend::Local {
                data_root: "data".into(),
            },
            max_region_acres,
            ..ViewerConfig::default()
        })
    }

    // roughly 2 km x 1 km around Pasadena
    fn block(id: &str) -> CensusBlock {
        CensusBlock::new(
            id.into(),
            MultiPolygon(vec![polygon![
                (x: -118.14, y: 34.15), (x: -118.12, y: 34.15), (x: -118.12, y: 34.16),
                (x: -118.14, y: 34.16), (x: -118.14, y: 34.15),
            ]]),
        )
    }

    fn tree(lng: f64, lat: f64) -> Rc<DetectionFeature> {
        Rc::new(DetectionFeature {
            geometry: FeatureGeometry::Point(point!(x: lng, y: lat)),
            confidence: None,
            density: None,
        })
    }

    fn dataset(id: &str, density: f64) -> ModelDataset {
        ModelDataset {
            model_id: id.into(),
            features: vec![tree(-118.13, 34.155), tree(-118.125, 34.152), tree(-118.2, 34.3)],
            block_densities: Some(HashMap::from([("1".to_string(), density)])),
        }
    }

    fn inside() -> LatLng {
        LatLng::new(34.155, -118.13)
    }

    fn run(state: Rc<ViewerState>, actions: Vec<ViewerAction>) -> Rc<ViewerState> {
        actions.into_iter().fold(state, |s, a| s.reduce(a))
    }

    fn loaded_local(max_region_acres: Option<f64>) -> Rc<ViewerState> {
        run(
            Rc::new(ViewerState::default()),
            vec![
                ViewerAction::Configure(local_config(max_region_acres)),
                ViewerAction::BlocksLoaded(vec![block("1"), block("2")]),
                ViewerAction::ModelLoaded(dataset("training", 8.5)),
            ],
        )
    }

    #[test]
    fn default_model_activates_and_block_click_aggregates() {
        let s = loaded_local(None);
        assert!(s.configured);
        assert!(s.registry.is_active("training"));
        assert_eq!(s.block_densities.get("1"), Some(&8.5));
        assert!(!s.breaks.breaks.is_empty());

        let s = s.reduce(ViewerAction::MapClick(inside()));
        let stats = s.stats.expect("stats");
        assert_eq!(stats.active_models, 1);
        assert_eq!(stats.avg_tree_count, 2.0);
        assert_eq!(stats.co2_kg, 20.0);
        assert!(matches!(stats.pm25, Pm25Estimate::PerTree { .. }));
        assert!(s.pending_filter.is_none());
        assert_eq!(s.scene_input(None, true).selected_block, Some("1"));
    }

    #[test]
    fn unchanged_actions_keep_the_same_state() {
        let s = loaded_local(None);
        let same = s.clone().reduce(ViewerAction::MapClick(LatLng::new(0.0, 0.0)));
        assert!(Rc::ptr_eq(&s, &same));
        let same = s.clone().reduce(ViewerAction::ToggleModel {
            model: "baseline".into(),
            on: true,
        });
        // baseline was never loaded
        assert!(Rc::ptr_eq(&s, &same));
    }

    #[test]
    fn turning_off_the_last_model_clears_everything() {
        let s = loaded_local(None).reduce(ViewerAction::MapClick(inside()));
        assert!(s.stats.is_some());
        let s = s.reduce(ViewerAction::ToggleModel {
            model: "training".into(),
            on: false,
        });
        assert_eq!(s.registry.active_count(), 0);
        assert!(s.stats.is_none());
        assert!(s.outcome.is_none());
        assert!(s.block_densities.is_empty());
    }

    #[test]
    fn second_model_is_averaged_in() {
        let s = run(
            loaded_local(None),
            vec![
                ViewerAction::ModelLoaded(dataset("baseline", 11.5)),
                ViewerAction::MapClick(inside()),
                ViewerAction::ToggleModel {
                    model: "baseline".into(),
                    on: true,
                },
            ],
        );
        assert_eq!(s.block_densities.get("1"), Some(&10.0));
        let stats = s.stats.expect("stats");
        assert_eq!(stats.active_models, 2);
        assert_eq!(stats.avg_tree_count, 2.0);
    }

    #[test]
    fn returning_to_blocks_reuses_the_cached_result() {
        let s = loaded_local(None).reduce(ViewerAction::MapClick(inside()));
        let first = s.outcome.clone().expect("outcome");
        let s = s.reduce(ViewerAction::SelectTool(Tool::Rectangle));
        assert!(matches!(s.region, Some(RegionShape::Rectangle(_))));
        assert!(s.scene_input(None, true).selected_block.is_none());
        let s = s.reduce(ViewerAction::SelectTool(Tool::Blocks));
        let again = s.outcome.clone().expect("outcome");
        assert!(Rc::ptr_eq(&first, &again));
        assert!(s.pending_filter.is_none());
    }

    #[test]
    fn oversized_block_raises_a_notice() {
        let s = loaded_local(Some(10.0)).reduce(ViewerAction::MapClick(inside()));
        assert!(s.stats.is_none());
        match s.notice {
            Some(Notice::TooLarge { at }) => assert!((at.lat - 34.155).abs() < 1e-3),
            ref other => panic!("unexpected notice {:?}", other),
        }
        let s = s.reduce(ViewerAction::DismissNotice);
        assert!(s.notice.is_none());
    }

    fn served() -> Rc<ViewerState> {
        run(
            Rc::new(ViewerState::default()),
            vec![
                ViewerAction::Configure(Rc::new(ViewerConfig::default())),
                ViewerAction::BlocksLoaded(vec![block("1")]),
                ViewerAction::ModelServed("training".into()),
            ],
        )
    }

    fn one_tree(model: &str) -> FilterOutcome {
        FilterOutcome::Selected(RegionSelection {
            per_model: vec![crate::selection::ModelSelection {
                model: Rc::from(model),
                kind: GeometryKind::Point,
                features: vec![TaggedFeature {
                    model: Rc::from(model),
                    feature: tree(-118.13, 34.155),
                }],
            }],
        })
    }

    #[test]
    fn server_mode_discards_superseded_filter_replies() {
        let s = served().reduce(ViewerAction::MapClick(inside()));
        let first = s.pending_filter.clone().expect("pending").tag;
        let s = s.reduce(ViewerAction::SelectTool(Tool::Rectangle));
        let second = s.pending_filter.clone().expect("pending");
        assert_ne!(first, second.tag);
        assert!(matches!(second.region, RegionShape::Rectangle(_)));

        let stale = s.clone().reduce(ViewerAction::FilterResponse {
            tag: first,
            outcome: one_tree("training"),
        });
        assert!(Rc::ptr_eq(&s, &stale));

        let s = s.reduce(ViewerAction::FilterResponse {
            tag: second.tag,
            outcome: one_tree("training"),
        });
        assert!(s.pending_filter.is_none());
        assert_eq!(s.stats.expect("stats").avg_tree_count, 1.0);
    }

    #[test]
    fn failed_request_drops_the_previous_figures() {
        let east = CensusBlock::new(
            "2".into(),
            MultiPolygon(vec![polygon![
                (x: -118.10, y: 34.15), (x: -118.08, y: 34.15), (x: -118.08, y: 34.16),
                (x: -118.10, y: 34.16), (x: -118.10, y: 34.15),
            ]]),
        );
        let s = run(
            served(),
            vec![ViewerAction::BlocksLoaded(vec![block("1"), east]), ViewerAction::MapClick(inside())],
        );
        let tag = s.pending_filter.clone().expect("pending").tag;
        let s = s.reduce(ViewerAction::FilterResponse {
            tag,
            outcome: one_tree("training"),
        });
        assert!(s.stats.is_some());

        // another block: the old numbers go away while the request is out
        let s = s.reduce(ViewerAction::MapClick(LatLng::new(34.155, -118.09)));
        let pending = s.pending_filter.clone().expect("pending");
        assert!(matches!(&pending.region, RegionShape::CensusBlock(b) if b.id == "2"));
        assert!(s.stats.is_none());
        assert!(s.outcome.is_none());
        let s = s.reduce(ViewerAction::FilterFailed {
            tag: pending.tag,
            reason: "HTTP 500".into(),
        });
        assert!(s.pending_filter.is_none());
        assert!(matches!(s.notice, Some(Notice::Error(_))));
        assert!(s.stats.is_none());
    }

    #[test]
    fn failed_refilter_of_the_same_block_clears_its_stats() {
        let s = served().reduce(ViewerAction::MapClick(inside()));
        let tag = s.pending_filter.clone().expect("pending").tag;
        let s = s.reduce(ViewerAction::FilterResponse {
            tag,
            outcome: one_tree("training"),
        });
        let s = run(
            s,
            vec![
                ViewerAction::ModelServed("baseline".into()),
                ViewerAction::ToggleModel {
                    model: "baseline".into(),
                    on: true,
                },
            ],
        );
        // same block, new model set: figures stay until the reply lands
        let pending = s.pending_filter.clone().expect("pending");
        assert!(s.stats.is_some());
        let s = s.reduce(ViewerAction::FilterFailed {
            tag: pending.tag,
            reason: "timeout".into(),
        });
        assert!(s.stats.is_none());
        assert!(s.outcome.is_none());
    }

    #[test]
    fn server_refusal_shows_the_notice() {
        let s = served().reduce(ViewerAction::MapClick(inside()));
        let tag = s.pending_filter.clone().expect("pending").tag;
        let s = s.reduce(ViewerAction::FilterResponse {
            tag,
            outcome: FilterOutcome::TooLarge,
        });
        assert!(matches!(s.notice, Some(Notice::TooLarge { .. })));
        assert!(s.stats.is_none());
    }

    #[test]
    fn only_the_latest_density_reply_lands() {
        let s = served();
        let first = s.pending_density.clone().expect("density").tag;
        let s = run(
            s,
            vec![
                ViewerAction::ModelServed("baseline".into()),
                ViewerAction::ToggleModel {
                    model: "baseline".into(),
                    on: true,
                },
            ],
        );
        let pending = s.pending_density.clone().expect("density");
        assert_eq!(pending.models, vec!["training".to_string(), "baseline".to_string()]);

        let s = s.reduce(ViewerAction::DensityResponse {
            tag: first,
            densities: HashMap::from([("1".to_string(), 99.0)]),
        });
        assert!(s.block_densities.is_empty());
        let s = s.reduce(ViewerAction::DensityResponse {
            tag: pending.tag,
            densities: HashMap::from([("1".to_string(), 12.0)]),
        });
        assert_eq!(s.block_densities.get("1"), Some(&12.0));
        assert!(s.pending_density.is_none());
    }

    #[test]
    fn street_view_pins_the_zoom_until_left() {
        let s = served().reduce(ViewerAction::SelectTool(Tool::Street));
        assert_eq!(s.viewport.zoom, STREET_ZOOM);
        assert_eq!(s.zoom_lock, Some(STREET_ZOOM));
        assert!(matches!(
            s.pending_filter.as_ref().map(|p| &p.region),
            Some(RegionShape::StreetTile(_))
        ));

        let moved = s.viewport.with_zoom(14.0).panned(50.0, 0.0);
        let s = s.reduce(ViewerAction::ViewportChanged(moved));
        assert_eq!(s.viewport.zoom, STREET_ZOOM);

        let s = s.reduce(ViewerAction::SelectTool(Tool::Blocks));
        assert_eq!(s.zoom_lock, None);
        assert!(s.region.is_none());
        assert!(s.pending_filter.is_none());
    }
}
