use std::collections::HashMap;
use std::rc::Rc;

use geo::{MultiPolygon, Point};

use crate::geometry::GeometryAdapter;
use crate::impact::SQ_M_PER_ACRE;
use crate::model::{
    FeatureGeometry, GeometryKind, ModelDataset, ModelDescriptor, ModelId, RegionKey, RegionShape,
    TaggedFeature,
};

#[derive(Clone, Debug, PartialEq)]
pub struct ModelSelection {
    pub model: Rc<str>,
    pub kind: GeometryKind,
    pub features: Vec<TaggedFeature>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionSelection {
    /// One entry per active model, in registration order.
    pub per_model: Vec<ModelSelection>,
}

impl RegionSelection {
    pub fn combined(&self) -> impl Iterator<Item = &TaggedFeature> {
        self.per_model.iter().flat_map(|m| m.features.iter())
    }

    pub fn total(&self) -> usize {
        self.per_model.iter().map(|m| m.features.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn for_model(&self, id: &str) -> Option<&ModelSelection> {
        self.per_model.iter().find(|m| &*m.model == id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutcome {
    Selected(RegionSelection),
    /// The region is too big to evaluate; callers show a notice instead of stats.
    TooLarge,
}

pub struct SelectionEngine<G> {
    geometry: G,
    max_region_acres: Option<f64>,
}

impl<G: GeometryAdapter> SelectionEngine<G> {
    pub fn new(geometry: G, max_region_acres: Option<f64>) -> Self {
        Self {
            geometry,
            max_region_acres,
        }
    }

    /// Whether `shape` is over the configured acreage limit, if there is one.
    pub fn exceeds_limit(&self, shape: &MultiPolygon<f64>) -> bool {
        self.max_region_acres
            .is_some_and(|limit| self.geometry.area_sq_m(shape) / SQ_M_PER_ACRE > limit)
    }

    pub fn filter_region(
        &self,
        region: &RegionShape,
        active: &[&ModelDescriptor],
        datasets: &HashMap<ModelId, Rc<ModelDataset>>,
    ) -> FilterOutcome {
        let shape = region.polygon();
        if self.exceeds_limit(&shape) {
            return FilterOutcome::TooLarge;
        }
        let per_model = active
            .iter()
            .map(|d| {
                let model: Rc<str> = Rc::from(d.id.as_str());
                let features = match datasets.get(&d.id) {
                    Some(ds) => self.filter_dataset(&shape, d.kind, &model, ds),
                    None => Vec::new(),
                };
                ModelSelection {
                    model,
                    kind: d.kind,
                    features,
                }
            })
            .collect();
        FilterOutcome::Selected(RegionSelection { per_model })
    }

    fn filter_dataset(
        &self,
        region: &MultiPolygon<f64>,
        kind: GeometryKind,
        model: &Rc<str>,
        dataset: &ModelDataset,
    ) -> Vec<TaggedFeature> {
        dataset
            .features
            .iter()
            .filter(|f| match self.anchor(kind, &f.geometry) {
                Some(p) => self.geometry.contains_point(region, &p),
                None => false,
            })
            .map(|f| TaggedFeature {
                model: model.clone(),
                feature: f.clone(),
            })
            .collect()
    }

    /// The point tested against the region: the point itself for point models,
    /// the centroid for box models (the box is kept whole even if it pokes out).
    fn anchor(&self, kind: GeometryKind, geometry: &FeatureGeometry) -> Option<Point<f64>> {
        match (kind, geometry) {
            (_, FeatureGeometry::Point(p)) => Some(*p),
            (GeometryKind::Polygon, FeatureGeometry::Polygon(shape)) => self.geometry.centroid(shape),
            (GeometryKind::Point, FeatureGeometry::Polygon(_)) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestTag(u64);

/// Hands out increasing request generations; only the newest one is accepted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestTracker {
    latest: u64,
}

impl RequestTracker {
    pub fn issue(&mut self) -> RequestTag {
        self.latest += 1;
        RequestTag(self.latest)
    }

    /// Supersedes whatever is in flight without issuing a new request.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }

    pub fn is_current(&self, tag: RequestTag) -> bool {
        tag.0 == self.latest
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    pub region: RegionKey,
    pub models: Vec<ModelId>,
}

impl SelectionKey {
    pub fn new(region: &RegionShape, active: &[ModelId]) -> Self {
        let mut models = active.to_vec();
        models.sort();
        Self {
            region: region.key(),
            models,
        }
    }
}

const CACHE_CAPACITY: usize = 64;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionCache {
    entries: HashMap<SelectionKey, Rc<FilterOutcome>>,
}

impl SelectionCache {
    pub fn get(&self, key: &SelectionKey) -> Option<Rc<FilterOutcome>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: SelectionKey, outcome: Rc<FilterOutcome>) {
        if self.entries.len() >= CACHE_CAPACITY && !self.entries.contains_key(&key) {
            self.entries.clear();
        }
        self.entries.insert(key, outcome);
    }

    /// Drops every entry computed with `model`; used when its dataset is replaced.
    pub fn invalidate_model(&mut self, model: &str) {
        self.entries.retain(|k, _| !k.models.iter().any(|m| m == model));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Planar;
    use crate::model::{Bounds, CensusBlock, DetectionFeature};
    use geo::{point, polygon};

    fn descriptor(id: &str, kind: GeometryKind) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            kind,
            color: "#000".into(),
            size: 2.0,
            label: id.into(),
            tooltip: String::new(),
        }
    }

    fn pt(x: f64, y: f64) -> Rc<DetectionFeature> {
        Rc::new(DetectionFeature {
            geometry: FeatureGeometry::Point(point!(x: x, y: y)),
            confidence: None,
            density: None,
        })
    }

    fn boxed(x0: f64, y0: f64, x1: f64, y1: f64) -> Rc<DetectionFeature> {
        Rc::new(DetectionFeature {
            geometry: FeatureGeometry::Polygon(MultiPolygon(vec![polygon![
                (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
            ]])),
            confidence: Some(0.9),
            density: None,
        })
    }

    fn datasets() -> HashMap<ModelId, Rc<ModelDataset>> {
        let points = ModelDataset {
            model_id: "points".into(),
            features: vec![pt(5.0, 5.0), pt(10.0, 5.0), pt(11.0, 5.0), pt(0.0, 0.0)],
            block_densities: None,
        };
        let boxes = ModelDataset {
            model_id: "boxes".into(),
            // centroid (9,5) inside, spills past x=10
            features: vec![boxed(7.0, 4.0, 11.0, 6.0), boxed(9.0, 4.0, 13.0, 6.0)],
            block_densities: None,
        };
        HashMap::from([
            ("points".to_string(), Rc::new(points)),
            ("boxes".to_string(), Rc::new(boxes)),
        ])
    }

    fn region() -> RegionShape {
        RegionShape::Rectangle(Bounds {
            west: 0.0,
            south: 0.0,
            east: 10.0,
            north: 10.0,
        })
    }

    fn selected(outcome: FilterOutcome) -> RegionSelection {
        match outcome {
            FilterOutcome::Selected(s) => s,
            FilterOutcome::TooLarge => panic!("unexpected TooLarge"),
        }
    }

    #[test]
    fn points_on_the_edge_are_included() {
        let engine = SelectionEngine::new(Planar, None);
        let d = descriptor("points", GeometryKind::Point);
        let s = selected(engine.filter_region(&region(), &[&d], &datasets()));
        let m = s.for_model("points").unwrap();
        assert_eq!(m.features.len(), 3);
        assert!(m.features.iter().all(|f| &*f.model == "points"));
    }

    #[test]
    fn boxes_use_centroid_and_keep_full_extent() {
        let engine = SelectionEngine::new(Planar, None);
        let d = descriptor("boxes", GeometryKind::Polygon);
        let ds = datasets();
        let s = selected(engine.filter_region(&region(), &[&d], &ds));
        let m = s.for_model("boxes").unwrap();
        assert_eq!(m.features.len(), 1);
        // same shared feature, not a clipped copy
        assert!(Rc::ptr_eq(&m.features[0].feature, &ds["boxes"].features[0]));
    }

    #[test]
    fn results_follow_active_models_and_skip_unloaded() {
        let engine = SelectionEngine::new(Planar, None);
        let p = descriptor("points", GeometryKind::Point);
        let b = descriptor("boxes", GeometryKind::Polygon);
        let ghost = descriptor("ghost", GeometryKind::Point);
        let s = selected(engine.filter_region(&region(), &[&p, &ghost, &b], &datasets()));
        let ids: Vec<&str> = s.per_model.iter().map(|m| &*m.model).collect();
        assert_eq!(ids, vec!["points", "ghost", "boxes"]);
        assert_eq!(s.total(), 4);
        assert_eq!(s.combined().count(), 4);
        assert!(s.for_model("ghost").unwrap().features.is_empty());
    }

    #[test]
    fn filtering_is_idempotent_and_leaves_datasets_untouched() {
        let engine = SelectionEngine::new(Planar, None);
        let p = descriptor("points", GeometryKind::Point);
        let b = descriptor("boxes", GeometryKind::Polygon);
        let ds = datasets();
        let before = ds.clone();
        let first = engine.filter_region(&region(), &[&p, &b], &ds);
        let second = engine.filter_region(&region(), &[&p, &b], &ds);
        assert_eq!(first, second);
        assert_eq!(ds, before);
    }

    #[test]
    fn block_regions_filter_against_block_polygon() {
        let engine = SelectionEngine::new(Planar, None);
        let tri = CensusBlock::new(
            "7".into(),
            MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0)]]),
        );
        let d = descriptor("points", GeometryKind::Point);
        let s = selected(engine.filter_region(
            &RegionShape::CensusBlock(Rc::new(tri)),
            &[&d],
            &datasets(),
        ));
        // (5,5) lies on the hypotenuse, (0,0) on a vertex
        assert_eq!(s.total(), 2);
    }

    #[test]
    fn oversized_regions_are_reported_not_filtered() {
        // 100 m x 100 m in planar units is ~2.47 acres
        let engine = SelectionEngine::new(Planar, Some(2.0));
        let big = RegionShape::Rectangle(Bounds {
            west: 0.0,
            south: 0.0,
            east: 100.0,
            north: 100.0,
        });
        let d = descriptor("points", GeometryKind::Point);
        assert_eq!(engine.filter_region(&big, &[&d], &datasets()), FilterOutcome::TooLarge);
        let s = selected(engine.filter_region(&region(), &[&d], &datasets()));
        assert_eq!(s.total(), 3);
    }

    #[test]
    fn only_latest_request_is_current() {
        let mut t = RequestTracker::default();
        let a = t.issue();
        let b = t.issue();
        assert!(!t.is_current(a));
        assert!(t.is_current(b));
        t.invalidate();
        assert!(!t.is_current(b));
    }

    #[test]
    fn cache_keys_ignore_model_order_and_invalidate_by_model() {
        let mut cache = SelectionCache::default();
        let k1 = SelectionKey::new(&region(), &["b".into(), "a".into()]);
        let k2 = SelectionKey::new(&region(), &["a".into(), "b".into()]);
        assert_eq!(k1, k2);
        cache.insert(k1, Rc::new(FilterOutcome::TooLarge));
        assert!(cache.get(&k2).is_some());
        let k3 = SelectionKey::new(&region(), &["c".into()]);
        cache.insert(k3.clone(), Rc::new(FilterOutcome::TooLarge));
        cache.invalidate_model("a");
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k3).is_some());
        assert_eq!(cache.len(), 1);
    }
}
