// Yearly figures: 10 kg CO₂ and 0.015 kg PM2.5 per tree, 4.7 kg PM2.5 per hectare of canopy

use std::collections::HashSet;

use crate::geometry::GeometryAdapter;
use crate::model::{FeatureGeometry, RegionShape};
use crate::selection::RegionSelection;

pub const SQ_M_PER_ACRE: f64 = 4046.8564224;
pub const ACRES_PER_HECTARE: f64 = 2.47105;
const SQ_M_PER_HECTARE: f64 = 10_000.0;

pub const CO2_KG_PER_TREE: f64 = 10.0;
pub const PM25_KG_PER_TREE: f64 = 0.015;
pub const CANOPY_PM25_KG_PER_HECTARE: f64 = 4.7;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pm25Estimate {
    /// No canopy polygons in the selection: per-tree removal.
    PerTree { kg: f64, tonnes: f64 },
    /// Canopy polygons present: area-based removal, averaged over the models that drew them.
    Canopy {
        canopy_hectares: f64,
        contributing_models: usize,
        kg: f64,
        tonnes: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImpactStats {
    pub area_sq_m: f64,
    pub acres: f64,
    pub hectares: f64,
    pub active_models: usize,
    pub avg_tree_count: f64,
    /// Trees per hectare.
    pub avg_density: f64,
    pub co2_kg: f64,
    pub co2_tonnes: f64,
    pub pm25: Pm25Estimate,
}

fn acres_and_hectares(area_sq_m: f64) -> (f64, f64) {
    let acres = area_sq_m / SQ_M_PER_ACRE;
    (acres, acres / ACRES_PER_HECTARE)
}

impl ImpactStats {
    /// Area figures only; every count and mass is zero.
    pub fn empty(area_sq_m: f64, active_models: usize) -> Self {
        let area_sq_m = if area_sq_m.is_finite() { area_sq_m.max(0.0) } else { 0.0 };
        let (acres, hectares) = acres_and_hectares(area_sq_m);
        Self {
            area_sq_m,
            acres,
            hectares,
            active_models,
            avg_tree_count: 0.0,
            avg_density: 0.0,
            co2_kg: 0.0,
            co2_tonnes: 0.0,
            pm25: Pm25Estimate::PerTree {
                kg: 0.0,
                tonnes: 0.0,
            },
        }
    }
}

pub struct ImpactAggregator<G> {
    geometry: G,
}

impl<G: GeometryAdapter> ImpactAggregator<G> {
    pub fn new(geometry: G) -> Self {
        Self { geometry }
    }

    pub fn aggregate(
        &self,
        region: &RegionShape,
        selection: &RegionSelection,
        active_models: usize,
    ) -> ImpactStats {
        let area = self.geometry.area_sq_m(&region.polygon());
        self.aggregate_area(area, selection, active_models)
    }

    pub fn aggregate_area(
        &self,
        area_sq_m: f64,
        selection: &RegionSelection,
        active_models: usize,
    ) -> ImpactStats {
        let mut stats = ImpactStats::empty(area_sq_m, active_models);
        if active_models == 0 || !(stats.hectares > 0.0) || selection.is_empty() {
            return stats;
        }

        let avg_tree_count = selection.total() as f64 / active_models as f64;
        stats.avg_tree_count = avg_tree_count;
        stats.avg_density = avg_tree_count / stats.hectares;
        stats.co2_kg = avg_tree_count * CO2_KG_PER_TREE;
        stats.co2_tonnes = stats.co2_kg / 1000.0;

        let mut canopy_models: HashSet<&str> = HashSet::new();
        let mut canopy_sq_m = 0.0;
        let mut has_canopy = false;
        for f in selection.combined() {
            if let FeatureGeometry::Polygon(_) = f.feature.geometry {
                has_canopy = true;
                canopy_models.insert(&f.model);
                canopy_sq_m += self.geometry.feature_area_sq_m(&f.feature.geometry);
            }
        }

        stats.pm25 = if has_canopy {
            let contributing_models = canopy_models.len().max(1);
            let canopy_hectares = canopy_sq_m / contributing_models as f64 / SQ_M_PER_HECTARE;
            let kg = canopy_hectares * CANOPY_PM25_KG_PER_HECTARE;
            Pm25Estimate::Canopy {
                canopy_hectares,
                contributing_models,
                kg,
                tonnes: kg / 1000.0,
            }
        } else {
            let kg = avg_tree_count * PM25_KG_PER_TREE;
            Pm25Estimate::PerTree {
                kg,
                tonnes: kg / 1000.0,
            }
        };
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Planar;
    use crate::model::{DetectionFeature, GeometryKind, TaggedFeature};
    use crate::selection::ModelSelection;
    use geo::{point, polygon, MultiPolygon};
    use std::rc::Rc;

    fn points(model: &str, n: usize) -> ModelSelection {
        let model: Rc<str> = Rc::from(model);
        let features = (0..n)
            .map(|i| TaggedFeature {
                model: model.clone(),
                feature: Rc::new(DetectionFeature {
                    geometry: FeatureGeometry::Point(point!(x: i as f64, y: 0.0)),
                    confidence: None,
                    density: None,
                }),
            })
            .collect();
        ModelSelection {
            model,
            kind: GeometryKind::Point,
            features,
        }
    }

    fn square_box(model: &Rc<str>, x0: f64, side: f64) -> TaggedFeature {
        TaggedFeature {
            model: model.clone(),
            feature: Rc::new(DetectionFeature {
                geometry: FeatureGeometry::Polygon(MultiPolygon(vec![polygon![
                    (x: x0, y: 0.0), (x: x0 + side, y: 0.0), (x: x0 + side, y: side), (x: x0, y: side), (x: x0, y: 0.0),
                ]])),
                confidence: None,
                density: None,
            }),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ten_acre_point_example() {
        let agg = ImpactAggregator::new(Planar);
        let sel = RegionSelection {
            per_model: vec![points("training", 50)],
        };
        let s = agg.aggregate_area(10.0 * SQ_M_PER_ACRE, &sel, 1);
        assert!(close(s.acres, 10.0));
        assert!(close(s.hectares, 10.0 / 2.47105));
        assert_eq!(s.avg_tree_count, 50.0);
        assert!(close(s.avg_density, 50.0 / (10.0 / 2.47105)));
        assert!((s.avg_density - 12.355).abs() < 1e-3);
        assert_eq!(s.co2_kg, 500.0);
        assert_eq!(s.co2_tonnes, 0.5);
        match s.pm25 {
            Pm25Estimate::PerTree { kg, tonnes } => {
                assert!(close(kg, 0.75));
                assert!(close(tonnes, 0.00075));
            }
            other => panic!("expected per-tree estimate, got {:?}", other),
        }
    }

    #[test]
    fn tree_count_is_averaged_over_active_models() {
        let agg = ImpactAggregator::new(Planar);
        let sel = RegionSelection {
            per_model: vec![points("a", 30), points("b", 10)],
        };
        let s = agg.aggregate_area(SQ_M_PER_HECTARE, &sel, 2);
        assert_eq!(s.avg_tree_count, 20.0);
        assert_eq!(s.co2_kg, 200.0);
    }

    #[test]
    fn canopy_area_is_averaged_over_contributing_models() {
        let agg = ImpactAggregator::new(Planar);
        let a: Rc<str> = Rc::from("boxes_a");
        let b: Rc<str> = Rc::from("boxes_b");
        // 2 ha of boxes in total, split across two models
        let sel = RegionSelection {
            per_model: vec![
                ModelSelection {
                    model: a.clone(),
                    kind: GeometryKind::Polygon,
                    features: vec![square_box(&a, 0.0, 100.0)],
                },
                ModelSelection {
                    model: b.clone(),
                    kind: GeometryKind::Polygon,
                    features: vec![square_box(&b, 500.0, 100.0)],
                },
            ],
        };
        let s = agg.aggregate_area(50_000.0, &sel, 2);
        match s.pm25 {
            Pm25Estimate::Canopy {
                canopy_hectares,
                contributing_models,
                kg,
                tonnes,
            } => {
                assert_eq!(contributing_models, 2);
                assert!(close(canopy_hectares, 1.0));
                assert!(close(kg, 4.7));
                assert!(close(tonnes, 0.0047));
            }
            other => panic!("expected canopy estimate, got {:?}", other),
        }
        assert_eq!(s.avg_tree_count, 1.0);
        assert_eq!(s.co2_kg, 10.0);
    }

    #[test]
    fn mixed_selection_uses_canopy_branch_with_only_box_models_counted() {
        let agg = ImpactAggregator::new(Planar);
        let boxes: Rc<str> = Rc::from("deepforest");
        let sel = RegionSelection {
            per_model: vec![
                points("training", 4),
                ModelSelection {
                    model: boxes.clone(),
                    kind: GeometryKind::Polygon,
                    features: vec![square_box(&boxes, 0.0, 50.0), square_box(&boxes, 100.0, 50.0)],
                },
            ],
        };
        let s = agg.aggregate_area(100_000.0, &sel, 2);
        assert_eq!(s.avg_tree_count, 3.0);
        match s.pm25 {
            Pm25Estimate::Canopy {
                canopy_hectares,
                contributing_models,
                ..
            } => {
                assert_eq!(contributing_models, 1);
                assert!(close(canopy_hectares, 0.5));
            }
            other => panic!("expected canopy estimate, got {:?}", other),
        }
    }

    #[test]
    fn zero_guards_never_produce_nan() {
        let agg = ImpactAggregator::new(Planar);
        let sel = RegionSelection {
            per_model: vec![points("a", 12)],
        };
        for s in [
            agg.aggregate_area(0.0, &sel, 1),
            agg.aggregate_area(10_000.0, &sel, 0),
            agg.aggregate_area(f64::NAN, &sel, 1),
            agg.aggregate_area(10_000.0, &RegionSelection::default(), 3),
        ] {
            assert_eq!(s.avg_tree_count, 0.0);
            assert_eq!(s.avg_density, 0.0);
            assert_eq!(s.co2_kg, 0.0);
            assert!(s.hectares.is_finite());
            assert_eq!(s.pm25, Pm25Estimate::PerTree { kg: 0.0, tonnes: 0.0 });
        }
    }

    #[test]
    fn aggregate_measures_the_region_itself() {
        let agg = ImpactAggregator::new(Planar);
        let region = RegionShape::Rectangle(crate::model::Bounds {
            west: 0.0,
            south: 0.0,
            east: 200.0,
            north: 50.0,
        });
        let sel = RegionSelection {
            per_model: vec![points("a", 5)],
        };
        let s = agg.aggregate(&region, &sel, 1);
        assert_eq!(s.area_sq_m, 10_000.0);
        assert!(close(s.avg_density, 5.0 / s.hectares));
    }
}
