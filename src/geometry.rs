use geo::{Area, ChamberlainDuquetteArea, Centroid, Intersects, MultiPolygon, Point, Polygon};

use crate::model::{Bounds, FeatureGeometry};

pub trait GeometryAdapter {
    /// Unsigned area of `shape` in square meters.
    fn area_sq_m(&self, shape: &MultiPolygon<f64>) -> f64;

    fn centroid(&self, shape: &MultiPolygon<f64>) -> Option<Point<f64>> {
        shape.centroid()
    }

    /// Point-in-polygon test. Points on the region boundary count as inside.
    fn contains_point(&self, region: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
        region.0.iter().any(|poly| poly.intersects(&point.0))
    }

    fn polygon_from_bounds(&self, bounds: &Bounds) -> Polygon<f64> {
        bounds.to_rect().to_polygon()
    }

    /// Footprint of a detection; points have no area.
    fn feature_area_sq_m(&self, geometry: &FeatureGeometry) -> f64 {
        match geometry {
            FeatureGeometry::Point(_) => 0.0,
            FeatureGeometry::Polygon(shape) => self.area_sq_m(shape),
        }
    }
}

/// Lon/lat degrees on a sphere of the WGS84 equatorial radius.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Geodesic;

impl GeometryAdapter for Geodesic {
    fn area_sq_m(&self, shape: &MultiPolygon<f64>) -> f64 {
        shape
            .0
            .iter()
            .map(|poly| poly.chamberlain_duquette_unsigned_area())
            .sum()
    }
}

/// Coordinates already projected to meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Planar;

impl GeometryAdapter for Planar {
    fn area_sq_m(&self, shape: &MultiPolygon<f64>) -> f64 {
        shape.0.iter().map(|poly| poly.unsigned_area()).sum()
    }
}
