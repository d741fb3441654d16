use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::rc::Rc;

use crate::model::{BlockId, CensusBlock, DetectionFeature, FeatureGeometry, ModelDataset};

fn feature_collection_tag() -> String {
    "FeatureCollection".to_string()
}

fn feature_tag() -> String {
    "Feature".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_tag")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_tag")]
    pub kind: String,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Vec<f64>),
    MultiPoint(Vec<Vec<f64>>),
    LineString(Vec<Vec<f64>>),
    MultiLineString(Vec<Vec<Vec<f64>>>),
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

/// Dataset layout persisted per model: block polygons carrying a `density`
/// property, and the detections themselves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPayload {
    #[serde(default)]
    pub polygon: Option<FeatureCollection>,
    pub trees: FeatureCollection,
}

fn coord(position: &[f64]) -> Option<Coord<f64>> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

fn ring(positions: &[Vec<f64>]) -> LineString<f64> {
    positions.iter().filter_map(|p| coord(p)).collect::<Vec<_>>().into()
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let (outer, holes) = rings.split_first()?;
    let exterior = ring(outer);
    if exterior.0.len() < 3 {
        return None;
    }
    Some(Polygon::new(exterior, holes.iter().map(|h| ring(h)).collect()))
}

impl Geometry {
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            Geometry::Polygon(rings) => polygon(rings).map(|p| MultiPolygon(vec![p])),
            Geometry::MultiPolygon(polys) => {
                let parts: Vec<Polygon<f64>> = polys.iter().filter_map(|p| polygon(p)).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(MultiPolygon(parts))
                }
            }
            _ => None,
        }
    }

    pub fn to_feature_geometry(&self) -> Option<FeatureGeometry> {
        match self {
            Geometry::Point(p) => coord(p).map(|c| FeatureGeometry::Point(Point(c))),
            // single-member multipoints show up in some exports
            Geometry::MultiPoint(ps) if ps.len() == 1 => {
                coord(&ps[0]).map(|c| FeatureGeometry::Point(Point(c)))
            }
            other => other.to_multi_polygon().map(FeatureGeometry::Polygon),
        }
    }

    pub fn from_polygon(poly: &Polygon<f64>) -> Self {
        let to_ring = |ls: &LineString<f64>| ls.0.iter().map(|c| vec![c.x, c.y]).collect::<Vec<_>>();
        let mut rings = vec![to_ring(poly.exterior())];
        rings.extend(poly.interiors().iter().map(to_ring));
        Geometry::Polygon(rings)
    }
}

fn number(props: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

/// OBJECTID may arrive as a number or as a (sometimes doubly quoted) string.
pub fn object_id(props: &Map<String, Value>) -> Option<BlockId> {
    match props.get("OBJECTID")? {
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        Value::String(s) => {
            let id = s.trim().trim_matches('"');
            (!id.is_empty()).then(|| id.to_string())
        }
        _ => None,
    }
}

impl Feature {
    pub fn to_detection(&self) -> Option<DetectionFeature> {
        let geometry = self.geometry.as_ref()?.to_feature_geometry()?;
        let empty = Map::new();
        let props = self.properties.as_ref().unwrap_or(&empty);
        Some(DetectionFeature {
            geometry,
            confidence: number(props, &["score", "confidence"]),
            density: number(props, &["density"]),
        })
    }

    pub fn to_census_block(&self) -> Option<CensusBlock> {
        let id = object_id(self.properties.as_ref()?)?;
        let shape = self.geometry.as_ref()?.to_multi_polygon()?;
        Some(CensusBlock::new(id, shape))
    }
}

impl FeatureCollection {
    pub fn detections(&self) -> Vec<Rc<DetectionFeature>> {
        self.features
            .iter()
            .filter_map(|f| f.to_detection())
            .map(Rc::new)
            .collect()
    }

    pub fn census_blocks(&self) -> Vec<CensusBlock> {
        self.features.iter().filter_map(|f| f.to_census_block()).collect()
    }

    /// `OBJECTID -> density` for block features that carry both.
    pub fn block_densities(&self) -> HashMap<BlockId, f64> {
        self.features
            .iter()
            .filter_map(|f| {
                let props = f.properties.as_ref()?;
                Some((object_id(props)?, number(props, &["density"])?))
            })
            .collect()
    }
}

impl ModelPayload {
    pub fn into_dataset(self, model_id: &str) -> ModelDataset {
        ModelDataset {
            model_id: model_id.to_string(),
            features: self.trees.detections(),
            block_densities: self.polygon.as_ref().map(|p| p.block_densities()),
        }
    }
}
