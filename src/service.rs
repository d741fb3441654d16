use std::collections::HashMap;

use gloo_net::http::Request;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{load_with_cache, DatasetStore};
use crate::config::Backend;
use crate::error::ViewerError;
use crate::geojson::{FeatureCollection, Geometry};
use crate::geometry::{Geodesic, GeometryAdapter};
use crate::model::{BlockId, CensusBlock, ModelDataset, ModelDescriptor, ModelId, RegionShape, TaggedFeature};
use crate::selection::{FilterOutcome, ModelSelection, RegionSelection};

pub const BIG_AREA: &str = "bigArea";
const PAYLOAD_TOO_LARGE: u16 = 413;

pub async fn fetch_text(url: &str) -> Result<String, ViewerError> {
    let resp = Request::get(url)
        .send()
        .await
        .map_err(|e| ViewerError::network(url, e))?;
    if !resp.ok() {
        return Err(ViewerError::Status {
            url: url.to_string(),
            status: resp.status(),
        });
    }
    resp.text().await.map_err(|e| ViewerError::network(url, e))
}

async fn post_json<B: Serialize>(url: &str, body: &B) -> Result<(u16, String), ViewerError> {
    let resp = Request::post(url)
        .json(body)
        .map_err(|e| ViewerError::network(url, e))?
        .send()
        .await
        .map_err(|e| ViewerError::network(url, e))?;
    let status = resp.status();
    let text = resp.text().await.map_err(|e| ViewerError::network(url, e))?;
    Ok((status, text))
}

pub async fn fetch_blocks(url: &str) -> Result<Vec<CensusBlock>, ViewerError> {
    let raw = fetch_text(url).await?;
    let fc: FeatureCollection = serde_json::from_str(&raw)?;
    Ok(fc.census_blocks())
}

/// Local mode: whole dataset through the read-through cache.
pub async fn load_dataset(
    store: &dyn DatasetStore,
    backend: &Backend,
    model: &str,
) -> Result<ModelDataset, ViewerError> {
    let url = backend
        .dataset_url(model)
        .ok_or_else(|| ViewerError::Storage(format!("no dataset location for {}", model)))?;
    load_with_cache(store, model, || async move { fetch_text(&url).await }).await
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterRequest {
    pub models: Vec<ModelId>,
    #[serde(rename = "blockID", skip_serializing_if = "Option::is_none")]
    pub block_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Geometry>,
}

impl FilterRequest {
    pub fn for_region(region: &RegionShape, models: Vec<ModelId>) -> Self {
        match region {
            RegionShape::CensusBlock(block) => Self {
                models,
                block_id: Some(block_id_value(&block.id)),
                polygon: None,
            },
            RegionShape::Rectangle(b) | RegionShape::StreetTile(b) => Self {
                models,
                block_id: None,
                polygon: Some(Geometry::from_polygon(&Geodesic.polygon_from_bounds(b))),
            },
        }
    }
}

/// OBJECTIDs go out as numbers when they are numeric.
fn block_id_value(id: &BlockId) -> Value {
    match id.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(id.as_str()),
    }
}

#[derive(Serialize)]
struct DensityRequest<'a> {
    models: &'a [ModelId],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FilterResponse {
    Refused { error: String },
    Models(HashMap<ModelId, ModelResult>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelResult {
    Collection(FeatureCollection),
    // an empty dataset comes back as []
    Empty(Vec<Value>),
}

/// Turns a `get_filtered_trees` reply into a filter outcome for `active`
/// (registration order). Models missing from the reply come back empty.
pub fn decode_filter_response(
    status: u16,
    body: &str,
    active: &[ModelDescriptor],
) -> Result<FilterOutcome, ViewerError> {
    if status == PAYLOAD_TOO_LARGE {
        return Ok(FilterOutcome::TooLarge);
    }
    let parsed = serde_json::from_str::<FilterResponse>(body);
    match parsed {
        Ok(FilterResponse::Refused { error }) if error == BIG_AREA => Ok(FilterOutcome::TooLarge),
        Ok(FilterResponse::Models(map)) if (200..300).contains(&status) => {
            let per_model = active
                .iter()
                .map(|d| {
                    let model: std::rc::Rc<str> = std::rc::Rc::from(d.id.as_str());
                    let features = match map.get(&d.id) {
                        Some(ModelResult::Collection(fc)) => fc
                            .detections()
                            .into_iter()
                            .map(|feature| TaggedFeature {
                                model: model.clone(),
                                feature,
                            })
                            .collect(),
                        Some(ModelResult::Empty(_)) | None => Vec::new(),
                    };
                    ModelSelection {
                        model,
                        kind: d.kind,
                        features,
                    }
                })
                .collect();
            Ok(FilterOutcome::Selected(RegionSelection { per_model }))
        }
        Err(e) if (200..300).contains(&status) => Err(ViewerError::Decode(e)),
        _ => Err(ViewerError::Status {
            url: "/api/get_filtered_trees".to_string(),
            status,
        }),
    }
}

/// `{OBJECTID: density}`; non-numeric values are skipped.
pub fn decode_density_response(body: &str) -> Result<HashMap<BlockId, f64>, ViewerError> {
    let raw: HashMap<String, Value> = serde_json::from_str(body)?;
    Ok(raw
        .into_iter()
        .filter_map(|(id, v)| {
            let d = match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }?;
            d.is_finite().then_some((id.trim_matches('"').to_string(), d))
        })
        .collect())
}

/// Client for the filtering API.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiClient {
    backend: Backend,
}

impl ApiClient {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    fn url(&self, path: &str) -> Result<String, ViewerError> {
        self.backend
            .api_url(path)
            .ok_or_else(|| ViewerError::Network {
                url: path.to_string(),
                reason: "no API server configured".to_string(),
            })
    }

    pub async fn filtered_trees(
        &self,
        region: &RegionShape,
        active: &[ModelDescriptor],
    ) -> Result<FilterOutcome, ViewerError> {
        let url = self.url("get_filtered_trees")?;
        let body = FilterRequest::for_region(region, active.iter().map(|d| d.id.clone()).collect());
        let (status, text) = post_json(&url, &body).await?;
        decode_filter_response(status, &text, active)
    }

    pub async fn density(&self, models: &[ModelId]) -> Result<HashMap<BlockId, f64>, ViewerError> {
        let url = self.url("get_density")?;
        let (status, text) = post_json(&url, &DensityRequest { models }).await?;
        if !(200..300).contains(&status) {
            return Err(ViewerError::Status { url, status });
        }
        decode_density_response(&text)
    }
}
