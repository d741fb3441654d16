// Every field has a default; a partial config.json only overrides what it names

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::model::{GeometryKind, LatLng, ModelDescriptor};

pub const CONFIG_URL: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Backend {
    /// Filtering and densities come from the API server.
    Server {
        #[serde(default)]
        base_url: String,
    },
    /// Whole datasets are fetched once, cached, and filtered in the browser.
    Local {
        #[serde(default = "default_data_root")]
        data_root: String,
    },
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Server {
            base_url: String::new(),
        }
    }
}

fn default_data_root() -> String {
    "data".to_string()
}

impl Backend {
    pub fn is_local(&self) -> bool {
        matches!(self, Backend::Local { .. })
    }

    /// Endpoint under the server root, tolerating a trailing slash in the base.
    pub fn api_url(&self, path: &str) -> Option<String> {
        match self {
            Backend::Server { base_url } => Some(format!(
                "{}/api/{}",
                base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )),
            Backend::Local { .. } => None,
        }
    }

    pub fn dataset_url(&self, model: &str) -> Option<String> {
        match self {
            Backend::Local { data_root } => {
                Some(format!("{}/{}.json", data_root.trim_end_matches('/'), model))
            }
            Backend::Server { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseLayer {
    #[default]
    Satellite,
    Streets,
    Terrain,
    Plain,
}

impl BaseLayer {
    pub const ALL: [BaseLayer; 4] = [
        BaseLayer::Satellite,
        BaseLayer::Streets,
        BaseLayer::Terrain,
        BaseLayer::Plain,
    ];

    /// Tile URL for a slippy-map tile, or `None` for the plain background.
    pub fn tile_url(self, z: u32, x: u32, y: u32) -> Option<String> {
        match self {
            BaseLayer::Satellite => Some(format!(
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{}/{}/{}",
                z, y, x
            )),
            BaseLayer::Streets => Some(format!("https://tile.openstreetmap.org/{}/{}/{}.png", z, x, y)),
            BaseLayer::Terrain => Some(format!("https://a.tile.opentopomap.org/{}/{}/{}.png", z, x, y)),
            BaseLayer::Plain => None,
        }
    }

    pub fn max_zoom(self) -> u32 {
        match self {
            BaseLayer::Terrain => 17,
            _ => 19,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BaseLayer::Satellite => "Satellite",
            BaseLayer::Streets => "Streets",
            BaseLayer::Terrain => "Terrain",
            BaseLayer::Plain => "None",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            BaseLayer::Satellite => "satellite",
            BaseLayer::Streets => "streets",
            BaseLayer::Terrain => "terrain",
            BaseLayer::Plain => "plain",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.key() == key)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub backend: Backend,
    pub blocks_url: String,
    pub initial_center: LatLng,
    pub initial_zoom: f64,
    /// Regions larger than this are refused before filtering. `None` disables the check.
    pub max_region_acres: Option<f64>,
    pub default_model: Option<String>,
    pub base_layer: BaseLayer,
    pub models: Vec<ModelDescriptor>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            blocks_url: "data/census_blocks.geojson".to_string(),
            initial_center: LatLng::new(34.156113, -118.131943),
            initial_zoom: 13.0,
            max_region_acres: None,
            default_model: Some("training".to_string()),
            base_layer: BaseLayer::Satellite,
            models: default_models(),
        }
    }
}

pub fn default_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor {
            id: "training".to_string(),
            kind: GeometryKind::Point,
            color: "#4842f5".to_string(),
            size: 3.0,
            label: "Public Tree Inventory".to_string(),
            tooltip: "Training dataset with labeled street trees provided by the city of Pasadena. \
                      This data is the limited, public-facing data set of the City's public tree inventory"
                .to_string(),
        },
        ModelDescriptor {
            id: "baseline".to_string(),
            kind: GeometryKind::Point,
            color: "#fa1d6eff".to_string(),
            size: 3.0,
            label: "Detected Tree Points".to_string(),
            tooltip: "Model initiated with a VGG16 fully convolutional network. \
                      Foundational for detecting tree locations to support further canopy analysis."
                .to_string(),
        },
        ModelDescriptor {
            id: "deepforest".to_string(),
            kind: GeometryKind::Polygon,
            color: "#59fff1".to_string(),
            size: 3.0,
            label: "Canopy Detection".to_string(),
            tooltip: "Detected trees using the DeepForest detection model, merging overlapped boxes \
                      on 60cm/pixel images"
                .to_string(),
        },
    ]
}

impl ViewerConfig {
    pub fn from_json(raw: &str) -> Result<Self, ViewerError> {
        let mut cfg: ViewerConfig = serde_json::from_str(raw)?;
        cfg.initial_zoom = cfg.initial_zoom.clamp(
            crate::state::viewport::MIN_ZOOM,
            crate::state::viewport::MAX_ZOOM,
        );
        if cfg.max_region_acres.is_some_and(|a| !(a > 0.0)) {
            cfg.max_region_acres = None;
        }
        Ok(cfg)
    }

    /// Fetches `config.json`; a missing or broken file falls back to the defaults.
    pub async fn load() -> Self {
        match crate::service::fetch_text(CONFIG_URL).await.and_then(|raw| Self::from_json(&raw)) {
            Ok(cfg) => {
                crate::util::clog(&format!("config loaded: {} models", cfg.models.len()));
                cfg
            }
            Err(e) => {
                crate::util::cwarn(&format!("using default config ({})", e));
                Self::default()
            }
        }
    }
}
