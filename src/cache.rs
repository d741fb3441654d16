// Payloads are stored as the raw JSON they were fetched as, one entry per model

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;

use crate::error::ViewerError;
use crate::geojson::ModelPayload;
use crate::model::ModelDataset;
use crate::util::{clog, cwarn};

pub const KEY_PREFIX: &str = "gc_model_";

pub fn storage_key(model: &str) -> String {
    format!("{}{}", KEY_PREFIX, model)
}

pub trait DatasetStore {
    fn get(&self, model: &str) -> Result<Option<String>, ViewerError>;
    fn put(&self, model: &str, raw: &str) -> Result<(), ViewerError>;
}

/// `window.localStorage`, the same store the viewer keeps its settings in.
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn open() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok().flatten()?;
        Some(Self { storage })
    }
}

impl DatasetStore for LocalStorageStore {
    fn get(&self, model: &str) -> Result<Option<String>, ViewerError> {
        self.storage
            .get_item(&storage_key(model))
            .map_err(|e| ViewerError::Storage(format!("{:?}", e)))
    }

    fn put(&self, model: &str, raw: &str) -> Result<(), ViewerError> {
        self.storage
            .set_item(&storage_key(model), raw)
            .map_err(|e| ViewerError::Storage(format!("{:?}", e)))
    }
}

/// In-memory store; used when localStorage is unavailable and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes fail, like a full localStorage.
    pub fn read_only() -> Self {
        Self {
            entries: RefCell::default(),
            read_only: true,
        }
    }

    pub fn contains(&self, model: &str) -> bool {
        self.entries.borrow().contains_key(&storage_key(model))
    }

    pub fn insert_raw(&self, model: &str, raw: &str) {
        self.entries.borrow_mut().insert(storage_key(model), raw.to_string());
    }
}

impl DatasetStore for MemoryStore {
    fn get(&self, model: &str) -> Result<Option<String>, ViewerError> {
        Ok(self.entries.borrow().get(&storage_key(model)).cloned())
    }

    fn put(&self, model: &str, raw: &str) -> Result<(), ViewerError> {
        if self.read_only {
            return Err(ViewerError::Storage("quota exceeded".to_string()));
        }
        self.insert_raw(model, raw);
        Ok(())
    }
}

/// Serves a model from the store when it holds a readable copy, otherwise
/// fetches, decodes and stores it. A failed store write never fails the load.
pub async fn load_with_cache<S, F, Fut>(
    store: &S,
    model: &str,
    fetch: F,
) -> Result<ModelDataset, ViewerError>
where
    S: DatasetStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, ViewerError>>,
{
    match store.get(model) {
        Ok(Some(raw)) => match serde_json::from_str::<ModelPayload>(&raw) {
            Ok(payload) => {
                clog(&format!("{}: restored from cache", model));
                return Ok(payload.into_dataset(model));
            }
            Err(e) => cwarn(&format!("{}: discarding unreadable cache entry ({})", model, e)),
        },
        Ok(None) => {}
        Err(e) => cwarn(&format!("{}: cache read failed ({})", model, e)),
    }

    let raw = fetch().await?;
    let payload: ModelPayload = serde_json::from_str(&raw)?;
    if let Err(e) = store.put(model, &raw) {
        cwarn(&format!("{}: not cached ({})", model, e));
    }
    Ok(payload.into_dataset(model))
}
