use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::model::{ModelDataset, ModelDescriptor, ModelId};

#[derive(Clone, Debug, PartialEq)]
pub enum LoadStatus {
    Pending,
    Loading,
    /// Usable. `remote` models are filtered by the backend, so they carry no local dataset.
    Ready { remote: bool },
    Failed(String),
}

impl LoadStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadStatus::Ready { .. } | LoadStatus::Failed(_))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub completed: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u32
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRegistry {
    /// Registration order is display and result order.
    descriptors: Vec<ModelDescriptor>,
    datasets: HashMap<ModelId, Rc<ModelDataset>>,
    status: HashMap<ModelId, LoadStatus>,
    active: HashSet<ModelId>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds static metadata; registering the same id twice keeps the first entry.
    pub fn register_model(&mut self, descriptor: ModelDescriptor) {
        if self.descriptor(&descriptor.id).is_some() {
            return;
        }
        self.status.insert(descriptor.id.clone(), LoadStatus::Pending);
        self.descriptors.push(descriptor);
    }

    pub fn descriptor(&self, id: &str) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    pub fn status(&self, id: &str) -> Option<&LoadStatus> {
        self.status.get(id)
    }

    pub fn begin_load(&mut self, id: &str) {
        if let Some(s) = self.status.get_mut(id) {
            *s = LoadStatus::Loading;
        }
    }

    pub fn finish_load(&mut self, dataset: ModelDataset) -> bool {
        let id = dataset.model_id.clone();
        let Some(s) = self.status.get_mut(&id) else {
            return false;
        };
        *s = LoadStatus::Ready { remote: false };
        self.datasets.insert(id, Rc::new(dataset));
        true
    }

    /// Marks a model usable without a local dataset (server-backed filtering).
    pub fn mark_remote(&mut self, id: &str) -> bool {
        match self.status.get_mut(id) {
            Some(s) => {
                *s = LoadStatus::Ready { remote: true };
                true
            }
            None => false,
        }
    }

    pub fn fail_load(&mut self, id: &str, reason: String) {
        if let Some(s) = self.status.get_mut(id) {
            *s = LoadStatus::Failed(reason);
        }
    }

    pub fn is_ready(&self, id: &str) -> bool {
        matches!(self.status.get(id), Some(LoadStatus::Ready { .. }))
    }

    /// Returns whether the active set changed. Unknown or not-yet-loaded models are ignored.
    pub fn activate(&mut self, id: &str) -> bool {
        if !self.is_ready(id) {
            return false;
        }
        self.active.insert(id.to_string())
    }

    pub fn deactivate(&mut self, id: &str) -> bool {
        self.active.remove(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_descriptors(&self) -> Vec<&ModelDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| self.active.contains(&d.id))
            .collect()
    }

    pub fn active_ids(&self) -> Vec<ModelId> {
        self.active_descriptors().into_iter().map(|d| d.id.clone()).collect()
    }

    pub fn get_dataset(&self, id: &str) -> Option<&Rc<ModelDataset>> {
        self.datasets.get(id)
    }

    pub fn datasets(&self) -> &HashMap<ModelId, Rc<ModelDataset>> {
        &self.datasets
    }

    pub fn load_progress(&self) -> LoadProgress {
        LoadProgress {
            completed: self
                .descriptors
                .iter()
                .filter(|d| self.status.get(&d.id).is_some_and(|s| s.is_settled()))
                .count(),
            total: self.descriptors.len(),
        }
    }
}
