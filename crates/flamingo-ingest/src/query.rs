use std::collections::HashSet;
use std::sync::Arc;

use flamingo_store::{KeyStore, Storage};
use flamingo_types::{Item, ProjectId, Step};
use serde::Serialize;

use crate::error::IngestResult;

/// Candidate keys split by whether the project already holds them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyPartition {
    pub known: Vec<Item>,
    pub unknown: Vec<String>,
}

/// Read-only queries over a project's keys. Never touches step state.
#[derive(Clone)]
pub struct QueryLayer {
    storage: Arc<dyn Storage>,
}

impl QueryLayer {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Full records of every candidate key stored under `project`.
    pub fn known(&self, project: ProjectId, keys: &[String]) -> IngestResult<Vec<Item>> {
        Ok(self.storage.filter_by_keys(project, keys)?)
    }

    /// Candidate keys with no item under `project`.
    ///
    /// Each key is reported once, in the order it first appears in `keys`.
    /// A key held by a different project counts as unknown here.
    pub fn unknown(&self, project: ProjectId, keys: &[String]) -> IngestResult<Vec<String>> {
        Ok(self.partition(project, keys)?.unknown)
    }

    /// Both halves of the candidate set from a single lookup.
    pub fn partition(&self, project: ProjectId, keys: &[String]) -> IngestResult<KeyPartition> {
        let known = self.known(project, keys)?;
        let mut excluded: HashSet<&str> = known.iter().map(|item| item.key.as_str()).collect();
        let unknown = keys
            .iter()
            .filter(|key| excluded.insert(key.as_str()))
            .cloned()
            .collect();
        Ok(KeyPartition { known, unknown })
    }

    pub fn items(&self, project: ProjectId) -> IngestResult<Vec<Item>> {
        Ok(self.storage.items_for_project(project)?)
    }

    /// Every item that `project` stored in batch `step`.
    pub fn batch(&self, project: ProjectId, step: Step) -> IngestResult<Vec<Item>> {
        Ok(self.storage.items_for_step(project, step)?)
    }
}

impl std::fmt::Debug for QueryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryLayer").finish_non_exhaustive()
    }
}
