use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use flamingo_store::{ConflictPolicy, ProjectRegistry, Storage};
use flamingo_types::{CandidateItem, Item, NewItem, ProjectId, Step};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{IngestError, IngestResult};
use crate::locks::ProjectLocks;

/// Outcome of one ingestion batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestReport {
    pub project: ProjectId,
    /// Step every inserted item was tagged with.
    pub step: Step,
    /// Project step after the batch.
    pub next_step: Step,
    /// Items actually stored, in candidate order.
    pub inserted: Vec<Item>,
    /// Candidate keys left out because the key was already taken, either in
    /// the store or earlier in the same batch.
    pub skipped: Vec<String>,
}

impl IngestReport {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Runs ingestion batches against a [`Storage`].
///
/// Each call to [`ingest`](Self::ingest) is one batch: read step `s`, insert
/// the non-conflicting candidates tagged with `s`, advance the project to
/// `s + 1`, commit. The step advances even when nothing was inserted, since
/// it counts batches rather than successful inserts. Any failure before
/// commit leaves both the items and the step untouched.
pub struct IngestionEngine {
    storage: Arc<dyn Storage>,
    locks: ProjectLocks,
}

impl IngestionEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            locks: ProjectLocks::new(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Ingest one batch of candidates into `project`. Taken keys are skipped.
    pub fn ingest(
        &self,
        project: ProjectId,
        candidates: Vec<CandidateItem>,
    ) -> IngestResult<IngestReport> {
        self.ingest_with_policy(project, candidates, ConflictPolicy::Ignore)
    }

    /// Like [`ingest`](Self::ingest), but any taken or repeated key fails the
    /// batch with [`StoreError::DuplicateKey`](flamingo_store::StoreError)
    /// and the step stays where it was.
    pub fn ingest_strict(
        &self,
        project: ProjectId,
        candidates: Vec<CandidateItem>,
    ) -> IngestResult<IngestReport> {
        self.ingest_with_policy(project, candidates, ConflictPolicy::Reject)
    }

    fn ingest_with_policy(
        &self,
        project: ProjectId,
        candidates: Vec<CandidateItem>,
        policy: ConflictPolicy,
    ) -> IngestResult<IngestReport> {
        for candidate in &candidates {
            candidate.validate()?;
        }

        let handle = self.locks.handle(project);
        let _serialized = handle.lock().unwrap_or_else(PoisonError::into_inner);

        let mut tx = self.storage.begin()?;
        let current = tx
            .project(project)?
            .ok_or(IngestError::ProjectNotFound(project))?;
        let step = current.step;
        debug!(
            %project,
            %step,
            ?policy,
            candidates = candidates.len(),
            "ingestion batch started"
        );

        let tagged: Vec<NewItem> = candidates
            .into_iter()
            .map(|candidate| candidate.tag(project, step))
            .collect();
        let inserted = tx.insert_items(&tagged, policy)?;
        let next_step = tx.advance_step(project, step)?;
        tx.commit()?;

        let mut accepted: HashSet<&str> = inserted.iter().map(|item| item.key.as_str()).collect();
        let skipped: Vec<String> = tagged
            .iter()
            .filter(|item| !accepted.remove(item.key.as_str()))
            .map(|item| item.key.clone())
            .collect();

        info!(
            %project,
            %step,
            inserted = inserted.len(),
            skipped = skipped.len(),
            "ingestion batch committed"
        );

        Ok(IngestReport {
            project,
            step,
            next_step,
            inserted,
            skipped,
        })
    }

    /// Delete a project and its items, ordered after any running batch of
    /// the same project. Returns the number of items removed.
    pub fn delete_project(&self, project: ProjectId) -> IngestResult<usize> {
        let handle = self.locks.handle(project);
        let removed = {
            let _serialized = handle.lock().unwrap_or_else(PoisonError::into_inner);
            self.storage.delete_project(project)
        };
        self.locks.forget(project);
        let removed = removed?;
        info!(%project, items = removed, "project deleted");
        Ok(removed)
    }
}

impl std::fmt::Debug for IngestionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionEngine")
            .field("locked_projects", &self.locks.len())
            .finish()
    }
}
