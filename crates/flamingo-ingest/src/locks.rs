use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use flamingo_types::ProjectId;

/// Registry of one mutex per project.
///
/// Holding a project's lock orders every step-advancing operation on that
/// project. Distinct projects never share a lock. The guarded value is `()`,
/// so a poisoned lock carries no broken state and is recovered.
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `project`, created on first use.
    pub fn handle(&self, project: ProjectId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(project).or_default())
    }

    /// Drop the registry entry of a deleted project. In-flight holders keep
    /// their handle until they finish.
    pub fn forget(&self, project: ProjectId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.remove(&project);
    }

    /// Number of projects with a registered lock.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
