use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use flamingo_types::{
    Item, ItemId, NewItem, NewProject, Project, ProjectId, ProjectPatch, Step,
};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ConflictPolicy, KeyStore, ProjectRegistry, Storage, StoreTransaction};

/// In-memory, map-based store.
///
/// Intended for tests and embedding. All state lives behind one `RwLock`,
/// taken per call. A transaction stages its items and steps outside the lock
/// and applies them on commit, so open transactions on different projects do
/// not wait for each other. Data is lost when the store is dropped.
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    projects: BTreeMap<ProjectId, Project>,
    items: BTreeMap<ItemId, Item>,
    keys: HashMap<String, ItemId>,
    /// Keys accepted by transactions that have not committed yet.
    pending: HashSet<String>,
    last_project_id: i64,
    last_item_id: i64,
}

impl MemoryState {
    fn name_taken(&self, name: &str, except: Option<ProjectId>) -> bool {
        self.projects
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }

    fn key_taken(&self, key: &str) -> bool {
        self.keys.contains_key(key) || self.pending.contains(key)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectRegistry for InMemoryStore {
    fn list_projects(&self) -> StoreResult<Vec<Project>> {
        Ok(self.read()?.projects.values().cloned().collect())
    }

    fn create_project(&self, project: &NewProject) -> StoreResult<Project> {
        project.validate()?;
        let mut state = self.write()?;
        if state.name_taken(&project.name, None) {
            return Err(StoreError::ProjectNameTaken(project.name.clone()));
        }
        state.last_project_id += 1;
        let id = ProjectId::new(state.last_project_id);
        let created = project.clone().into_project(id, Utc::now());
        state.projects.insert(id, created.clone());
        debug!(project = %id, name = %created.name, "project created");
        Ok(created)
    }

    fn get_project(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        Ok(self.read()?.projects.get(&id).cloned())
    }

    fn find_project_by_name(&self, name: &str) -> StoreResult<Option<Project>> {
        Ok(self
            .read()?
            .projects
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    fn update_project(&self, id: ProjectId, patch: &ProjectPatch) -> StoreResult<Project> {
        patch.validate()?;
        let mut state = self.write()?;
        if !state.projects.contains_key(&id) {
            return Err(StoreError::ProjectNotFound(id));
        }
        if let Some(name) = &patch.name {
            if state.name_taken(name, Some(id)) {
                return Err(StoreError::ProjectNameTaken(name.clone()));
            }
        }
        let project = state
            .projects
            .get_mut(&id)
            .ok_or(StoreError::ProjectNotFound(id))?;
        project.apply(patch, Utc::now());
        Ok(project.clone())
    }

    fn delete_project(&self, id: ProjectId) -> StoreResult<usize> {
        let mut state = self.write()?;
        if state.projects.remove(&id).is_none() {
            return Err(StoreError::ProjectNotFound(id));
        }
        let owned: Vec<ItemId> = state
            .items
            .values()
            .filter(|item| item.project == Some(id))
            .map(|item| item.id)
            .collect();
        for item_id in &owned {
            if let Some(item) = state.items.remove(item_id) {
                state.keys.remove(&item.key);
            }
        }
        debug!(project = %id, items = owned.len(), "project deleted");
        Ok(owned.len())
    }
}

impl KeyStore for InMemoryStore {
    fn items_for_project(&self, project: ProjectId) -> StoreResult<Vec<Item>> {
        Ok(self
            .read()?
            .items
            .values()
            .filter(|item| item.project == Some(project))
            .cloned()
            .collect())
    }

    fn filter_by_keys(&self, project: ProjectId, keys: &[String]) -> StoreResult<Vec<Item>> {
        let state = self.read()?;
        let mut seen = HashSet::new();
        let mut found: Vec<Item> = keys
            .iter()
            .map(String::as_str)
            .filter(|key| seen.insert(*key))
            .filter_map(|key| state.keys.get(key))
            .filter_map(|id| state.items.get(id))
            .filter(|item| item.project == Some(project))
            .cloned()
            .collect();
        found.sort_by_key(|item| item.id);
        Ok(found)
    }

    fn items_for_step(&self, project: ProjectId, step: Step) -> StoreResult<Vec<Item>> {
        Ok(self
            .read()?
            .items
            .values()
            .filter(|item| item.project == Some(project) && item.step == step)
            .cloned()
            .collect())
    }

    fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    fn delete_item(&self, id: ItemId) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state.items.remove(&id) {
            Some(item) => {
                state.keys.remove(&item.key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn item_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.items.len())
    }
}

impl Storage for InMemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(InMemoryTransaction {
            store: self,
            items: Vec::new(),
            steps: HashMap::new(),
        }))
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (projects, items) = match self.state.read() {
            Ok(state) => (state.projects.len(), state.items.len()),
            Err(_) => (0, 0),
        };
        f.debug_struct("InMemoryStore")
            .field("project_count", &projects)
            .field("item_count", &items)
            .finish()
    }
}

/// Staged changes against an [`InMemoryStore`].
///
/// The store lock is held only for the duration of each call, never across
/// calls. Keys accepted by `insert_items` are reserved in the store until the
/// transaction commits or is dropped, so two open transactions never accept
/// the same key.
struct InMemoryTransaction<'a> {
    store: &'a InMemoryStore,
    items: Vec<Item>,
    steps: HashMap<ProjectId, StagedStep>,
}

struct StagedStep {
    /// Committed step the first advance started from.
    base: Step,
    next: Step,
    modified: DateTime<Utc>,
}

impl InMemoryTransaction<'_> {
    /// Everything staged must still apply to the committed state.
    fn check(&self, state: &MemoryState) -> StoreResult<()> {
        for (id, staged) in &self.steps {
            let project = state
                .projects
                .get(id)
                .ok_or(StoreError::ProjectNotFound(*id))?;
            if project.step != staged.base {
                return Err(StoreError::StepConflict {
                    project: *id,
                    expected: staged.base,
                    actual: project.step,
                });
            }
        }
        for item in &self.items {
            if let Some(project) = item.project {
                if !state.projects.contains_key(&project) {
                    return Err(StoreError::ProjectNotFound(project));
                }
            }
        }
        Ok(())
    }
}

impl StoreTransaction for InMemoryTransaction<'_> {
    fn project(&mut self, id: ProjectId) -> StoreResult<Option<Project>> {
        let mut project = match self.store.read()?.projects.get(&id) {
            Some(project) => project.clone(),
            None => return Ok(None),
        };
        if let Some(staged) = self.steps.get(&id) {
            project.step = staged.next;
            project.modified = staged.modified;
        }
        Ok(Some(project))
    }

    fn insert_items(&mut self, items: &[NewItem], policy: ConflictPolicy) -> StoreResult<Vec<Item>> {
        let store = self.store;
        let mut state = store.write()?;
        if let Some(missing) = items
            .iter()
            .find(|item| !state.projects.contains_key(&item.project))
        {
            return Err(StoreError::ProjectNotFound(missing.project));
        }

        // Decide the accepted subset before reserving anything so that a
        // rejected batch leaves the transaction untouched.
        let mut batch_keys = HashSet::new();
        let mut accepted = Vec::with_capacity(items.len());
        for item in items {
            if state.key_taken(&item.key) || !batch_keys.insert(item.key.as_str()) {
                match policy {
                    ConflictPolicy::Ignore => continue,
                    ConflictPolicy::Reject => {
                        return Err(StoreError::DuplicateKey(item.key.clone()));
                    }
                }
            }
            accepted.push(item);
        }

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(accepted.len());
        for item in accepted {
            state.last_item_id += 1;
            let stored = item.clone().into_item(ItemId::new(state.last_item_id), now);
            state.pending.insert(stored.key.clone());
            self.items.push(stored.clone());
            inserted.push(stored);
        }
        Ok(inserted)
    }

    fn advance_step(&mut self, id: ProjectId, expected: Step) -> StoreResult<Step> {
        let committed = self
            .store
            .read()?
            .projects
            .get(&id)
            .map(|project| project.step)
            .ok_or(StoreError::ProjectNotFound(id))?;
        let current = self.steps.get(&id).map_or(committed, |staged| staged.next);
        if current != expected {
            return Err(StoreError::StepConflict {
                project: id,
                expected,
                actual: current,
            });
        }
        let next = expected.next()?;
        let base = self.steps.get(&id).map_or(committed, |staged| staged.base);
        self.steps.insert(
            id,
            StagedStep {
                base,
                next,
                modified: Utc::now(),
            },
        );
        Ok(next)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let store = self.store;
        let mut state = store.write()?;
        if let Err(err) = self.check(&state) {
            // Release the lock before drop returns the reserved keys.
            drop(state);
            return Err(err);
        }

        let items = std::mem::take(&mut self.items);
        debug!(items = items.len(), steps = self.steps.len(), "memory transaction committed");
        for item in items {
            state.pending.remove(&item.key);
            state.keys.insert(item.key.clone(), item.id);
            state.items.insert(item.id, item);
        }
        for (id, staged) in self.steps.drain() {
            if let Some(project) = state.projects.get_mut(&id) {
                project.step = staged.next;
                project.modified = staged.modified;
            }
        }
        Ok(())
    }
}

impl Drop for InMemoryTransaction<'_> {
    fn drop(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let mut state = self
            .store
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for item in &self.items {
            state.pending.remove(&item.key);
        }
    }
}
