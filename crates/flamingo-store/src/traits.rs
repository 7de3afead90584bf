use flamingo_types::{Item, ItemId, NewItem, NewProject, Project, ProjectId, ProjectPatch, Step};

use crate::error::{StoreError, StoreResult};

/// What a batch insert does with a key that is already taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Leave the item out of the batch and carry on. Within one batch the
    /// first occurrence of a key wins.
    #[default]
    Ignore,
    /// Fail the whole batch with [`StoreError::DuplicateKey`] before any item
    /// is written.
    Reject,
}

/// Persistent record of projects.
///
/// Implementations must keep project names unique and must delete every
/// item of a project together with the project.
pub trait ProjectRegistry: Send + Sync {
    /// All projects, ordered by id.
    fn list_projects(&self) -> StoreResult<Vec<Project>>;

    /// Create a project at step zero.
    ///
    /// Fails with [`StoreError::ProjectNameTaken`] if the name is in use.
    fn create_project(&self, project: &NewProject) -> StoreResult<Project>;

    /// Read a project by id. Returns `Ok(None)` if it does not exist.
    fn get_project(&self, id: ProjectId) -> StoreResult<Option<Project>>;

    fn find_project_by_name(&self, name: &str) -> StoreResult<Option<Project>>;

    /// Apply a partial update to name, description and data.
    fn update_project(&self, id: ProjectId, patch: &ProjectPatch) -> StoreResult<Project>;

    /// Delete a project and all of its items. Returns the number of items
    /// removed with it.
    fn delete_project(&self, id: ProjectId) -> StoreResult<usize>;

    /// Like [`get_project`](Self::get_project), but absence is an error.
    fn require_project(&self, id: ProjectId) -> StoreResult<Project> {
        self.get_project(id)?.ok_or(StoreError::ProjectNotFound(id))
    }
}

/// Persistent mapping from unique key to item.
pub trait KeyStore: Send + Sync {
    /// All items owned by `project`, ordered by id.
    fn items_for_project(&self, project: ProjectId) -> StoreResult<Vec<Item>>;

    /// The items of `project` whose key is among `keys`, ordered by id.
    ///
    /// Keys held by other projects are not reported.
    fn filter_by_keys(&self, project: ProjectId, keys: &[String]) -> StoreResult<Vec<Item>>;

    /// All items that `project` stored in batch `step`.
    fn items_for_step(&self, project: ProjectId, step: Step) -> StoreResult<Vec<Item>>;

    fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>>;

    /// Delete a single item. Returns `true` if it existed.
    fn delete_item(&self, id: ItemId) -> StoreResult<bool>;

    /// Total number of items across all projects.
    fn item_count(&self) -> StoreResult<usize>;
}

/// Unit of atomic work over a [`Storage`].
///
/// Changes become visible to other callers only on [`commit`](Self::commit).
/// Dropping the transaction without committing discards them.
pub trait StoreTransaction {
    /// Read a project as seen by this transaction.
    fn project(&mut self, id: ProjectId) -> StoreResult<Option<Project>>;

    /// Insert a batch of tagged items and return exactly the ones stored.
    ///
    /// Every referenced project must exist.
    fn insert_items(&mut self, items: &[NewItem], policy: ConflictPolicy) -> StoreResult<Vec<Item>>;

    /// Move the project's step from `expected` to the next value.
    ///
    /// Fails with [`StoreError::StepConflict`] if the stored step is not
    /// `expected`. Returns the new step.
    fn advance_step(&mut self, id: ProjectId, expected: Step) -> StoreResult<Step>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// A complete storage backend.
pub trait Storage: ProjectRegistry + KeyStore {
    /// Open a transaction. Batch inserts and step advances only happen
    /// inside one.
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;
}
