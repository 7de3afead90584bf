//! Behaviour every [`Storage`] backend must share. Each backend's test module
//! calls these against a fresh instance.

use flamingo_types::{CandidateItem, Item, NewItem, NewProject, ProjectId, ProjectPatch, Step};
use serde_json::json;

use crate::error::{StoreError, StoreResult};
use crate::traits::{ConflictPolicy, KeyStore, ProjectRegistry, Storage};

/// One-transaction batch insert for setting up and probing backends.
pub(crate) trait BulkInsert {
    fn bulk_insert(&self, items: &[NewItem], policy: ConflictPolicy) -> StoreResult<Vec<Item>>;
}

impl<S: Storage + ?Sized> BulkInsert for S {
    fn bulk_insert(&self, items: &[NewItem], policy: ConflictPolicy) -> StoreResult<Vec<Item>> {
        let mut tx = self.begin()?;
        let inserted = tx.insert_items(items, policy)?;
        tx.commit()?;
        Ok(inserted)
    }
}

pub(crate) fn tagged(key: &str, project: ProjectId, step: Step) -> NewItem {
    CandidateItem::new(key).tag(project, step)
}

fn keys(items: &[Item]) -> Vec<&str> {
    items.iter().map(|item| item.key.as_str()).collect()
}

pub(crate) fn project_lifecycle(store: &dyn Storage) {
    let created = store
        .create_project(
            &NewProject::new("p1")
                .with_description("first")
                .with_data(json!({"team": "ingest"})),
        )
        .unwrap();
    assert_eq!(created.step, Step::ZERO);

    let fetched = store.require_project(created.id).unwrap();
    assert_eq!(fetched.name, "p1");
    assert_eq!(fetched.data, Some(json!({"team": "ingest"})));
    assert_eq!(
        store.find_project_by_name("p1").unwrap().map(|p| p.id),
        Some(created.id)
    );

    let updated = store
        .update_project(
            created.id,
            &ProjectPatch {
                name: Some("p1-renamed".into()),
                description: None,
                data: Some(json!([1, 2, 3])),
            },
        )
        .unwrap();
    assert_eq!(updated.name, "p1-renamed");
    assert_eq!(updated.description.as_deref(), Some("first"));
    assert_eq!(updated.data, Some(json!([1, 2, 3])));
    assert_eq!(updated.step, Step::ZERO);
    assert_eq!(store.require_project(created.id).unwrap().name, "p1-renamed");

    let second = store.create_project(&NewProject::new("p2")).unwrap();
    assert!(second.id > created.id);
    let listed: Vec<ProjectId> = store.list_projects().unwrap().iter().map(|p| p.id).collect();
    assert_eq!(listed, vec![created.id, second.id]);

    store.delete_project(created.id).unwrap();
    assert!(store.get_project(created.id).unwrap().is_none());
    assert!(matches!(
        store.delete_project(created.id),
        Err(StoreError::ProjectNotFound(id)) if id == created.id
    ));
    assert!(matches!(
        store.update_project(created.id, &ProjectPatch::rename("x")),
        Err(StoreError::ProjectNotFound(_))
    ));
    assert!(matches!(
        store.require_project(created.id),
        Err(StoreError::ProjectNotFound(_))
    ));
}

pub(crate) fn duplicate_project_name_conflicts(store: &dyn Storage) {
    store.create_project(&NewProject::new("p1")).unwrap();
    store.create_project(&NewProject::new("p2")).unwrap();
    assert!(matches!(
        store.create_project(&NewProject::new("p1")),
        Err(StoreError::ProjectNameTaken(name)) if name == "p1"
    ));
    assert!(matches!(
        store.create_project(&NewProject::new("")),
        Err(StoreError::InvalidInput(_))
    ));
    assert_eq!(store.list_projects().unwrap().len(), 2);
}

pub(crate) fn rename_onto_taken_name_conflicts(store: &dyn Storage) {
    let a = store.create_project(&NewProject::new("a")).unwrap();
    store.create_project(&NewProject::new("b")).unwrap();
    assert!(matches!(
        store.update_project(a.id, &ProjectPatch::rename("b")),
        Err(StoreError::ProjectNameTaken(_))
    ));
    // Renaming to its own name is not a conflict.
    store.update_project(a.id, &ProjectPatch::rename("a")).unwrap();
    assert_eq!(store.require_project(a.id).unwrap().name, "a");
}

pub(crate) fn bulk_insert_ignores_conflicts(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    let first = store
        .bulk_insert(
            &[tagged("a", p.id, Step::ZERO), tagged("b", p.id, Step::ZERO)],
            ConflictPolicy::Ignore,
        )
        .unwrap();
    assert_eq!(keys(&first), vec!["a", "b"]);

    let second = store
        .bulk_insert(
            &[
                tagged("b", p.id, Step::new(1)),
                tagged("c", p.id, Step::new(1)),
                tagged("c", p.id, Step::new(1)),
            ],
            ConflictPolicy::Ignore,
        )
        .unwrap();
    assert_eq!(keys(&second), vec!["c"]);
    assert_eq!(second[0].step, Step::new(1));

    let all = store.items_for_project(p.id).unwrap();
    assert_eq!(keys(&all), vec!["a", "b", "c"]);
    let b = all.iter().find(|item| item.key == "b").unwrap();
    assert_eq!(b.step, Step::ZERO);
    assert_eq!(store.item_count().unwrap(), 3);
}

pub(crate) fn bulk_insert_reject_writes_nothing(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    store
        .bulk_insert(&[tagged("a", p.id, Step::ZERO)], ConflictPolicy::Reject)
        .unwrap();

    let err = store
        .bulk_insert(
            &[tagged("x", p.id, Step::ZERO), tagged("a", p.id, Step::ZERO)],
            ConflictPolicy::Reject,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(key) if key == "a"));

    let err = store
        .bulk_insert(
            &[tagged("y", p.id, Step::ZERO), tagged("y", p.id, Step::ZERO)],
            ConflictPolicy::Reject,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(key) if key == "y"));

    assert_eq!(keys(&store.items_for_project(p.id).unwrap()), vec!["a"]);
}

pub(crate) fn keys_are_unique_across_projects(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    let q = store.create_project(&NewProject::new("q")).unwrap();
    store
        .bulk_insert(&[tagged("shared", p.id, Step::ZERO)], ConflictPolicy::Ignore)
        .unwrap();

    let inserted = store
        .bulk_insert(&[tagged("shared", q.id, Step::ZERO)], ConflictPolicy::Ignore)
        .unwrap();
    assert!(inserted.is_empty());
    assert!(store.items_for_project(q.id).unwrap().is_empty());

    let owner = &store.items_for_project(p.id).unwrap()[0];
    assert_eq!(owner.project, Some(p.id));
}

pub(crate) fn filter_by_keys_is_project_scoped(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    let q = store.create_project(&NewProject::new("q")).unwrap();
    store
        .bulk_insert(
            &[
                tagged("a", p.id, Step::ZERO),
                tagged("b", p.id, Step::ZERO),
                tagged("z", q.id, Step::ZERO),
            ],
            ConflictPolicy::Ignore,
        )
        .unwrap();

    let candidates: Vec<String> = ["b", "z", "missing", "b"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let found = store.filter_by_keys(p.id, &candidates).unwrap();
    assert_eq!(keys(&found), vec!["b"]);
    assert!(store.filter_by_keys(p.id, &[]).unwrap().is_empty());
}

pub(crate) fn dropped_transaction_rolls_back(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    {
        let mut tx = store.begin().unwrap();
        let inserted = tx
            .insert_items(&[tagged("a", p.id, Step::ZERO)], ConflictPolicy::Ignore)
            .unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(tx.advance_step(p.id, Step::ZERO).unwrap(), Step::new(1));
        assert_eq!(tx.project(p.id).unwrap().unwrap().step, Step::new(1));
    }
    assert_eq!(store.require_project(p.id).unwrap().step, Step::ZERO);
    assert!(store.items_for_project(p.id).unwrap().is_empty());

    // The rolled-back key is free again.
    let inserted = store
        .bulk_insert(&[tagged("a", p.id, Step::ZERO)], ConflictPolicy::Ignore)
        .unwrap();
    assert_eq!(inserted.len(), 1);
}

pub(crate) fn advance_step_checks_expected_value(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    let mut tx = store.begin().unwrap();
    assert_eq!(tx.advance_step(p.id, Step::ZERO).unwrap(), Step::new(1));
    assert!(matches!(
        tx.advance_step(p.id, Step::ZERO),
        Err(StoreError::StepConflict { expected, actual, .. })
            if expected == Step::ZERO && actual == Step::new(1)
    ));
    assert_eq!(tx.advance_step(p.id, Step::new(1)).unwrap(), Step::new(2));
    assert!(matches!(
        tx.advance_step(ProjectId::new(9_999), Step::ZERO),
        Err(StoreError::ProjectNotFound(_))
    ));
    tx.commit().unwrap();

    let stored = store.require_project(p.id).unwrap();
    assert_eq!(stored.step, Step::new(2));
    assert!(stored.modified >= stored.created);
}

pub(crate) fn delete_project_cascades(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    let q = store.create_project(&NewProject::new("q")).unwrap();
    store
        .bulk_insert(
            &[
                tagged("a", p.id, Step::ZERO),
                tagged("b", p.id, Step::ZERO),
                tagged("c", q.id, Step::ZERO),
            ],
            ConflictPolicy::Ignore,
        )
        .unwrap();

    assert_eq!(store.delete_project(p.id).unwrap(), 2);
    assert!(store.items_for_project(p.id).unwrap().is_empty());
    assert_eq!(store.item_count().unwrap(), 1);

    // Keys of the deleted project can be registered again.
    let inserted = store
        .bulk_insert(&[tagged("a", q.id, Step::ZERO)], ConflictPolicy::Ignore)
        .unwrap();
    assert_eq!(inserted.len(), 1);
}

pub(crate) fn delete_single_item(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    let inserted = store
        .bulk_insert(
            &[tagged("a", p.id, Step::ZERO), tagged("b", p.id, Step::ZERO)],
            ConflictPolicy::Ignore,
        )
        .unwrap();
    let a = inserted[0].id;

    assert_eq!(store.get_item(a).unwrap().map(|item| item.key), Some("a".into()));
    assert!(store.delete_item(a).unwrap());
    assert!(!store.delete_item(a).unwrap());
    assert!(store.get_item(a).unwrap().is_none());
    assert_eq!(keys(&store.items_for_project(p.id).unwrap()), vec!["b"]);
}

pub(crate) fn insert_into_missing_project_fails(store: &dyn Storage) {
    let missing = ProjectId::new(404);
    let err = store
        .bulk_insert(&[tagged("a", missing, Step::ZERO)], ConflictPolicy::Ignore)
        .unwrap_err();
    assert!(matches!(err, StoreError::ProjectNotFound(id) if id == missing));
    assert_eq!(store.item_count().unwrap(), 0);
}

pub(crate) fn items_for_step_selects_one_batch(store: &dyn Storage) {
    let p = store.create_project(&NewProject::new("p")).unwrap();
    let q = store.create_project(&NewProject::new("q")).unwrap();
    store
        .bulk_insert(
            &[
                tagged("a", p.id, Step::ZERO),
                tagged("b", p.id, Step::new(1)),
                tagged("c", p.id, Step::new(1)),
                tagged("d", q.id, Step::new(1)),
            ],
            ConflictPolicy::Ignore,
        )
        .unwrap();

    assert_eq!(
        keys(&store.items_for_step(p.id, Step::new(1)).unwrap()),
        vec!["b", "c"]
    );
    assert_eq!(keys(&store.items_for_step(p.id, Step::ZERO).unwrap()), vec!["a"]);
    assert!(store.items_for_step(p.id, Step::new(2)).unwrap().is_empty());
}
