use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use flamingo_types::{
    Item, ItemId, NewItem, NewProject, Project, ProjectId, ProjectPatch, Step, TypeError,
};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{ConflictPolicy, KeyStore, ProjectRegistry, Storage, StoreTransaction};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS project (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    created TEXT NOT NULL,
    modified TEXT NOT NULL,
    name VARCHAR(128) NOT NULL UNIQUE,
    description TEXT,
    step INTEGER NOT NULL DEFAULT 0,
    data TEXT
);
CREATE TABLE IF NOT EXISTS item (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    created TEXT NOT NULL,
    key VARCHAR(512) NOT NULL UNIQUE,
    step INTEGER NOT NULL DEFAULT 0,
    data TEXT,
    project_id INTEGER REFERENCES project (id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_item_project_key ON item (project_id, key);
"#;

const PROJECT_COLUMNS: &str = "id, name, description, step, data, created, modified";
const ITEM_COLUMNS: &str = "id, key, step, data, project_id, created";

/// Keys per `IN (...)` lookup; stays well below SQLite's variable limit.
const KEY_CHUNK: usize = 500;

/// SQLite-backed store.
///
/// One connection behind a mutex. Transactions run as `BEGIN IMMEDIATE` so
/// the write lock is taken before the step counter is read.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::from_connection(conn, Some(path))?;
        info!(path = ?store.path, "sqlite store opened");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

impl ProjectRegistry for SqliteStore {
    fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM project ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], project_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn create_project(&self, project: &NewProject) -> StoreResult<Project> {
        project.validate()?;
        let conn = self.conn()?;
        let now = Utc::now();
        let data = encode_data(project.data.as_ref())?;
        let insert = conn.execute(
            "INSERT INTO project(name, description, step, data, created, modified) \
             VALUES (?1, ?2, 0, ?3, ?4, ?4)",
            params![project.name, project.description, data, now],
        );
        if let Err(err) = insert {
            return Err(map_name_conflict(err, &project.name));
        }
        let id = ProjectId::new(conn.last_insert_rowid());
        debug!(project = %id, name = %project.name, "project created");
        Ok(project.clone().into_project(id, now))
    }

    fn get_project(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        let conn = self.conn()?;
        query_project(&conn, id)
    }

    fn find_project_by_name(&self, name: &str) -> StoreResult<Option<Project>> {
        let conn = self.conn()?;
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM project WHERE name = ?1"),
                params![name],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    fn update_project(&self, id: ProjectId, patch: &ProjectPatch) -> StoreResult<Project> {
        patch.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut project = query_project(&tx, id)?.ok_or(StoreError::ProjectNotFound(id))?;
        project.apply(patch, Utc::now());

        let data = encode_data(project.data.as_ref())?;
        let update = tx.execute(
            "UPDATE project SET name = ?1, description = ?2, data = ?3, modified = ?4 \
             WHERE id = ?5",
            params![project.name, project.description, data, project.modified, id.get()],
        );
        if let Err(err) = update {
            return Err(map_name_conflict(err, &project.name));
        }
        tx.commit()?;
        Ok(project)
    }

    fn delete_project(&self, id: ProjectId) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let owned: i64 = tx.query_row(
            "SELECT COUNT(*) FROM item WHERE project_id = ?1",
            params![id.get()],
            |row| row.get(0),
        )?;
        let deleted = tx.execute("DELETE FROM project WHERE id = ?1", params![id.get()])?;
        if deleted == 0 {
            return Err(StoreError::ProjectNotFound(id));
        }
        tx.commit()?;
        debug!(project = %id, items = owned, "project deleted");
        Ok(usize::try_from(owned).unwrap_or_default())
    }
}

impl KeyStore for SqliteStore {
    fn items_for_project(&self, project: ProjectId) -> StoreResult<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE project_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![project.get()], item_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn filter_by_keys(&self, project: ProjectId, keys: &[String]) -> StoreResult<Vec<Item>> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|key| seen.insert(*key))
            .collect();

        let conn = self.conn()?;
        let mut found = Vec::new();
        for chunk in unique.chunks(KEY_CHUNK) {
            let placeholders = (0..chunk.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM item WHERE project_id = ?1 AND key IN ({placeholders})"
            );
            let mut values = Vec::with_capacity(chunk.len() + 1);
            values.push(SqlValue::Integer(project.get()));
            values.extend(chunk.iter().map(|key| SqlValue::Text((*key).to_string())));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), item_from_row)?;
            for row in rows {
                found.push(row?);
            }
        }
        found.sort_by_key(|item| item.id);
        Ok(found)
    }

    fn items_for_step(&self, project: ProjectId, step: Step) -> StoreResult<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE project_id = ?1 AND step = ?2 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![project.get(), step_to_sql(step)?], item_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM item WHERE id = ?1"),
                params![id.get()],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn delete_item(&self, id: ItemId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM item WHERE id = ?1", params![id.get()])?;
        Ok(deleted > 0)
    }

    fn item_count(&self) -> StoreResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM item", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl Storage for SqliteStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let conn = self.conn()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }
}

/// An open `BEGIN IMMEDIATE` transaction; rolls back on drop unless
/// committed.
struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn project(&mut self, id: ProjectId) -> StoreResult<Option<Project>> {
        query_project(&self.conn, id)
    }

    fn insert_items(&mut self, items: &[NewItem], policy: ConflictPolicy) -> StoreResult<Vec<Item>> {
        let conn: &Connection = &self.conn;

        let mut checked = HashSet::new();
        for item in items {
            if checked.insert(item.project) && !project_exists(conn, item.project)? {
                return Err(StoreError::ProjectNotFound(item.project));
            }
        }

        if policy == ConflictPolicy::Reject {
            let mut batch_keys = HashSet::new();
            let mut taken = conn.prepare_cached("SELECT 1 FROM item WHERE key = ?1")?;
            for item in items {
                if !batch_keys.insert(item.key.as_str()) || taken.exists(params![item.key])? {
                    return Err(StoreError::DuplicateKey(item.key.clone()));
                }
            }
        }

        let now = Utc::now();
        let mut insert = conn.prepare_cached(
            "INSERT INTO item(key, step, data, project_id, created) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(key) DO NOTHING",
        )?;
        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let changed = insert.execute(params![
                item.key,
                step_to_sql(item.step)?,
                encode_data(item.data.as_ref())?,
                item.project.get(),
                now,
            ])?;
            if changed == 1 {
                let id = ItemId::new(conn.last_insert_rowid());
                inserted.push(item.clone().into_item(id, now));
            }
        }
        Ok(inserted)
    }

    fn advance_step(&mut self, id: ProjectId, expected: Step) -> StoreResult<Step> {
        let next = expected.next()?;
        let changed = self.conn.execute(
            "UPDATE project SET step = ?1, modified = ?2 WHERE id = ?3 AND step = ?4",
            params![step_to_sql(next)?, Utc::now(), id.get(), step_to_sql(expected)?],
        )?;
        if changed == 1 {
            return Ok(next);
        }
        match query_project(&self.conn, id)? {
            None => Err(StoreError::ProjectNotFound(id)),
            Some(project) => Err(StoreError::StepConflict {
                project: id,
                expected,
                actual: project.step,
            }),
        }
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %err, "sqlite rollback failed");
        }
    }
}

fn query_project(conn: &Connection, id: ProjectId) -> StoreResult<Option<Project>> {
    let project = conn
        .query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM project WHERE id = ?1"),
            params![id.get()],
            project_from_row,
        )
        .optional()?;
    Ok(project)
}

fn project_exists(conn: &Connection, id: ProjectId) -> StoreResult<bool> {
    let mut stmt = conn.prepare_cached("SELECT 1 FROM project WHERE id = ?1")?;
    Ok(stmt.exists(params![id.get()])?)
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId::new(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        step: step_from_sql(row.get(3)?, 3)?,
        data: decode_data(row.get(4)?, 4)?,
        created: row.get(5)?,
        modified: row.get(6)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: ItemId::new(row.get(0)?),
        key: row.get(1)?,
        step: step_from_sql(row.get(2)?, 2)?,
        data: decode_data(row.get(3)?, 3)?,
        project: row.get::<_, Option<i64>>(4)?.map(ProjectId::new),
        created: row.get(5)?,
    })
}

fn step_from_sql(value: i64, column: usize) -> rusqlite::Result<Step> {
    u64::try_from(value)
        .map(Step::new)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(column, value))
}

fn step_to_sql(step: Step) -> StoreResult<i64> {
    i64::try_from(step.get()).map_err(|_| StoreError::InvalidInput(TypeError::StepOverflow))
}

fn encode_data(data: Option<&Value>) -> StoreResult<Option<String>> {
    data.map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_data(raw: Option<String>, column: usize) -> rusqlite::Result<Option<Value>> {
    raw.map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn map_name_conflict(err: rusqlite::Error, name: &str) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::ProjectNameTaken(name.to_string());
    }
    StoreError::Sqlite(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message
                    .as_deref()
                    .is_some_and(|value| value.contains("UNIQUE constraint failed"))
        }
        _ => false,
    }
}
