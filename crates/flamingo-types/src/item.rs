use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::ids::{ItemId, ProjectId};
use crate::step::Step;

/// Maximum item key length, in characters.
pub const MAX_KEY_LEN: usize = 512;

pub fn validate_key(key: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::EmptyKey);
    }
    let len = key.chars().count();
    if len > MAX_KEY_LEN {
        return Err(TypeError::KeyTooLong {
            len,
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}

/// A stored item.
///
/// `key` is unique across the whole store, not only within a project.
/// `step` is fixed at insertion and never changes afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub key: String,
    pub step: Step,
    pub data: Option<Value>,
    /// Owning project. `None` only for orphaned rows.
    pub project: Option<ProjectId>,
    pub created: DateTime<Utc>,
}

/// An item a caller wants ingested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub key: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl CandidateItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        validate_key(&self.key)
    }

    /// Tag this candidate with its owning project and batch step.
    pub fn tag(self, project: ProjectId, step: Step) -> NewItem {
        NewItem {
            key: self.key,
            data: self.data,
            step,
            project,
        }
    }
}

/// A candidate tagged with project and step, ready for the key store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewItem {
    pub key: String,
    pub data: Option<Value>,
    pub step: Step,
    pub project: ProjectId,
}

impl NewItem {
    pub fn into_item(self, id: ItemId, now: DateTime<Utc>) -> Item {
        Item {
            id,
            key: self.key,
            step: self.step,
            data: self.data,
            project: Some(self.project),
            created: now,
        }
    }
}
