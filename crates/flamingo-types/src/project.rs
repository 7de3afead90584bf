use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::ids::ProjectId;
use crate::step::Step;

/// Maximum project name length, in characters.
pub const MAX_NAME_LEN: usize = 128;

/// Check that a project name is usable as the unique natural key.
pub fn validate_name(name: &str) -> Result<(), TypeError> {
    if name.trim().is_empty() {
        return Err(TypeError::EmptyName);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(TypeError::NameTooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// A stored project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    /// Step that the next ingestion batch will be tagged with.
    pub step: Step,
    /// Opaque caller payload; never interpreted.
    pub data: Option<Value>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Project {
    /// Apply a partial update in place and refresh `modified`.
    ///
    /// The step counter is not reachable from here: it only moves through
    /// ingestion.
    pub fn apply(&mut self, patch: &ProjectPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(data) = &patch.data {
            self.data = Some(data.clone());
        }
        self.modified = now;
    }
}

/// Caller input for creating a project. New projects always start at
/// [`Step::ZERO`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            data: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        validate_name(&self.name)
    }

    /// Materialize the record a backend stores for this input.
    pub fn into_project(self, id: ProjectId, now: DateTime<Utc>) -> Project {
        Project {
            id,
            name: self.name,
            description: self.description,
            step: Step::ZERO,
            data: self.data,
            created: now,
            modified: now,
        }
    }
}

/// Partial update of a project's editable fields. `None` leaves a field
/// unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ProjectPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.data.is_none()
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        match &self.name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }
}
