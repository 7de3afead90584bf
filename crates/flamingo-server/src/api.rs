//! Request and response bodies that are not plain domain types.

use flamingo_types::{Item, ProjectId, Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Confirmation message for deletions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub message: String,
}

impl Status {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Query string of `POST /v1/projects/{id}/items`.
///
/// With `strict=true` the batch fails with 409 if any key is already taken,
/// and nothing is stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestParams {
    #[serde(default)]
    pub strict: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An item as echoed back by ingestion: everything but the row id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IngestedItem {
    pub key: String,
    pub step: Step,
    pub data: Option<Value>,
    pub project: Option<ProjectId>,
}

impl From<Item> for IngestedItem {
    fn from(item: Item) -> Self {
        Self {
            key: item.key,
            step: item.step,
            data: item.data,
            project: item.project,
        }
    }
}
