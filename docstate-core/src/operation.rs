//! Operation log entries.
//!
//! Operations are immutable once appended. `index` orders operations within a
//! stream; `skip` counts indices intentionally omitted before this one.

use crate::StreamKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action type that creates a document. Always index 0 of the `document` scope.
pub const CREATE_DOCUMENT: &str = "CREATE_DOCUMENT";
/// Action type that moves a document to a newer model version.
pub const UPGRADE_DOCUMENT: &str = "UPGRADE_DOCUMENT";
/// Action type that marks a document deleted.
pub const DELETE_DOCUMENT: &str = "DELETE_DOCUMENT";

/// A user or system intent applied through a reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub scope: String,
    pub timestamp_utc_ms: i64,
    pub input: Value,
}

impl Action {
    pub fn new(
        action_type: impl Into<String>,
        scope: impl Into<String>,
        input: Value,
        timestamp_utc_ms: i64,
    ) -> Self {
        Self {
            id: crate::new_operation_id(),
            action_type: action_type.into(),
            scope: scope.into(),
            timestamp_utc_ms,
            input,
        }
    }

    /// Whether this action is handled by the document layer rather than a reducer.
    pub fn is_document_action(&self) -> bool {
        matches!(
            self.action_type.as_str(),
            CREATE_DOCUMENT | UPGRADE_DOCUMENT | DELETE_DOCUMENT
        )
    }
}

/// An action as recorded in the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    pub index: u64,
    pub skip: u64,
    pub hash: String,
    pub timestamp_utc_ms: i64,
    pub action: Action,
}

/// Where an operation lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationContext {
    pub document_id: String,
    pub document_type: String,
    pub scope: String,
    pub branch: String,
    /// Global append order across all streams.
    pub ordinal: u64,
}

impl OperationContext {
    pub fn stream_key(&self) -> StreamKey {
        StreamKey::new(self.document_id.clone(), self.scope.clone(), self.branch.clone())
    }
}

/// Operation paired with its location, as returned by log reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationWithContext {
    pub operation: Operation,
    pub context: OperationContext,
}

/// Input of a `CREATE_DOCUMENT` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentInput {
    pub document_id: String,
    /// Document type used to resolve the model module.
    pub model: String,
    #[serde(default)]
    pub version: u32,
}

/// Input of an `UPGRADE_DOCUMENT` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeDocumentInput {
    #[serde(default)]
    pub from_version: u32,
    pub to_version: u32,
}
