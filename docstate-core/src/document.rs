//! Document snapshots.
//!
//! The cache treats the `state` payload as opaque. Documents are plain values:
//! cloning produces an independent deep copy.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHeader {
    pub id: String,
    pub document_type: String,
    #[serde(default)]
    pub version: u32,
    /// Revision per scope.
    #[serde(default)]
    pub revision: BTreeMap<String, u64>,
    pub created_at_utc_ms: i64,
    pub last_modified_at_utc_ms: i64,
    #[serde(default)]
    pub is_deleted: bool,
}

impl DocumentHeader {
    pub fn new(id: impl Into<String>, document_type: impl Into<String>, created_at_utc_ms: i64) -> Self {
        Self {
            id: id.into(),
            document_type: document_type.into(),
            version: 0,
            revision: BTreeMap::new(),
            created_at_utc_ms,
            last_modified_at_utc_ms: created_at_utc_ms,
            is_deleted: false,
        }
    }
}

/// A document at some point in its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub header: DocumentHeader,
    pub state: Value,
}

impl Document {
    pub fn new(header: DocumentHeader, state: Value) -> Self {
        Self { header, state }
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn document_type(&self) -> &str {
        &self.header.document_type
    }

    /// Revision of `scope`, 0 if the scope has never been written.
    pub fn revision(&self, scope: &str) -> u64 {
        self.header.revision.get(scope).copied().unwrap_or(0)
    }

    pub fn set_revision(&mut self, scope: impl Into<String>, revision: u64) {
        self.header.revision.insert(scope.into(), revision);
    }
}
