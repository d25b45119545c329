//! Stream identity.
//!
//! A stream is the unit of caching: one `(document_id, scope, branch)` triple
//! with its own revision counter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope holding document-level actions (`CREATE_DOCUMENT`, upgrades, deletes).
pub const DOCUMENT_SCOPE: &str = "document";
/// Scope holding the shared document state.
pub const GLOBAL_SCOPE: &str = "global";
/// Scope holding per-replica state.
pub const LOCAL_SCOPE: &str = "local";
/// Default branch name.
pub const MAIN_BRANCH: &str = "main";

/// Key of a cached stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub document_id: String,
    pub scope: String,
    pub branch: String,
}

impl StreamKey {
    pub fn new(
        document_id: impl Into<String>,
        scope: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            scope: scope.into(),
            branch: branch.into(),
        }
    }

    /// The `document` scope stream on the same document and branch.
    pub fn document_scope(&self) -> Self {
        Self::new(self.document_id.clone(), DOCUMENT_SCOPE, self.branch.clone())
    }

    /// Check whether this key falls under an invalidation filter.
    ///
    /// `None` components match anything.
    pub fn matches(&self, document_id: &str, scope: Option<&str>, branch: Option<&str>) -> bool {
        self.document_id == document_id
            && scope.map_or(true, |s| self.scope == s)
            && branch.map_or(true, |b| self.branch == b)
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.document_id, self.scope, self.branch)
    }
}
