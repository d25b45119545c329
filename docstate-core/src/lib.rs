//! docstate Core - Data Types and Collaborator Traits
//!
//! Plain data structures shared by every docstate crate, plus the contracts
//! the write cache requires from the operation log, the keyframe store and
//! the document model registry.

mod clock;
mod config;
mod document;
mod error;
mod module;
mod operation;
mod signal;
mod store;
mod stream;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use document::{Document, DocumentHeader};
pub use error::{
    ConfigError, DocStateError, DocStateResult, ReducerError, RegistryError, StoreError,
};
pub use module::{DocumentFactory, DocumentModule, DocumentUtils, Reducer};
pub use operation::{
    Action, CreateDocumentInput, Operation, OperationContext, OperationWithContext,
    UpgradeDocumentInput, CREATE_DOCUMENT, DELETE_DOCUMENT, UPGRADE_DOCUMENT,
};
pub use signal::{check_aborted, AbortController, AbortSignal};
pub use store::{
    DocumentModelRegistry, Keyframe, KeyframeStore, OperationPage, OperationStore, PagingOptions,
};
pub use stream::{StreamKey, DOCUMENT_SCOPE, GLOBAL_SCOPE, LOCAL_SCOPE, MAIN_BRANCH};

use uuid::Uuid;

/// Generate a new operation or action id (UUIDv7, timestamp-sortable).
pub fn new_operation_id() -> String {
    Uuid::now_v7().to_string()
}
