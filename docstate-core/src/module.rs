//! Document model modules.
//!
//! A module bundles the state-transition function of one document type with
//! the factory that creates an empty document of that type. Modules are
//! resolved at runtime through a [`DocumentModelRegistry`](crate::DocumentModelRegistry).

use crate::{Action, CreateDocumentInput, Document, ReducerError};
use std::fmt;
use std::sync::Arc;

/// State-transition function: applies one action to a document.
pub type Reducer = Arc<dyn Fn(Document, &Action) -> Result<Document, ReducerError> + Send + Sync>;

/// Creates the initial document from a `CREATE_DOCUMENT` input and timestamp.
pub type DocumentFactory = Arc<dyn Fn(&CreateDocumentInput, i64) -> Document + Send + Sync>;

/// Factory utilities of a module.
#[derive(Clone)]
pub struct DocumentUtils {
    pub create_document: DocumentFactory,
}

/// Reducer and utilities for one document type.
#[derive(Clone)]
pub struct DocumentModule {
    pub document_type: String,
    pub reducer: Reducer,
    pub utils: DocumentUtils,
}

impl DocumentModule {
    pub fn new<F, C>(document_type: impl Into<String>, reducer: F, create_document: C) -> Self
    where
        F: Fn(Document, &Action) -> Result<Document, ReducerError> + Send + Sync + 'static,
        C: Fn(&CreateDocumentInput, i64) -> Document + Send + Sync + 'static,
    {
        Self {
            document_type: document_type.into(),
            reducer: Arc::new(reducer),
            utils: DocumentUtils {
                create_document: Arc::new(create_document),
            },
        }
    }

    pub fn reduce(&self, document: Document, action: &Action) -> Result<Document, ReducerError> {
        (self.reducer)(document, action)
    }

    pub fn create_document(&self, input: &CreateDocumentInput, created_at_utc_ms: i64) -> Document {
        (self.utils.create_document)(input, created_at_utc_ms)
    }
}

impl fmt::Debug for DocumentModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentModule")
            .field("document_type", &self.document_type)
            .finish_non_exhaustive()
    }
}
