//! Test fixtures: a counter document model and operation builders.

use docstate_core::{
    new_operation_id, Action, CreateDocumentInput, Document, DocumentHeader, DocumentModule,
    Operation, ReducerError, CREATE_DOCUMENT, DELETE_DOCUMENT, DOCUMENT_SCOPE, GLOBAL_SCOPE,
    UPGRADE_DOCUMENT,
};
use serde_json::{json, Value};

/// Document type of the counter fixture model.
pub const COUNTER_TYPE: &str = "docstate/counter";

/// Timestamp of operation index 0 in fixtures.
pub const BASE_TIMESTAMP_MS: i64 = 1_700_000_000_000;

/// Counter document model.
///
/// Actions:
/// - `INCREMENT { by }` adds `by` (default 1) to `count`
/// - `SET { value }` overwrites `count`
/// - `FAIL { message }` always fails with `message`
pub fn counter_module() -> DocumentModule {
    DocumentModule::new(COUNTER_TYPE, counter_reducer, counter_factory)
}

fn counter_reducer(mut document: Document, action: &Action) -> Result<Document, ReducerError> {
    let count = document.state["count"].as_i64().unwrap_or(0);
    match action.action_type.as_str() {
        "INCREMENT" => {
            let by = action.input["by"].as_i64().unwrap_or(1);
            document.state["count"] = json!(count + by);
            Ok(document)
        }
        "SET" => {
            document.state["count"] = action.input["value"].clone();
            Ok(document)
        }
        "FAIL" => Err(ReducerError::new(
            "FAIL",
            action.input["message"]
                .as_str()
                .unwrap_or("reducer failure")
                .to_string(),
        )),
        other => Err(ReducerError::new(other, format!("Unsupported action {other}"))),
    }
}

fn counter_factory(input: &CreateDocumentInput, created_at_utc_ms: i64) -> Document {
    let mut header = DocumentHeader::new(input.document_id.clone(), input.model.clone(), created_at_utc_ms);
    header.version = input.version;
    Document::new(header, json!({ "count": 0 }))
}

/// A counter document with the given count at `revision` of the global scope.
pub fn counter_document(document_id: &str, count: i64, revision: u64) -> Document {
    let mut doc = counter_factory(
        &CreateDocumentInput {
            document_id: document_id.to_string(),
            model: COUNTER_TYPE.to_string(),
            version: 0,
        },
        BASE_TIMESTAMP_MS,
    );
    doc.state["count"] = json!(count);
    doc.set_revision(GLOBAL_SCOPE, revision);
    doc
}

/// Build an operation at `index` with a deterministic timestamp.
pub fn operation(index: u64, action_type: &str, scope: &str, input: Value) -> Operation {
    let timestamp_utc_ms = BASE_TIMESTAMP_MS + index as i64;
    Operation {
        id: new_operation_id(),
        index,
        skip: 0,
        hash: format!("{index:016x}"),
        timestamp_utc_ms,
        action: Action::new(action_type, scope, input, timestamp_utc_ms),
    }
}

/// `INCREMENT { by }` in the global scope.
pub fn increment(index: u64, by: i64) -> Operation {
    operation(index, "INCREMENT", GLOBAL_SCOPE, json!({ "by": by }))
}

/// `INCREMENT { by: 1 }` for every index in `indices`.
pub fn increments(indices: impl IntoIterator<Item = u64>) -> Vec<Operation> {
    indices.into_iter().map(|i| increment(i, 1)).collect()
}

/// Reducer failure in the global scope.
pub fn failing(index: u64, message: &str) -> Operation {
    operation(index, "FAIL", GLOBAL_SCOPE, json!({ "message": message }))
}

/// `CREATE_DOCUMENT` at index 0 of the document scope.
pub fn create_document_operation(document_id: &str, model: &str) -> Operation {
    operation(
        0,
        CREATE_DOCUMENT,
        DOCUMENT_SCOPE,
        json!({ "documentId": document_id, "model": model, "version": 0 }),
    )
}

/// `UPGRADE_DOCUMENT` in the document scope.
pub fn upgrade_document_operation(index: u64, to_version: u32) -> Operation {
    operation(
        index,
        UPGRADE_DOCUMENT,
        DOCUMENT_SCOPE,
        json!({ "fromVersion": 0, "toVersion": to_version }),
    )
}

/// `DELETE_DOCUMENT` in the document scope.
pub fn delete_document_operation(index: u64) -> Operation {
    operation(index, DELETE_DOCUMENT, DOCUMENT_SCOPE, json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_reducer_increments() {
        let module = counter_module();
        let doc = counter_document("doc1", 0, 0);
        let doc = module.reduce(doc, &increment(1, 3).action).unwrap();
        assert_eq!(doc.state["count"], 3);
    }

    #[test]
    fn test_counter_reducer_failure_message() {
        let module = counter_module();
        let err = module
            .reduce(counter_document("doc1", 0, 0), &failing(1, "boom").action)
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_counter_factory() {
        let module = counter_module();
        let input = CreateDocumentInput {
            document_id: "doc1".to_string(),
            model: COUNTER_TYPE.to_string(),
            version: 2,
        };
        let doc = module.create_document(&input, 42);
        assert_eq!(doc.id(), "doc1");
        assert_eq!(doc.header.version, 2);
        assert_eq!(doc.header.created_at_utc_ms, 42);
        assert_eq!(doc.state["count"], 0);
    }
}
