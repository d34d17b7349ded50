use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::Json;
use base64::Engine;
use bundle::Aggregate;
use serde_json::{Map, Value};

/// 200 all succeeded, 206 mixed, 422 none succeeded.
///
/// A single-unit request can only be all-or-nothing, so its failure is always 422.
pub fn status_for<K>(aggregate: &Aggregate<K>) -> StatusCode {
    match aggregate {
        Aggregate::AllSucceeded(_) => StatusCode::OK,
        Aggregate::PartialSuccess { .. } => StatusCode::PARTIAL_CONTENT,
        Aggregate::AllFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// `{ <name>: base64, ..., "log": "<lines>" }`
pub fn artifact_body(artifacts: &BTreeMap<String, Vec<u8>>, log: String) -> Json<Value> {
    let mut body = Map::new();
    for (name, bytes) in artifacts {
        body.insert(
            name.clone(),
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
        );
    }
    body.insert("log".to_string(), Value::String(log));
    Json(Value::Object(body))
}
