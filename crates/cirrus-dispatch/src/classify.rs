//! Shape-based trigger classification.
//!
//! Classification is total: any JSON value maps to exactly one
//! [`EventKind`], with `Unknown` for shapes no transport produces.

use cirrus_core::trigger::EventKind;
use serde_json::Value;

/// Classify a trigger payload by shape.
///
/// Precedence: web, websocket, cron, identity, then record batches
/// (pubsub over queue over change-stream for mixed batches), else unknown.
pub fn classify(event: &Value) -> EventKind {
    if let Some(request_context) = non_null(event, "requestContext") {
        // The path-parameters key marks a REST gateway even when empty.
        if event.get("pathParameters").is_some() {
            return EventKind::Web;
        }
        if request_context.get("eventType").is_some() {
            return EventKind::WebSocket;
        }
    }
    if non_null(event, "cron").is_some() {
        return EventKind::Cron;
    }
    if non_null(event, "userPoolId").is_some() {
        return EventKind::Identity;
    }
    if let Some(records) = event.get("Records").and_then(Value::as_array) {
        if records.iter().any(|record| non_null(record, "Sns").is_some()) {
            return EventKind::PubSub;
        }
        if records.iter().any(|record| source_is(record, "aws:sqs")) {
            return EventKind::Queue;
        }
        if records
            .iter()
            .any(|record| non_null(record, "dynamodb").is_some() || source_is(record, "aws:dynamodb"))
        {
            return EventKind::ChangeStream;
        }
    }
    EventKind::Unknown
}

fn non_null<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

fn source_is(record: &Value, source: &str) -> bool {
    record.get("eventSource").and_then(Value::as_str) == Some(source)
}
