//! Transport-shaped trigger views and the event-kind taxonomy.
//!
//! Trigger payloads arrive as opaque JSON and are never mutated; these
//! types are lenient views over the shapes the classifier recognizes.
//! Every field is optional so a partial payload still parses.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header carrying the JSON-serialized forwarded context of a protocol call.
pub const HEADER_PROTOCOL_CONTEXT: &str = "x-protocol-context";
/// Header carrying a caller identity blob on non-protocol calls.
pub const HEADER_IDENTITY: &str = "x-cirrus-identity";
/// Subject sentinel marking a broker message as a protocol call.
pub const PROTOCOL_SUBJECT: &str = "x-protocol-service";

/// Which transport produced a trigger. Derived by the classifier, never
/// stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Web,
    WebSocket,
    Cron,
    Identity,
    PubSub,
    Queue,
    ChangeStream,
    Unknown,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Web => "web",
            EventKind::WebSocket => "websocket",
            EventKind::Cron => "cron",
            EventKind::Identity => "identity",
            EventKind::PubSub => "pubsub",
            EventKind::Queue => "queue",
            EventKind::ChangeStream => "change-stream",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invocation metadata supplied by the hosting runtime, separate from the
/// trigger payload itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeContext {
    pub request_id: Option<String>,
    pub function_name: Option<String>,
    pub function_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// HTTP-gateway-shaped trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebEvent {
    pub path: Option<String>,
    pub http_method: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    /// Query map; values are arbitrary JSON for protocol-originated events.
    pub query_string_parameters: Option<Map<String, Value>>,
    pub path_parameters: Option<HashMap<String, String>>,
    pub body: Option<Value>,
    pub request_context: Option<RequestInfo>,
}

impl WebEvent {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        let headers = self.headers.as_ref()?;
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters.as_ref()?.get(name).map(String::as_str)
    }
}

/// The gateway's per-request metadata block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestInfo {
    pub account_id: Option<String>,
    pub request_id: Option<String>,
    pub http_method: Option<String>,
    pub stage: Option<String>,
    pub domain_name: Option<String>,
    /// Gateway identity block; carries `sourceIp` and caller claims.
    pub identity: Option<Value>,
    /// Present only on websocket-gateway events.
    pub event_type: Option<String>,
}

impl RequestInfo {
    pub fn source_ip(&self) -> Option<&str> {
        self.identity.as_ref()?.get("sourceIp")?.as_str()
    }
}

/// One record of a pub/sub trigger. The broker uses PascalCase keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PubSubRecord {
    pub event_source: Option<String>,
    pub sns: Option<SnsMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SnsMessage {
    pub subject: Option<String>,
    pub message: Option<String>,
    pub message_attributes: Option<HashMap<String, SnsAttribute>>,
}

impl SnsMessage {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.message_attributes.as_ref()?.get(name).map(|attr| attr.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnsAttribute {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl SnsAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self { kind: "String".to_string(), value: value.into() }
    }
}

/// One record of a queue trigger; `eventSource` is `aws:sqs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueRecord {
    pub message_id: Option<String>,
    pub event_source: Option<String>,
    pub body: Option<String>,
    pub message_attributes: Option<HashMap<String, QueueAttribute>>,
}

impl QueueRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.message_attributes
            .as_ref()?
            .get(name)
            .and_then(|attr| attr.string_value.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueAttribute {
    pub data_type: String,
    pub string_value: Option<String>,
}

impl QueueAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self { data_type: "String".to_string(), string_value: Some(value.into()) }
    }
}

/// Decode a possibly-JSON-encoded body value: a string bounded by `{`…`}`
/// is parsed, anything else passes through unchanged.
pub fn decode_body(value: Value) -> Value {
    if let Value::String(text) = value {
        let trimmed = text.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Ok(parsed) = serde_json::from_str(trimmed) {
                return parsed;
            }
        }
        return Value::String(text);
    }
    value
}

/// HTTP-shaped response returned to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Default for WebResponse {
    fn default() -> Self {
        Self { status_code: 200, headers: HashMap::new(), body: String::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_gateway_event() {
        let event: WebEvent = serde_json::from_value(json!({
            "path": "/hello/1",
            "httpMethod": "GET",
            "headers": { "X-Protocol-Context": "{}" },
            "queryStringParameters": null,
            "pathParameters": { "type": "hello", "id": "1" },
            "requestContext": {
                "accountId": "88",
                "requestId": "req-1",
                "stage": "dev",
                "identity": { "sourceIp": "10.0.0.9" }
            }
        }))
        .unwrap();
        assert_eq!(event.http_method.as_deref(), Some("GET"));
        assert_eq!(event.path_parameter("id"), Some("1"));
        let info = event.request_context.as_ref().unwrap();
        assert_eq!(info.account_id.as_deref(), Some("88"));
        assert_eq!(info.source_ip(), Some("10.0.0.9"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let event: WebEvent = serde_json::from_value(json!({
            "headers": { "X-Protocol-Context": "ctx", "Cookie": "a=1" }
        }))
        .unwrap();
        assert_eq!(event.header("x-protocol-context"), Some("ctx"));
        assert_eq!(event.header("COOKIE"), Some("a=1"));
        assert_eq!(event.header("x-missing"), None);
    }

    #[test]
    fn parses_pubsub_record() {
        let record: PubSubRecord = serde_json::from_value(json!({
            "EventSource": "aws:sns",
            "Sns": {
                "Subject": "x-protocol-service",
                "Message": "{\"type\":\"hello\"}",
                "MessageAttributes": {
                    "accountId": { "Type": "String", "Value": "88" }
                }
            }
        }))
        .unwrap();
        let sns = record.sns.unwrap();
        assert_eq!(sns.subject.as_deref(), Some("x-protocol-service"));
        assert_eq!(sns.attribute("accountId"), Some("88"));
        assert_eq!(sns.attribute("requestId"), None);
    }

    #[test]
    fn parses_queue_record() {
        let record: QueueRecord = serde_json::from_value(json!({
            "messageId": "m-1",
            "eventSource": "aws:sqs",
            "body": "{\"type\":\"hello\"}",
            "messageAttributes": {
                "subject": { "dataType": "String", "stringValue": "x-protocol-service" }
            }
        }))
        .unwrap();
        assert_eq!(record.event_source.as_deref(), Some("aws:sqs"));
        assert_eq!(record.attribute("subject"), Some("x-protocol-service"));
    }

    #[test]
    fn event_kind_displays_wire_names() {
        assert_eq!(EventKind::Web.to_string(), "web");
        assert_eq!(EventKind::ChangeStream.to_string(), "change-stream");
        assert_eq!(EventKind::Unknown.to_string(), "unknown");
    }

    #[test]
    fn decode_body_parses_braced_strings_only() {
        assert_eq!(decode_body(json!("{\"a\":1}")), json!({ "a": 1 }));
        assert_eq!(decode_body(json!(" {\"a\":1} ")), json!({ "a": 1 }));
        assert_eq!(decode_body(json!("plain text")), json!("plain text"));
        assert_eq!(decode_body(json!("{not json}")), json!("{not json}"));
        assert_eq!(decode_body(json!({ "a": 1 })), json!({ "a": 1 }));
        assert_eq!(decode_body(json!(null)), json!(null));
    }

    #[test]
    fn web_response_wire_shape() {
        let response = WebResponse { status_code: 404, ..WebResponse::default() };
        let v = serde_json::to_value(&response).unwrap();
        assert_eq!(v["statusCode"], 404);
        assert_eq!(v["body"], "");
    }
}
