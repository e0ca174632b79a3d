//! Queue transformer: point-to-point queue records.

use std::collections::HashMap;

use cirrus_core::error::{ServiceError, ServiceResult};
use cirrus_core::trigger::{PROTOCOL_SUBJECT, QueueAttribute, QueueRecord};
use serde_json::Value;

use crate::param::ProtocolParam;
use crate::transform::protocol_message;

/// Build the record a queue consumer receives for this call. The subject
/// sentinel travels as a message attribute, unlike pub/sub where the
/// envelope itself has one.
pub fn to_event(param: &ProtocolParam, callback: Option<&str>) -> ServiceResult<Value> {
    let (message, _) = protocol_message(param, callback)?;
    let mut attributes = HashMap::new();
    attributes.insert("subject".to_string(), QueueAttribute::string(PROTOCOL_SUBJECT));
    if let Some(account_id) = &param.context.account_id {
        attributes.insert("accountId".to_string(), QueueAttribute::string(account_id));
    }
    if let Some(request_id) = &param.context.request_id {
        attributes.insert("requestId".to_string(), QueueAttribute::string(request_id));
    }
    let record = QueueRecord {
        message_id: None,
        event_source: Some("aws:sqs".to_string()),
        body: Some(message),
        message_attributes: Some(attributes),
    };
    serde_json::to_value(record)
        .map_err(|e| ServiceError::internal(format!("serialize record: {e}")))
}

/// Decode and validate one queue record; same validation as pub/sub with
/// the subject read from the record's attributes.
pub fn to_param(record: &QueueRecord) -> ServiceResult<ProtocolParam> {
    let subject = record.attribute("subject").unwrap_or_default();
    if subject != PROTOCOL_SUBJECT {
        return Err(ServiceError::invalid_request(format!("subject:{subject}")));
    }
    let body = record.body.as_deref().unwrap_or_default();
    let param: ProtocolParam =
        serde_json::from_str(body).map_err(|_| ServiceError::invalid_request("message body"))?;
    if param.resource.is_empty() {
        return Err(ServiceError::invalid_request("type"));
    }
    param
        .context
        .verify_forwarded(record.attribute("accountId"), record.attribute("requestId"))?;
    Ok(param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::context::Context;
    use serde_json::json;

    fn param() -> ProtocolParam {
        let context = Context::from_source("queue://88@lemon-todo-queue-dev/todo")
            .with_account_id("88")
            .with_request_id("req-1");
        ProtocolParam::new("todo", context).with_cmd("sync")
    }

    #[test]
    fn round_trips_the_call_parameter() {
        let event = to_event(&param(), None).unwrap();
        assert_eq!(event["eventSource"], "aws:sqs");
        let record: QueueRecord = serde_json::from_value(event).unwrap();
        let back = to_param(&record).unwrap();
        assert_eq!(back, param());
    }

    #[test]
    fn subject_attribute_is_required() {
        let mut event = to_event(&param(), None).unwrap();
        event["messageAttributes"]["subject"]["stringValue"] = json!("other");
        let record: QueueRecord = serde_json::from_value(event).unwrap();
        let err = to_param(&record).unwrap_err();
        assert_eq!(err.to_string(), "400 INVALID REQUEST - subject:other");

        let bare = QueueRecord::default();
        let err = to_param(&bare).unwrap_err();
        assert_eq!(err.to_string(), "400 INVALID REQUEST - subject:");
    }

    #[test]
    fn tampered_request_attribute_is_rejected() {
        let mut event = to_event(&param(), None).unwrap();
        event["messageAttributes"]["requestId"]["stringValue"] = json!("req-2");
        let record: QueueRecord = serde_json::from_value(event).unwrap();
        let err = to_param(&record).unwrap_err();
        assert_eq!(err.to_string(), "400 INVALID CONTEXT - requestId:req-2");
    }

    #[test]
    fn callback_rides_the_body_and_is_dropped_on_decode() {
        let event = to_event(&param(), Some("queue://88@lemon-todo-queue-dev/todo")).unwrap();
        let body = event["body"].as_str().unwrap();
        assert!(body.contains("\"callback\""));
        let record: QueueRecord = serde_json::from_value(event).unwrap();
        assert_eq!(to_param(&record).unwrap(), param());
    }
}
