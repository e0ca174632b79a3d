//! Pub/sub transformer: broker topic records.

use std::collections::HashMap;

use cirrus_core::error::{ServiceError, ServiceResult};
use cirrus_core::trigger::{PROTOCOL_SUBJECT, PubSubRecord, SnsAttribute, SnsMessage};
use serde_json::Value;

use crate::param::ProtocolParam;
use crate::transform::protocol_message;

/// Build the record a subscriber receives for this call: subject sentinel,
/// the param as the message body, context attributes out of band.
pub fn to_event(param: &ProtocolParam, callback: Option<&str>) -> ServiceResult<Value> {
    let (message, _) = protocol_message(param, callback)?;
    let mut attributes = HashMap::new();
    if let Some(account_id) = &param.context.account_id {
        attributes.insert("accountId".to_string(), SnsAttribute::string(account_id));
    }
    if let Some(request_id) = &param.context.request_id {
        attributes.insert("requestId".to_string(), SnsAttribute::string(request_id));
    }
    let record = PubSubRecord {
        event_source: Some("aws:sns".to_string()),
        sns: Some(SnsMessage {
            subject: Some(PROTOCOL_SUBJECT.to_string()),
            message: Some(message),
            message_attributes: (!attributes.is_empty()).then_some(attributes),
        }),
    };
    serde_json::to_value(record)
        .map_err(|e| ServiceError::internal(format!("serialize record: {e}")))
}

/// Decode and validate one broker record. The subject must equal the
/// protocol sentinel exactly; attribute accountId/requestId must match the
/// embedded context.
pub fn to_param(record: &PubSubRecord) -> ServiceResult<ProtocolParam> {
    let sns = record.sns.clone().unwrap_or_default();
    let subject = sns.subject.as_deref().unwrap_or_default();
    if subject != PROTOCOL_SUBJECT {
        return Err(ServiceError::invalid_request(format!("subject:{subject}")));
    }
    let message = sns.message.as_deref().unwrap_or_default();
    let param: ProtocolParam =
        serde_json::from_str(message).map_err(|_| ServiceError::invalid_request("message body"))?;
    if param.resource.is_empty() {
        return Err(ServiceError::invalid_request("type"));
    }
    param.context.verify_forwarded(sns.attribute("accountId"), sns.attribute("requestId"))?;
    Ok(param)
}
