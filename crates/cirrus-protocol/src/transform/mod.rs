//! Bidirectional wire transformers, one per protocol.
//!
//! `to_event` produces the transport-native trigger shape a receiving
//! dispatcher treats exactly like an externally-produced event; `to_param`
//! is the inverse extraction, validating the forwarded context on the way
//! in.

use cirrus_core::error::{ServiceError, ServiceResult};
use serde_json::Value;

use crate::param::ProtocolParam;

pub mod pubsub;
pub mod queue;
pub mod web;

/// Message body of an async protocol call: the param itself, with the
/// optional callback address alongside. Returned in both text and parsed
/// form.
pub(crate) fn protocol_message(
    param: &ProtocolParam,
    callback: Option<&str>,
) -> ServiceResult<(String, Value)> {
    let mut value = serde_json::to_value(param)
        .map_err(|e| ServiceError::internal(format!("serialize param: {e}")))?;
    if let (Some(callback), Some(map)) = (callback, value.as_object_mut()) {
        map.insert("callback".to_string(), Value::String(callback.to_string()));
    }
    Ok((value.to_string(), value))
}
