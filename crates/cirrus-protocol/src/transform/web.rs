//! Web transformer: gateway-shaped events.

use std::collections::HashMap;

use cirrus_core::address::{Address, decode_segment};
use cirrus_core::context::Context;
use cirrus_core::error::{ServiceError, ServiceResult};
use cirrus_core::trigger::{HEADER_PROTOCOL_CONTEXT, RequestInfo, WebEvent, decode_body};
use serde_json::Value;

use crate::param::ProtocolParam;

/// Build the gateway-shaped trigger for a protocol call. The full caller
/// context rides, JSON-serialized, in the forwarded-context header.
pub fn to_event(address: &Address, param: &ProtocolParam, stage: &str) -> ServiceResult<Value> {
    let method = method_of(param);
    let context_json = serde_json::to_string(&param.context)
        .map_err(|e| ServiceError::internal(format!("serialize context: {e}")))?;

    let mut headers = HashMap::new();
    headers.insert(HEADER_PROTOCOL_CONTEXT.to_string(), context_json);

    let mut path_parameters = HashMap::new();
    path_parameters.insert("type".to_string(), param.resource.clone());
    if let Some(id) = &param.id {
        path_parameters.insert("id".to_string(), id.clone());
    }
    if let Some(cmd) = &param.cmd {
        path_parameters.insert("cmd".to_string(), cmd.clone());
    }

    let event = WebEvent {
        path: Some(address.path.clone()),
        http_method: Some(method.clone()),
        headers: Some(headers),
        query_string_parameters: param.param.clone(),
        path_parameters: Some(path_parameters),
        body: param.body.clone(),
        request_context: Some(RequestInfo {
            account_id: param.context.account_id.clone(),
            request_id: param.context.request_id.clone(),
            http_method: Some(method),
            stage: Some(stage.to_string()),
            ..RequestInfo::default()
        }),
    };
    serde_json::to_value(event).map_err(|e| ServiceError::internal(format!("serialize event: {e}")))
}

/// Inverse extraction. The forwarded-context header is mandatory; its
/// accountId/requestId must match the trigger's own request context.
pub fn to_param(event: &Value) -> ServiceResult<ProtocolParam> {
    let event: WebEvent = serde_json::from_value(event.clone())
        .map_err(|e| ServiceError::invalid_request(format!("web event: {e}")))?;

    let context = forwarded_context(&event)?;
    let info = event.request_context.clone().unwrap_or_default();
    context.verify_forwarded(info.account_id.as_deref(), info.request_id.as_deref())?;

    let resource = match event.path_parameter("type") {
        Some(t) if !t.is_empty() => decode_segment(t),
        _ => first_segment(event.path.as_deref().unwrap_or_default()),
    };
    let id = event.path_parameter("id").map(decode_segment).filter(|s| !s.is_empty());
    let cmd = event.path_parameter("cmd").map(decode_segment).filter(|s| !s.is_empty());

    let method = event.http_method.as_deref().unwrap_or("GET").to_ascii_uppercase();
    let mode =
        if method == "GET" && id.is_none() && cmd.is_none() { "LIST".to_string() } else { method };

    Ok(ProtocolParam {
        service: None,
        stage: info.stage.clone(),
        resource,
        mode: Some(mode),
        id,
        cmd,
        param: event.query_string_parameters.clone(),
        body: event.body.clone().map(decode_body),
        context,
    })
}

fn method_of(param: &ProtocolParam) -> String {
    match param.mode.as_deref() {
        None | Some("") | Some("LIST") => "GET".to_string(),
        Some(mode) => mode.to_ascii_uppercase(),
    }
}

fn forwarded_context(event: &WebEvent) -> ServiceResult<Context> {
    let raw = event.header(HEADER_PROTOCOL_CONTEXT).ok_or_else(missing_context)?;
    serde_json::from_str(raw).map_err(|_| missing_context())
}

fn missing_context() -> ServiceError {
    ServiceError::invalid_context(format!("header:{HEADER_PROTOCOL_CONTEXT}"))
}

fn first_segment(path: &str) -> String {
    decode_segment(path.trim_start_matches('/').split('/').next().unwrap_or_default())
}
