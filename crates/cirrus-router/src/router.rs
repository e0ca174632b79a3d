//! REST-style sub-router for HTTP-shaped triggers.
//!
//! Business services register one decoder per resource type. The router
//! reads `/{type}/{id}/{cmd}` out of a gateway trigger, asks the decoder
//! for the next handler, and renders success and failure alike as a
//! gateway response.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use cirrus_core::address::decode_segment;
use cirrus_core::config::ServiceConfig;
use cirrus_core::context::Context;
use cirrus_core::error::{ServiceError, ServiceResult};
use cirrus_core::report::{ErrorReporter, report_quietly};
use cirrus_core::trigger::{
    EventKind, HEADER_IDENTITY, HEADER_PROTOCOL_CONTEXT, RuntimeContext, WebEvent, WebResponse,
    decode_body,
};
use cirrus_dispatch::dispatcher::Dispatcher;
use cirrus_dispatch::handler::EventService;
use cirrus_protocol::transform::web;
use serde_json::{Map, Value};
use tracing::debug;

use crate::response;

type RouteFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = ServiceResult<Value>> + Send>>;

/// Resolved target of one routed request: `(id, query, body, context)`.
pub type NextHandler = Arc<
    dyn Fn(Option<String>, Option<Map<String, Value>>, Option<Value>, Context) -> RouteFuture
        + Send
        + Sync,
>;

/// Per-resource routing decision: `(mode, id, cmd)` to the handler serving
/// that combination, or `None` when it is unserved.
pub type NextDecoder =
    Arc<dyn Fn(&str, Option<&str>, Option<&str>) -> Option<NextHandler> + Send + Sync>;

/// Web sub-router; registers with the dispatcher as the `Web` handler.
///
/// Routing state is written at startup registration and only read after,
/// mirroring the dispatcher's registry. `handle` is total: every failure
/// becomes a gateway response.
pub struct WebRouter {
    config: ServiceConfig,
    routes: RwLock<HashMap<String, NextDecoder>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl WebRouter {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config, routes: RwLock::new(HashMap::new()), reporter: None }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Register the decoder serving one resource type. Last registration
    /// wins.
    pub fn set_handler(&self, resource: impl Into<String>, decoder: NextDecoder) {
        self.routes.write().expect("routes lock").insert(resource.into(), decoder);
    }

    /// Register this router as the dispatcher's web handler.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        dispatcher.register_service(EventKind::Web, self.clone());
    }

    async fn route(&self, event: &Value, context: &Context) -> ServiceResult<Value> {
        let request: WebEvent = serde_json::from_value(event.clone())
            .map_err(|e| ServiceError::invalid_request(format!("web event: {e}")))?;

        let method = request.http_method.as_deref().unwrap_or("GET").to_ascii_uppercase();
        // CORS preflight never reaches a handler.
        if method == "OPTIONS" {
            return Ok(Value::String(String::new()));
        }

        let resource = match request.path_parameter("type") {
            Some(t) if !t.is_empty() => decode_segment(t),
            _ => first_segment(request.path.as_deref().unwrap_or_default()),
        };
        let id = request.path_parameter("id").map(decode_segment).filter(|s| !s.is_empty());
        let cmd = request.path_parameter("cmd").map(decode_segment).filter(|s| !s.is_empty());
        let mode = if method == "GET" && id.is_none() { "LIST".to_string() } else { method };
        debug!(%resource, %mode, "routing request");

        let decoder = self.routes.read().expect("routes lock").get(&resource).cloned();
        let handler = decoder.and_then(|decode| decode(&mode, id.as_deref(), cmd.as_deref()));
        let handler = handler.ok_or_else(|| {
            ServiceError::not_found(format!(
                "{mode} /{resource}/{}/{}",
                id.as_deref().unwrap_or_default(),
                cmd.as_deref().unwrap_or_default()
            ))
        })?;

        let body = request.body.clone().map(decode_body);
        handler(id, request.query_string_parameters.clone(), body, context.clone()).await
    }

    /// Error-to-response mapping. Not-found bypasses reporting; any other
    /// reported failure is rendered opaque as 503.
    async fn error_response(
        &self,
        error: &ServiceError,
        event: &Value,
        context: &Context,
    ) -> WebResponse {
        let message = error.to_string();
        if message.starts_with("404 NOT FOUND") {
            return response::failure(404, message);
        }
        if let Some(reporter) = &self.reporter {
            report_quietly(reporter.as_ref(), error, Some(context), Some(event), None).await;
            return response::failure(503, message);
        }
        response::failure(response::status_for(&message), message)
    }
}

#[async_trait]
impl EventService for WebRouter {
    async fn pack_context(&self, event: &Value, _runtime: &RuntimeContext) -> ServiceResult<Context> {
        let request: WebEvent = serde_json::from_value(event.clone())
            .map_err(|e| ServiceError::invalid_request(format!("web event: {e}")))?;

        // Protocol re-entry: the forwarded context wins over everything.
        if request.header(HEADER_PROTOCOL_CONTEXT).is_some() {
            return Ok(web::to_param(event)?.context);
        }

        let info = request.request_context.clone().unwrap_or_default();
        let path = request.path.as_deref().unwrap_or_default();
        let mut context =
            Context::from_source(source_uri(&self.config, info.account_id.as_deref(), path));
        if let Some(identity) = direct_identity(&request) {
            context = context.with_identity(identity);
        }
        if let Some(ip) = info.source_ip() {
            context = context.with_client_ip(ip);
        }
        if let Some(account_id) = &info.account_id {
            context = context.with_account_id(account_id);
        }
        if let Some(request_id) = &info.request_id {
            context = context.with_request_id(request_id);
        }
        if let Some(domain) = &info.domain_name {
            context = context.with_domain(domain);
        }
        if let Some(cookies) = request.header("cookie").map(parse_cookies) {
            context = context.with_cookies(cookies);
        }
        Ok(context)
    }

    async fn handle(&self, event: &Value, context: &Context) -> ServiceResult<Value> {
        let response = match self.route(event, context).await {
            Ok(value) => response::success(&value),
            Err(error) => {
                debug!(%error, "request failed");
                self.error_response(&error, event, context).await
            }
        };
        serde_json::to_value(response)
            .map_err(|e| ServiceError::internal(format!("serialize response: {e}")))
    }
}

/// Identity from the direct-identity header, JSON-decoded when bounded by
/// braces; falls back to the gateway's own identity block.
fn direct_identity(request: &WebEvent) -> Option<Value> {
    match request.header(HEADER_IDENTITY) {
        Some(raw) => Some(decode_body(Value::String(raw.to_string()))),
        None => request.request_context.as_ref()?.identity.clone(),
    }
}

/// `web://<accountId>@<service>-<stage><path>#<version>`; the account part
/// is omitted when unknown.
fn source_uri(config: &ServiceConfig, account_id: Option<&str>, path: &str) -> String {
    let account =
        account_id.filter(|a| !a.is_empty()).map(|a| format!("{a}@")).unwrap_or_default();
    format!("web://{account}{}-{}{path}#{}", config.service, config.stage, config.version)
}

fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn first_segment(path: &str) -> String {
    decode_segment(path.trim_start_matches('/').split('/').next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_core::config::Stage;
    use cirrus_core::report::ErrorReporter;
    use serde_json::json;
    use std::sync::Mutex;

    fn config() -> ServiceConfig {
        ServiceConfig {
            service: "lemon-hello-api".to_string(),
            stage: Stage::Dev,
            ..ServiceConfig::default()
        }
    }

    /// Decoder serving every mode; the handler echoes what it was given.
    fn echo_decoder() -> NextDecoder {
        Arc::new(|mode, _id, cmd| {
            if cmd == Some("unserved") {
                return None;
            }
            let mode = mode.to_string();
            let cmd = cmd.map(str::to_string);
            let handler: NextHandler = Arc::new(move |id, param, body, context| {
                let mode = mode.clone();
                let cmd = cmd.clone();
                Box::pin(async move {
                    Ok(json!({
                        "mode": mode,
                        "id": id,
                        "cmd": cmd,
                        "param": param,
                        "body": body,
                        "account": context.account_id,
                    }))
                })
            });
            Some(handler)
        })
    }

    fn failing_decoder(error: ServiceError) -> NextDecoder {
        Arc::new(move |_mode, _id, _cmd| {
            let error = error.clone();
            let handler: NextHandler = Arc::new(move |_id, _param, _body, _context| {
                let error = error.clone();
                Box::pin(async move { Err(error) })
            });
            Some(handler)
        })
    }

    fn gateway_event(method: &str, path: &str, id: Option<&str>, cmd: Option<&str>) -> Value {
        let mut path_parameters = serde_json::Map::new();
        let resource = path.trim_start_matches('/').split('/').next().unwrap_or_default();
        path_parameters.insert("type".to_string(), json!(resource));
        if let Some(id) = id {
            path_parameters.insert("id".to_string(), json!(id));
        }
        if let Some(cmd) = cmd {
            path_parameters.insert("cmd".to_string(), json!(cmd));
        }
        json!({
            "path": path,
            "httpMethod": method,
            "headers": {},
            "pathParameters": path_parameters,
            "requestContext": {
                "accountId": "88",
                "requestId": "req-1",
                "identity": { "sourceIp": "10.0.0.9" }
            }
        })
    }

    async fn respond(router: &WebRouter, event: Value) -> Value {
        router.handle(&event, &Context::default().with_account_id("88")).await.unwrap()
    }

    #[tokio::test]
    async fn get_without_id_routes_as_list() {
        let router = WebRouter::new(config());
        router.set_handler("hello", echo_decoder());
        let out = respond(&router, gateway_event("GET", "/hello", None, None)).await;
        assert_eq!(out["statusCode"], 200);
        let body: Value = serde_json::from_str(out["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["mode"], "LIST");
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["account"], "88");
    }

    #[tokio::test]
    async fn get_with_id_keeps_the_method() {
        let router = WebRouter::new(config());
        router.set_handler("hello", echo_decoder());
        let out = respond(&router, gateway_event("get", "/hello/1", Some("1"), None)).await;
        let body: Value = serde_json::from_str(out["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["mode"], "GET");
        assert_eq!(body["id"], "1");
    }

    #[tokio::test]
    async fn path_parameters_are_percent_decoded() {
        let router = WebRouter::new(config());
        router.set_handler("hello", echo_decoder());
        let event = gateway_event("GET", "/hello/a%20b/do%2Fit", Some("a%20b"), Some("do%2Fit"));
        let out = respond(&router, event).await;
        let body: Value = serde_json::from_str(out["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["id"], "a b");
        assert_eq!(body["cmd"], "do/it");
    }

    #[tokio::test]
    async fn body_and_query_reach_the_handler() {
        let router = WebRouter::new(config());
        router.set_handler("hello", echo_decoder());
        let mut event = gateway_event("POST", "/hello/1", Some("1"), None);
        event["body"] = json!("{\"name\":\"case\"}");
        event["queryStringParameters"] = json!({ "page": 2 });
        let out = respond(&router, event).await;
        let body: Value = serde_json::from_str(out["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["mode"], "POST");
        assert_eq!(body["body"], json!({ "name": "case" }));
        assert_eq!(body["param"], json!({ "page": 2 }));
    }

    #[tokio::test]
    async fn options_short_circuits_with_cors() {
        let router = WebRouter::new(config());
        let out = respond(&router, gateway_event("OPTIONS", "/hello", None, None)).await;
        assert_eq!(out["statusCode"], 200);
        assert_eq!(out["body"], "");
        assert_eq!(out["headers"]["Access-Control-Allow-Origin"], "*");
    }

    #[tokio::test]
    async fn missing_decoder_is_not_found() {
        let router = WebRouter::new(config());
        let out = respond(&router, gateway_event("GET", "/ghost", None, None)).await;
        assert_eq!(out["statusCode"], 404);
        assert_eq!(out["body"], "404 NOT FOUND - LIST /ghost//");
    }

    #[tokio::test]
    async fn declined_combination_is_not_found() {
        let router = WebRouter::new(config());
        router.set_handler("hello", echo_decoder());
        let event = gateway_event("POST", "/hello/1/unserved", Some("1"), Some("unserved"));
        let out = respond(&router, event).await;
        assert_eq!(out["statusCode"], 404);
        assert_eq!(out["body"], "404 NOT FOUND - POST /hello/1/unserved");
    }

    #[tokio::test]
    async fn structured_errors_map_to_their_status() {
        let router = WebRouter::new(config());
        router.set_handler("hello", failing_decoder(ServiceError::invalid_request("name")));
        let out = respond(&router, gateway_event("GET", "/hello", None, None)).await;
        assert_eq!(out["statusCode"], 400);
        assert_eq!(out["body"], "400 INVALID REQUEST - name");
    }

    #[tokio::test]
    async fn unstructured_errors_map_to_503() {
        let router = WebRouter::new(config());
        router.set_handler("hello", failing_decoder(ServiceError::transport("socket hang up")));
        let out = respond(&router, gateway_event("GET", "/hello", None, None)).await;
        assert_eq!(out["statusCode"], 503);
        assert_eq!(out["body"], "socket hang up");
    }

    struct Recording(Mutex<Vec<String>>);

    #[async_trait]
    impl ErrorReporter for Recording {
        async fn report(
            &self,
            error: &ServiceError,
            _context: Option<&Context>,
            _event: Option<&Value>,
            _data: Option<&Value>,
        ) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(error.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn reported_failures_render_as_503() {
        let reporter = Arc::new(Recording(Mutex::new(Vec::new())));
        let router = WebRouter::new(config()).with_reporter(reporter.clone());
        router.set_handler("hello", failing_decoder(ServiceError::invalid_request("name")));
        let out = respond(&router, gateway_event("GET", "/hello", None, None)).await;
        assert_eq!(out["statusCode"], 503);
        assert_eq!(out["body"], "400 INVALID REQUEST - name");
        assert_eq!(*reporter.0.lock().unwrap(), vec!["400 INVALID REQUEST - name".to_string()]);
    }

    #[tokio::test]
    async fn not_found_bypasses_the_reporter() {
        let reporter = Arc::new(Recording(Mutex::new(Vec::new())));
        let router = WebRouter::new(config()).with_reporter(reporter.clone());
        let out = respond(&router, gateway_event("GET", "/ghost", None, None)).await;
        assert_eq!(out["statusCode"], 404);
        assert!(reporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn packs_a_direct_caller_context() {
        let router = WebRouter::new(config());
        let mut event = gateway_event("GET", "/hello/1", Some("1"), None);
        event["headers"] = json!({
            "X-Cirrus-Identity": "{\"sid\":\"s-1\"}",
            "Cookie": "session=abc; theme=dark"
        });
        event["requestContext"]["domainName"] = json!("api.lemon.dev");

        let context = router.pack_context(&event, &RuntimeContext::default()).await.unwrap();
        assert_eq!(
            context.source.as_deref(),
            Some("web://88@lemon-hello-api-dev/hello/1#0.1.0")
        );
        assert_eq!(context.identity, Some(json!({ "sid": "s-1" })));
        assert_eq!(context.client_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(context.account_id.as_deref(), Some("88"));
        assert_eq!(context.request_id.as_deref(), Some("req-1"));
        assert_eq!(context.domain.as_deref(), Some("api.lemon.dev"));
        let cookies = context.cookies.unwrap();
        assert_eq!(cookies["session"], "abc");
        assert_eq!(cookies["theme"], "dark");
    }

    #[tokio::test]
    async fn identity_falls_back_to_the_gateway_block() {
        let router = WebRouter::new(config());
        let event = gateway_event("GET", "/hello", None, None);
        let context = router.pack_context(&event, &RuntimeContext::default()).await.unwrap();
        assert_eq!(context.identity, Some(json!({ "sourceIp": "10.0.0.9" })));
        assert_eq!(context.source.as_deref(), Some("web://88@lemon-hello-api-dev/hello#0.1.0"));
    }

    #[tokio::test]
    async fn forwarded_context_is_adopted_verbatim() {
        let router = WebRouter::new(config());
        let forwarded = Context::from_source("web://88@lemon-todo-dev/todo#1.0.0")
            .with_account_id("88")
            .with_request_id("req-9");
        let mut event = gateway_event("GET", "/hello/1", Some("1"), None);
        event["headers"] =
            json!({ "x-protocol-context": serde_json::to_string(&forwarded).unwrap() });
        event["requestContext"]["requestId"] = json!("req-9");

        let context = router.pack_context(&event, &RuntimeContext::default()).await.unwrap();
        assert_eq!(context, forwarded);
    }

    #[tokio::test]
    async fn tampered_forwarded_context_is_rejected() {
        let router = WebRouter::new(config());
        let forwarded = Context::default().with_account_id("88").with_request_id("req-1");
        let mut event = gateway_event("GET", "/hello/1", Some("1"), None);
        event["headers"] =
            json!({ "x-protocol-context": serde_json::to_string(&forwarded).unwrap() });
        event["requestContext"]["accountId"] = json!("99");

        let err = router.pack_context(&event, &RuntimeContext::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "400 INVALID CONTEXT - accountId:99");
    }
}
