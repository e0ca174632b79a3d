//! The protocol service: canonical addressing plus the three call verbs.
//!
//! `execute` is synchronous request/response over direct invocation;
//! `notify` and `enqueue` are best-effort asynchronous sends. All three
//! derive the target address the same way and differ only in transport.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cirrus_core::address::{self, Address, AddressSpec, Protocol};
use cirrus_core::config::{ConfigLoader, ServiceConfig};
use cirrus_core::error::{ServiceError, ServiceResult, parse_status_prefix};
use cirrus_core::report::{ErrorReporter, report_quietly};
use cirrus_core::trigger::{PROTOCOL_SUBJECT, WebResponse, decode_body};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::param::ProtocolParam;
use crate::transform::{self, web};
use crate::transport::{
    AddressResolver, DELIVERY_DELAY, FunctionInvoker, ProtocolExecutor, PublishEnvelope,
    QueueSender, TopicPublisher,
};

/// Cross-service calls over the web, pub/sub, and queue transports.
///
/// Configuration loads lazily on first use and is memoized; concurrent
/// first callers await the same single load. Collaborators and the
/// optional reporter are constructor-injected.
pub struct ProtocolService {
    loader: Arc<dyn ConfigLoader>,
    config: OnceCell<ServiceConfig>,
    invoker: Arc<dyn FunctionInvoker>,
    publisher: Arc<dyn TopicPublisher>,
    sender: Arc<dyn QueueSender>,
    resolver: Arc<dyn AddressResolver>,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl ProtocolService {
    pub fn new(
        loader: Arc<dyn ConfigLoader>,
        invoker: Arc<dyn FunctionInvoker>,
        publisher: Arc<dyn TopicPublisher>,
        sender: Arc<dyn QueueSender>,
        resolver: Arc<dyn AddressResolver>,
    ) -> Self {
        Self {
            loader,
            config: OnceCell::new(),
            invoker,
            publisher,
            sender,
            resolver,
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Effective configuration, loaded once.
    pub async fn config(&self) -> ServiceResult<&ServiceConfig> {
        self.config
            .get_or_try_init(|| async {
                self.loader
                    .load()
                    .await
                    .map_err(|e| ServiceError::transport(format!("config load failed: {e}")))
            })
            .await
    }

    /// Canonical address a call to `param` would target.
    pub async fn address(&self, protocol: Protocol, param: &ProtocolParam) -> ServiceResult<Address> {
        let config = self.config().await?;
        Ok(address::as_address(protocol, &spec_of(param), config))
    }

    /// Synchronous request/response over the web transport.
    ///
    /// Failures are best-effort reported when a reporter is configured and
    /// always propagated unchanged.
    pub async fn execute(&self, param: &ProtocolParam) -> ServiceResult<Value> {
        let result = self.execute_inner(param).await;
        if let Err(err) = &result {
            if let Some(reporter) = &self.reporter {
                let data = serde_json::to_value(param).unwrap_or(Value::Null);
                report_quietly(reporter.as_ref(), err, Some(&param.context), None, Some(&data))
                    .await;
            }
        }
        result
    }

    async fn execute_inner(&self, param: &ProtocolParam) -> ServiceResult<Value> {
        let config = self.config().await?;
        let address = address::as_address(Protocol::Web, &spec_of(param), config);
        let stage = param.stage.clone().unwrap_or_else(|| config.stage.to_string());
        let event = web::to_event(&address, param, &stage)?;
        debug!(%address, "protocol execute");
        let response =
            self.invoker.invoke(&address.host, event).await.map_err(ServiceError::transport)?;
        unwrap_response(response)
    }

    /// Fire-and-forget publish over the pub/sub transport; returns the
    /// broker message id.
    pub async fn notify(
        &self,
        param: &ProtocolParam,
        callback: Option<&str>,
    ) -> ServiceResult<String> {
        let config = self.config().await?;
        let address = address::as_address(Protocol::Pubsub, &spec_of(param), config);
        let template = self
            .resolver
            .resolve_template(Protocol::Pubsub)
            .await
            .map_err(ServiceError::transport)?;
        let topic = substitute_resource(&template, &address.host, ':');
        let (message, structured) = transform::protocol_message(param, callback)?;
        let envelope = PublishEnvelope {
            subject: PROTOCOL_SUBJECT.to_string(),
            message,
            structured,
            attributes: context_attributes(param),
        };
        debug!(%address, %topic, "protocol notify");
        self.publisher.publish(&topic, &envelope).await.map_err(ServiceError::transport)
    }

    /// Fire-and-forget send over the queue transport with the fixed
    /// delivery delay; returns the broker message id.
    pub async fn enqueue(
        &self,
        param: &ProtocolParam,
        callback: Option<&str>,
    ) -> ServiceResult<String> {
        let config = self.config().await?;
        let address = address::as_address(Protocol::Queue, &spec_of(param), config);
        let template = self
            .resolver
            .resolve_template(Protocol::Queue)
            .await
            .map_err(ServiceError::transport)?;
        let queue = substitute_resource(&template, &address.host, '/');
        let (message, _) = transform::protocol_message(param, callback)?;
        let mut attributes = context_attributes(param);
        attributes.insert("subject".to_string(), PROTOCOL_SUBJECT.to_string());
        debug!(%address, %queue, "protocol enqueue");
        self.sender
            .send(&queue, message, attributes, DELIVERY_DELAY)
            .await
            .map_err(ServiceError::transport)
    }
}

// Lets the receiving-side listener run calls through a full service, so a
// process can both make and serve protocol calls.
#[async_trait]
impl ProtocolExecutor for ProtocolService {
    async fn execute(&self, param: ProtocolParam) -> ServiceResult<Value> {
        ProtocolService::execute(self, &param).await
    }
}

fn spec_of(param: &ProtocolParam) -> AddressSpec<'_> {
    AddressSpec {
        service: param.service.as_deref(),
        stage: param.stage.as_deref(),
        resource: &param.resource,
        id: param.id.as_deref(),
        cmd: param.cmd.as_deref(),
        account_id: param.context.account_id.as_deref(),
    }
}

fn context_attributes(param: &ProtocolParam) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    if let Some(account_id) = &param.context.account_id {
        attributes.insert("accountId".to_string(), account_id.clone());
    }
    if let Some(request_id) = &param.context.request_id {
        attributes.insert("requestId".to_string(), request_id.clone());
    }
    attributes
}

/// Substitute the final `sep`-separated segment of a resource template
/// with `host`. Account, region, and partition segments before it are
/// preserved as the template wrote them.
fn substitute_resource(template: &str, host: &str, sep: char) -> String {
    match template.rsplit_once(sep) {
        Some((head, _)) => format!("{head}{sep}{host}"),
        None => host.to_string(),
    }
}

/// Unwrap a direct-invoke response envelope into a result.
fn unwrap_response(response: Value) -> ServiceResult<Value> {
    let envelope: WebResponse = serde_json::from_value(response)
        .map_err(|e| ServiceError::transport(format!("malformed invoke response: {e}")))?;
    match envelope.status_code {
        200 => Ok(decode_body(Value::String(envelope.body))),
        status @ (400 | 404) => {
            // The body text is the upstream's structured error; keep it
            // byte-for-byte.
            if parse_status_prefix(&envelope.body).is_some() {
                Err(ServiceError::from_message(envelope.body))
            } else {
                Err(ServiceError::upstream(status, envelope.body))
            }
        }
        status => {
            Err(ServiceError::upstream(status, format!("{status} FAILURE - {}", envelope.body)))
        }
    }
}
