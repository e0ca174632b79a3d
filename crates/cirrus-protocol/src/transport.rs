//! Transport collaborator contracts.
//!
//! The protocol service talks to the cloud through these traits only;
//! adapters for a concrete SDK live outside this crate. Edges carry
//! `anyhow::Error` and are normalized to transport errors by the caller.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cirrus_core::address::Protocol;
use cirrus_core::error::ServiceResult;
use serde_json::Value;

use crate::param::ProtocolParam;

/// Fixed delivery delay applied to queue sends.
pub const DELIVERY_DELAY: Duration = Duration::from_secs(10);

/// Synchronous direct invocation of a named target function.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, function: &str, payload: Value) -> anyhow::Result<Value>;
}

/// Message handed to a pub/sub broker.
///
/// `message` and `structured` carry the same payload in both text and
/// parsed form so an adapter can feed either to its SDK.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishEnvelope {
    pub subject: String,
    pub message: String,
    pub structured: Value,
    pub attributes: HashMap<String, String>,
}

/// Fire-and-forget publish to a topic; returns the broker message id.
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, topic: &str, envelope: &PublishEnvelope) -> anyhow::Result<String>;
}

/// Fire-and-forget send to a point-to-point queue; returns the broker
/// message id.
#[async_trait]
pub trait QueueSender: Send + Sync {
    async fn send(
        &self,
        queue: &str,
        body: String,
        attributes: HashMap<String, String>,
        delay: Duration,
    ) -> anyhow::Result<String>;
}

/// Cloud-specific resource template for a protocol: a topic or queue
/// identifier whose final segment names the resource. The core substitutes
/// that segment with a derived host and preserves the rest.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve_template(&self, protocol: Protocol) -> anyhow::Result<String>;
}

/// Receiving-side processor for one decoded protocol call.
#[async_trait]
pub trait ProtocolExecutor: Send + Sync {
    async fn execute(&self, param: ProtocolParam) -> ServiceResult<Value>;
}
