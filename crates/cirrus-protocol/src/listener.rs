//! Receiving side of async protocol calls.
//!
//! A broker trigger carries a batch of records; each record decodes to a
//! [`ProtocolParam`] and runs through the executor with bounded
//! concurrency. One record's failure becomes a string result and never
//! aborts its siblings.

use std::sync::Arc;

use async_trait::async_trait;
use cirrus_core::context::Context;
use cirrus_core::error::{ServiceError, ServiceResult};
use cirrus_core::trigger::{EventKind, PubSubRecord, QueueRecord};
use cirrus_dispatch::batch::run_bounded;
use cirrus_dispatch::dispatcher::Dispatcher;
use cirrus_dispatch::handler::EventService;
use serde_json::Value;
use tracing::debug;

use crate::param::ProtocolParam;
use crate::transform::{pubsub, queue};
use crate::transport::ProtocolExecutor;

/// Handles pub/sub and queue triggers by decoding each record and handing
/// it to the executor.
pub struct ProtocolListener {
    executor: Arc<dyn ProtocolExecutor>,
    concurrency: usize,
}

impl ProtocolListener {
    pub fn new(executor: Arc<dyn ProtocolExecutor>, concurrency: usize) -> Self {
        Self { executor, concurrency }
    }

    /// Register this listener for both broker trigger kinds.
    pub fn attach(self: &Arc<Self>, dispatcher: &Dispatcher) {
        dispatcher.register_service(EventKind::PubSub, self.clone());
        dispatcher.register_service(EventKind::Queue, self.clone());
    }
}

#[async_trait]
impl EventService for ProtocolListener {
    async fn handle(&self, event: &Value, _context: &Context) -> ServiceResult<Value> {
        let records = event.get("Records").and_then(Value::as_array).cloned().unwrap_or_default();
        debug!(records = records.len(), "protocol batch");
        let results = run_bounded(records, self.concurrency, |record| {
            let executor = self.executor.clone();
            async move {
                let outcome = match record_to_param(&record) {
                    Ok(param) => executor.execute(param).await,
                    Err(err) => Err(err),
                };
                // A failed record becomes a string result so siblings run.
                outcome.unwrap_or_else(|err| Value::String(err.to_string()))
            }
        })
        .await;
        Ok(Value::Array(results))
    }
}

/// Pick the transformer by record shape.
fn record_to_param(record: &Value) -> ServiceResult<ProtocolParam> {
    if record.get("Sns").filter(|v| !v.is_null()).is_some() {
        let record: PubSubRecord = serde_json::from_value(record.clone())
            .map_err(|e| ServiceError::invalid_request(format!("pubsub record: {e}")))?;
        pubsub::to_param(&record)
    } else {
        let record: QueueRecord = serde_json::from_value(record.clone())
            .map_err(|e| ServiceError::invalid_request(format!("queue record: {e}")))?;
        queue::to_param(&record)
    }
}
