//! Kind-keyed handler registry and the dispatch entrypoint.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use cirrus_core::error::{ServiceError, ServiceResult};
use cirrus_core::report::{ErrorReporter, report_quietly};
use cirrus_core::trigger::{EventKind, RuntimeContext};
use serde_json::Value;
use tracing::debug;

use crate::classify::classify;
use crate::handler::{EventService, FunctionAdapter, HandlerFn, ServiceAdapter, TriggerHandler};

/// Routes each inbound trigger to the handler registered for its kind.
///
/// Handlers are registered at startup and looked up per dispatch; a later
/// registration for the same kind replaces the earlier one. The optional
/// reporter receives every dispatch failure best-effort; reporting never
/// replaces the failure itself.
pub struct Dispatcher {
    handlers: RwLock<HashMap<EventKind, Arc<dyn TriggerHandler>>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { handlers: RwLock::new(HashMap::new()), reporter: None }
    }

    pub fn with_reporter(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { handlers: RwLock::new(HashMap::new()), reporter: Some(reporter) }
    }

    /// Register a handler for a trigger kind.
    pub fn register(&self, kind: EventKind, handler: Arc<dyn TriggerHandler>) {
        debug!(%kind, "registering handler");
        self.handlers.write().expect("handlers lock").insert(kind, handler);
    }

    /// Register an object-style service.
    pub fn register_service(&self, kind: EventKind, service: Arc<dyn EventService>) {
        self.register(kind, Arc::new(ServiceAdapter::new(service)));
    }

    /// Register a function-style handler.
    pub fn register_fn(&self, kind: EventKind, handler: HandlerFn) {
        self.register(kind, Arc::new(FunctionAdapter::new(handler)));
    }

    /// Classify one trigger and run the matching handler.
    pub async fn dispatch(&self, event: &Value, runtime: &RuntimeContext) -> ServiceResult<Value> {
        let kind = classify(event);
        debug!(%kind, "dispatching trigger");
        let handler = self.handlers.read().expect("handlers lock").get(&kind).cloned();
        let result = match handler {
            Some(handler) => handler.invoke(event, runtime).await,
            None => Err(ServiceError::unknown_event(kind)),
        };
        if let Err(err) = &result {
            debug!(%kind, %err, "dispatch failed");
            if let Some(reporter) = &self.reporter {
                report_quietly(reporter.as_ref(), err, None, Some(event), None).await;
            }
        }
        result
    }
}
