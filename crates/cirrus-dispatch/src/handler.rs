//! Handler model: one trait, two adapters.
//!
//! Business handlers come in two shapes. Function-style handlers receive
//! the raw trigger plus a completion handle and may either return a value
//! or signal through the handle; whichever fires first resolves the
//! invocation, exactly once. Service-style handlers pack a call context
//! first and then handle the typed pair.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cirrus_core::context::Context;
use cirrus_core::error::{ServiceError, ServiceResult};
use cirrus_core::trigger::RuntimeContext;
use serde_json::Value;
use tokio::sync::oneshot;

/// A registered trigger handler, as the dispatcher sees it.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn invoke(&self, event: &Value, runtime: &RuntimeContext) -> ServiceResult<Value>;
}

/// Object-style handler: packs a context, then handles the event.
#[async_trait]
pub trait EventService: Send + Sync {
    /// Build the call context for one trigger. The default extracts no
    /// identity and returns an empty context.
    async fn pack_context(&self, event: &Value, runtime: &RuntimeContext) -> ServiceResult<Context> {
        let _ = (event, runtime);
        Ok(Context::default())
    }

    async fn handle(&self, event: &Value, context: &Context) -> ServiceResult<Value>;
}

/// Registers an [`EventService`] as a [`TriggerHandler`].
pub struct ServiceAdapter {
    service: Arc<dyn EventService>,
}

impl ServiceAdapter {
    pub fn new(service: Arc<dyn EventService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TriggerHandler for ServiceAdapter {
    async fn invoke(&self, event: &Value, runtime: &RuntimeContext) -> ServiceResult<Value> {
        let context = self.service.pack_context(event, runtime).await?;
        self.service.handle(event, &context).await
    }
}

/// First-signal-wins completion handle passed to function-style handlers.
///
/// Clonable; the first `succeed`/`fail` across all clones resolves the
/// invocation and every later signal is ignored.
#[derive(Clone)]
pub struct Completer {
    tx: Arc<Mutex<Option<oneshot::Sender<ServiceResult<Value>>>>>,
}

impl Completer {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<ServiceResult<Value>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Arc::new(Mutex::new(Some(tx))) }, rx)
    }

    pub fn succeed(&self, value: Value) {
        self.settle(Ok(value));
    }

    pub fn fail(&self, error: ServiceError) {
        self.settle(Err(error));
    }

    fn settle(&self, result: ServiceResult<Value>) {
        if let Some(tx) = self.tx.lock().expect("completer lock").take() {
            let _ = tx.send(result);
        }
    }
}

type HandlerFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = ServiceResult<Option<Value>>> + Send>>;

/// Function-style handler: raw trigger, runtime metadata, completion handle.
///
/// Return `Ok(Some(value))` to resolve directly, `Ok(None)` to defer to the
/// completion handle, `Err` to reject.
pub type HandlerFn = Arc<dyn Fn(Value, RuntimeContext, Completer) -> HandlerFuture + Send + Sync>;

/// Runs a [`HandlerFn`] with the completion race.
pub struct FunctionAdapter {
    handler: HandlerFn,
}

impl FunctionAdapter {
    pub fn new(handler: HandlerFn) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl TriggerHandler for FunctionAdapter {
    async fn invoke(&self, event: &Value, runtime: &RuntimeContext) -> ServiceResult<Value> {
        let (completer, mut rx) = Completer::channel();
        let fut = (self.handler)(event.clone(), runtime.clone(), completer.clone());
        tokio::pin!(fut);
        tokio::select! {
            signal = &mut rx => match signal {
                // Completion handle fired first; the handler future is
                // dropped without being driven further.
                Ok(result) => result,
                Err(_) => Err(no_result()),
            },
            returned = &mut fut => {
                match returned {
                    Ok(Some(value)) => completer.succeed(value),
                    Ok(None) => {}
                    Err(err) => completer.fail(err),
                }
                // Release our clone so a handler that signalled nothing and
                // kept no clone alive closes the channel.
                drop(completer);
                match rx.await {
                    Ok(result) => result,
                    Err(_) => Err(no_result()),
                }
            }
        }
    }
}

fn no_result() -> ServiceError {
    ServiceError::internal("handler returned no result")
}
