//! cirrus-dispatch — trigger classification and handler dispatch.
//!
//! One shared entrypoint receives every trigger a deployed function can
//! see. The classifier tags the payload by shape, the dispatcher routes it
//! to the handler registered for that kind, and the two adapters normalize
//! the handler styles business code is written in.

pub mod batch;
pub mod classify;
pub mod dispatcher;
pub mod handler;

pub use batch::run_bounded;
pub use classify::classify;
pub use dispatcher::Dispatcher;
pub use handler::{
    Completer, EventService, FunctionAdapter, HandlerFn, ServiceAdapter, TriggerHandler,
};
