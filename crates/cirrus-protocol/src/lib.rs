//! cirrus-protocol — addressed calls between deployed services.
//!
//! A caller names a peer operation with a protocol address
//! (`web://account@host/path`) and a [`ProtocolParam`]; the service picks
//! the transport, shapes the carrier event, and on the receiving side the
//! listener decodes records back into parameters. Synchronous calls go out
//! as function invocations, asynchronous ones as pub/sub or queue messages.

pub mod listener;
pub mod param;
pub mod service;
pub mod transform;
pub mod transport;

pub use listener::ProtocolListener;
pub use param::ProtocolParam;
pub use service::ProtocolService;
pub use transport::{
    AddressResolver, DELIVERY_DELAY, FunctionInvoker, ProtocolExecutor, PublishEnvelope,
    QueueSender, TopicPublisher,
};
