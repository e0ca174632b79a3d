//! cirrus-router — REST-style sub-router for HTTP-shaped triggers.
//!
//! Sits behind the dispatcher's `Web` registration: decodes the resource
//! triple out of a gateway trigger, routes it through per-resource decoders
//! to the next handler, and renders every outcome as a gateway response
//! with permissive CORS. Context packing covers both direct callers and
//! protocol re-entry.

pub mod response;
pub mod router;

pub use router::{NextDecoder, NextHandler, WebRouter};
