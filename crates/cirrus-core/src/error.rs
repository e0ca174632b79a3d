//! The tagged service error and the structured-string convention.
//!
//! Every failure on the dispatch path is a `ServiceError { kind, status,
//! message }`. The message carries the legacy wire convention of a
//! three-digit status plus uppercase reason phrase, with an optional
//! detail (`"404 NOT FOUND - id:123"`). Internally callers match on `kind`
//! and `status`; the string form only matters at transport boundaries,
//! where `Display` emits it and [`ServiceError::from_message`] recovers it.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Result type alias for dispatch-path operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Leading `<code> <UPPERCASE REASON>` of a structured error message.
static STATUS_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([1-9][0-9]{2}) ([A-Z][A-Z ]*)").expect("status prefix regex"));

/// Failure taxonomy for the dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Resource or route does not exist (404-prefixed).
    NotFound,
    /// Forwarded context failed validation (400-prefixed).
    InvalidContext,
    /// Malformed or unacceptable request (400-prefixed).
    InvalidRequest,
    /// No handler registered for an event kind (400 UNKNOWN).
    UnknownEvent,
    /// A protocol call returned a non-2xx envelope.
    Upstream,
    /// A transport collaborator (SDK) failed.
    Transport,
    /// Infrastructure failure inside the core itself.
    Internal,
}

/// Error carried through the dispatch path.
///
/// Constructed via the named constructors so that `status` and `message`
/// always agree. `Display` renders the wire string unchanged, which is how
/// an upstream's structured message survives a protocol hop byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceError {
    kind: ErrorKind,
    status: u16,
    message: String,
}

impl ServiceError {
    fn tagged(kind: ErrorKind, status: u16, reason: &str, detail: &str) -> Self {
        let message = if detail.is_empty() {
            format!("{status} {reason}")
        } else {
            format!("{status} {reason} - {detail}")
        };
        Self { kind, status, message }
    }

    /// `"404 NOT FOUND - <detail>"`.
    pub fn not_found(detail: impl AsRef<str>) -> Self {
        Self::tagged(ErrorKind::NotFound, 404, "NOT FOUND", detail.as_ref())
    }

    /// `"400 INVALID CONTEXT - <detail>"`.
    pub fn invalid_context(detail: impl AsRef<str>) -> Self {
        Self::tagged(ErrorKind::InvalidContext, 400, "INVALID CONTEXT", detail.as_ref())
    }

    /// `"400 INVALID REQUEST - <detail>"`.
    pub fn invalid_request(detail: impl AsRef<str>) -> Self {
        Self::tagged(ErrorKind::InvalidRequest, 400, "INVALID REQUEST", detail.as_ref())
    }

    /// `"400 UNKNOWN - service:<kind>"` when no handler is registered.
    pub fn unknown_event(kind: impl std::fmt::Display) -> Self {
        Self::tagged(ErrorKind::UnknownEvent, 400, "UNKNOWN", &format!("service:{kind}"))
    }

    /// `"500 INTERNAL - <detail>"`.
    pub fn internal(detail: impl AsRef<str>) -> Self {
        Self::tagged(ErrorKind::Internal, 500, "INTERNAL", detail.as_ref())
    }

    /// Non-2xx protocol response; the message crosses the hop unchanged.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Upstream, status, message: message.into() }
    }

    /// Collaborator (SDK) failure. The message is whatever the transport
    /// produced and need not follow the structured convention.
    pub fn transport(source: impl std::fmt::Display) -> Self {
        Self { kind: ErrorKind::Transport, status: 503, message: source.to_string() }
    }

    /// Rebuild a `ServiceError` from a wire message, recovering status and
    /// kind from the structured prefix when one is present. Unstructured
    /// messages come back as 503 transport errors.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        match parse_structured(&message) {
            Some((status, reason)) => Self { kind: kind_for(status, &reason), status, message },
            None => Self { kind: ErrorKind::Transport, status: 503, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Parse the leading three-digit status of a structured message, if any.
pub fn parse_status_prefix(message: &str) -> Option<u16> {
    parse_structured(message).map(|(status, _)| status)
}

fn parse_structured(message: &str) -> Option<(u16, String)> {
    let caps = STATUS_PREFIX.captures(message)?;
    let status = caps.get(1)?.as_str().parse().ok()?;
    let reason = caps.get(2)?.as_str().trim_end().to_string();
    Some((status, reason))
}

fn kind_for(status: u16, reason: &str) -> ErrorKind {
    match reason {
        "NOT FOUND" => ErrorKind::NotFound,
        "INVALID CONTEXT" => ErrorKind::InvalidContext,
        "INVALID REQUEST" => ErrorKind::InvalidRequest,
        "UNKNOWN" => ErrorKind::UnknownEvent,
        "INTERNAL" => ErrorKind::Internal,
        _ => match status {
            404 => ErrorKind::NotFound,
            400 => ErrorKind::InvalidRequest,
            _ => ErrorKind::Upstream,
        },
    }
}
