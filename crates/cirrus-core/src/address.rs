//! Canonical service addresses: `<protocol>://<accountId?>@<host><path>`.
//!
//! Addresses are derived per call from a target description plus the ambient
//! [`ServiceConfig`] and never persisted. Host derivation encodes the
//! deployment naming scheme; the path is the percent-encoded resource
//! triple `/type[/id[/cmd]]`.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;
use url::Url;

use crate::config::{ServiceConfig, Stage};

/// Standard suffix of deployed service names, stripped before host naming.
const STANDARD_SUFFIX: &str = "-api";

/// RFC 2396 unreserved marks stay literal; everything else non-alphanumeric
/// is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("address has no host: {0}")]
    MissingHost(String),
    #[error("invalid address: {0}")]
    Parse(#[from] url::ParseError),
}

/// Wire transport of a protocol call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Web,
    Pubsub,
    Queue,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Web => "web",
            Protocol::Pubsub => "pubsub",
            Protocol::Queue => "queue",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Protocol::Web),
            "pubsub" => Ok(Protocol::Pubsub),
            "queue" => Ok(Protocol::Queue),
            other => Err(AddressError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// A fully-derived canonical address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub protocol: Protocol,
    /// Caller account, diagnostic only.
    pub account_id: Option<String>,
    pub host: String,
    /// Percent-encoded, always starting with `/`.
    pub path: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.protocol)?;
        if let Some(account) = &self.account_id {
            write!(f, "{account}@")?;
        }
        write!(f, "{}{}", self.host, self.path)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s)?;
        let protocol = url.scheme().parse()?;
        let host = url
            .host_str()
            .ok_or_else(|| AddressError::MissingHost(s.to_string()))?
            .to_string();
        let account_id = match url.username() {
            "" => None,
            user => Some(user.to_string()),
        };
        Ok(Self { protocol, account_id, host, path: url.path().to_string() })
    }
}

/// Target description an address is derived from.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressSpec<'a> {
    /// Target service name; `None`, empty, or `"self"` means the caller's own.
    pub service: Option<&'a str>,
    pub stage: Option<&'a str>,
    /// Resource type, the first path segment.
    pub resource: &'a str,
    pub id: Option<&'a str>,
    pub cmd: Option<&'a str>,
    pub account_id: Option<&'a str>,
}

/// Derive the canonical address for a call.
pub fn as_address(protocol: Protocol, spec: &AddressSpec<'_>, config: &ServiceConfig) -> Address {
    let service = match spec.service {
        Some(s) if !s.is_empty() && s != "self" => s,
        _ => config.service.as_str(),
    };
    let stage = spec.stage.map(Stage::parse_lenient).unwrap_or(config.stage);
    Address {
        protocol,
        account_id: spec.account_id.map(str::to_string),
        host: derive_host(protocol, service, stage, config.function_name()),
        path: as_path(spec.resource, spec.id, spec.cmd),
    }
}

/// Host naming rule. The standard `-api` suffix is replaced by a transport
/// token for broker protocols and dropped for the web protocol, whose host
/// instead carries a stage/function postfix naming the invocation target.
pub fn derive_host(protocol: Protocol, service: &str, stage: Stage, function: &str) -> String {
    let prod = stage.is_prod();
    let mut host = match (protocol, service.strip_suffix(STANDARD_SUFFIX)) {
        (Protocol::Pubsub | Protocol::Queue, Some(base)) => {
            if prod {
                format!("{base}-{protocol}")
            } else {
                format!("{base}-{protocol}-dev")
            }
        }
        (Protocol::Web, Some(base)) => {
            if prod {
                base.to_string()
            } else {
                format!("{base}-dev")
            }
        }
        (_, None) => {
            if prod {
                service.to_string()
            } else {
                format!("{service}-dev")
            }
        }
    };
    if protocol == Protocol::Web {
        if prod {
            host.push_str("-prod-");
        } else {
            host.push('-');
        }
        host.push_str(function);
    }
    host
}

/// Percent-encoded `/type[/id[/cmd]]`. An absent `id` with a present `cmd`
/// keeps an empty id segment so the cmd position stays stable.
pub fn as_path(resource: &str, id: Option<&str>, cmd: Option<&str>) -> String {
    let id = id.filter(|s| !s.is_empty());
    let cmd = cmd.filter(|s| !s.is_empty());
    let mut path = format!("/{}", encode_segment(resource));
    match (id, cmd) {
        (Some(id), Some(cmd)) => {
            path.push('/');
            path.push_str(&encode_segment(id));
            path.push('/');
            path.push_str(&encode_segment(cmd));
        }
        (Some(id), None) => {
            path.push('/');
            path.push_str(&encode_segment(id));
        }
        (None, Some(cmd)) => {
            path.push_str("//");
            path.push_str(&encode_segment(cmd));
        }
        (None, None) => {}
    }
    path
}

pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

pub fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
