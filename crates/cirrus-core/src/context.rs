//! Per-invocation call context.
//!
//! One `Context` is built per trigger and threaded, unchanged, through the
//! handler and any protocol calls the handler makes. Constructors cover the
//! transport origins; nothing mutates a context after it leaves one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

/// Identity and tracing data for one invocation.
///
/// Serialized as-is into the protocol-context header on outbound calls, so
/// field names follow the wire convention (camelCase, absent when unset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Context {
    /// Caller identity claims, shape owned by the identity provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Value>,
    /// Canonical address of the call origin, e.g. `web://acct@svc-dev/hello#1.2.3`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Originating domain name, when the trigger carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<HashMap<String, String>>,
    /// Hop counter carried across protocol calls for loop diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

impl Context {
    /// Context rooted at a source address; remaining fields via `with_*`.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self { source: Some(source.into()), ..Self::default() }
    }

    pub fn with_identity(mut self, identity: Value) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Cross-check this (forwarded) context against the values the trigger
    /// itself carried. Both sides absent counts as equal; any difference
    /// rejects with the trigger-side value in the detail.
    pub fn verify_forwarded(
        &self,
        account_id: Option<&str>,
        request_id: Option<&str>,
    ) -> ServiceResult<()> {
        if self.account_id.as_deref() != account_id {
            return Err(ServiceError::invalid_context(format!(
                "accountId:{}",
                account_id.unwrap_or_default()
            )));
        }
        if self.request_id.as_deref() != request_id {
            return Err(ServiceError::invalid_context(format!(
                "requestId:{}",
                request_id.unwrap_or_default()
            )));
        }
        Ok(())
    }
}
