//! The call parameter a protocol caller produces and a transformer consumes.

use cirrus_core::context::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Target and payload of one protocol call.
///
/// Rides broker message bodies as-is, so field names follow the wire
/// convention; unknown fields (such as a `callback` address) are ignored
/// on decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolParam {
    /// Target service name; `None` or `"self"` targets the caller's own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Resource type, the first path segment.
    #[serde(rename = "type")]
    pub resource: String,
    /// REST mode on the receiving side: `LIST` or the request method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// Query map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub context: Context,
}

impl ProtocolParam {
    pub fn new(resource: impl Into<String>, context: Context) -> Self {
        Self { resource: resource.into(), context, ..Self::default() }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    pub fn with_param(mut self, param: Map<String, Value>) -> Self {
        self.param = Some(param);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}
