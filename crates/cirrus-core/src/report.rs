//! Error-reporting collaborator contract.
//!
//! Reporting is opt-in and strictly additive: a reporter failure must never
//! replace the business error it was reporting.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::context::Context;
use crate::error::ServiceError;

/// Forwards a failed call's error and surroundings to an external sink.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(
        &self,
        error: &ServiceError,
        context: Option<&Context>,
        event: Option<&Value>,
        data: Option<&Value>,
    ) -> anyhow::Result<()>;
}

/// Best-effort report. The reporter's own failure is logged at `warn` and
/// swallowed.
pub async fn report_quietly(
    reporter: &dyn ErrorReporter,
    error: &ServiceError,
    context: Option<&Context>,
    event: Option<&Value>,
    data: Option<&Value>,
) {
    if let Err(report_err) = reporter.report(error, context, event, data).await {
        warn!(original = %error, "error report failed: {report_err}");
    }
}
