use async_trait::async_trait;

use super::descriptor::{Outcome, RequestDescriptor, ResponseEnvelope};
use crate::error::ClassifiedError;

/// Capability interface implemented by every pipeline stage. The orchestrator
/// calls the hooks in registration order for the outgoing and incoming passes
/// and unconditionally for the completion pass; stages omit hooks they do not
/// need via the default no-ops.
#[async_trait]
pub trait RequestModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Outgoing pass. May mutate the descriptor, short-circuit the request
    /// with a ready value, or reject it with a classified error.
    async fn on_request(
        &self,
        _descriptor: &mut RequestDescriptor,
    ) -> Result<Outcome, ClassifiedError> {
        Ok(Outcome::Proceed)
    }

    /// Incoming pass, in the same order as the outgoing pass.
    async fn on_response(
        &self,
        _descriptor: &RequestDescriptor,
        _response: &mut ResponseEnvelope,
    ) -> Result<(), ClassifiedError> {
        Ok(())
    }

    /// Notification of a terminal error. Fired at most once per request.
    async fn on_error(&self, _error: &ClassifiedError, _descriptor: Option<&RequestDescriptor>) {}

    /// Completion pass: fires exactly once per request on success, error and
    /// cancellation alike. Cleanup (pending entries, admission slots) lives here.
    async fn on_completed(&self, _descriptor: &RequestDescriptor) {}
}
