use async_trait::async_trait;

use crate::error::ClassifiedError;
use crate::events::EventBus;
use crate::pipeline::descriptor::RequestDescriptor;
use crate::pipeline::module::RequestModule;

/// Terminal stage that forwards every classified error to the notification
/// surface. Forwarding only; recovery policy (retry, redirect-to-login,
/// toasts) belongs to the subscribers.
#[derive(Debug, Clone)]
pub struct ErrorForwarder {
    bus: EventBus,
}

impl ErrorForwarder {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl RequestModule for ErrorForwarder {
    fn name(&self) -> &'static str {
        "error_forwarder"
    }

    async fn on_error(&self, error: &ClassifiedError, _descriptor: Option<&RequestDescriptor>) {
        self.bus.emit(error);
    }
}
