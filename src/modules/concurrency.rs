use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::error::ClassifiedError;
use crate::pipeline::descriptor::{Outcome, RequestDescriptor};
use crate::pipeline::module::RequestModule;

#[derive(Debug, Default)]
struct GateState {
    active: usize,
    admitted: HashSet<Uuid>,
    waiters: VecDeque<(Uuid, oneshot::Sender<()>)>,
}

/// Admission control: at most `max` requests in flight, excess requests wait
/// in FIFO order. A completed request releases exactly the slot it took
/// (identity set, decrement clamped at zero), then admits the queue head.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    max: usize,
    queue_limit: Option<usize>,
    state: Arc<Mutex<GateState>>,
}

impl ConcurrencyGate {
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            queue_limit: None,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    /// Reject instead of queueing once this many requests are waiting.
    pub fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = Some(limit);
        self
    }

    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active
    }

    pub async fn queued_count(&self) -> usize {
        self.state.lock().await.waiters.len()
    }
}

#[async_trait]
impl RequestModule for ConcurrencyGate {
    fn name(&self) -> &'static str {
        "concurrency_gate"
    }

    async fn on_request(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<Outcome, ClassifiedError> {
        let rx = {
            let mut state = self.state.lock().await;
            if state.active < self.max {
                state.active += 1;
                state.admitted.insert(descriptor.id);
                return Ok(Outcome::Proceed);
            }
            if let Some(limit) = self.queue_limit {
                if state.waiters.len() >= limit {
                    return Err(ClassifiedError::concurrent(&descriptor.url));
                }
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back((descriptor.id, tx));
            rx
        };

        debug!(url = %descriptor.url, "request queued at admission gate");
        tokio::select! {
            _ = descriptor.cancel.cancelled() => {
                let mut state = self.state.lock().await;
                state.waiters.retain(|(id, _)| *id != descriptor.id);
                Err(ClassifiedError::cancelled(&descriptor.url))
            }
            admitted = rx => match admitted {
                Ok(()) => Ok(Outcome::Proceed),
                Err(_) => Err(ClassifiedError::cancelled(&descriptor.url)),
            }
        }
    }

    async fn on_completed(&self, descriptor: &RequestDescriptor) {
        let mut state = self.state.lock().await;
        if state.admitted.remove(&descriptor.id) {
            state.active = state.active.saturating_sub(1);
            // admit the queue head, skipping waiters whose request was cancelled
            while let Some((id, tx)) = state.waiters.pop_front() {
                if tx.send(()).is_ok() {
                    state.active += 1;
                    state.admitted.insert(id);
                    break;
                }
            }
        } else {
            // completed without ever being admitted (cancelled while queued)
            state.waiters.retain(|(id, _)| *id != descriptor.id);
        }
    }
}
