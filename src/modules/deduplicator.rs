use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClassifiedError;
use crate::pipeline::descriptor::{Outcome, RequestDescriptor};
use crate::pipeline::module::RequestModule;

#[derive(Debug, Clone)]
struct PendingEntry {
    id: Uuid,
    cancel: CancellationToken,
}

/// Prevents two identical requests from being in flight at once.
///
/// Policy: last-write-wins. A new request with the same fingerprint cancels
/// the in-flight one and takes its place. The superseded caller observes a
/// `Cancelled` error. Entry removal is guarded by descriptor identity so the
/// superseded request's completion cannot drop the live entry.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    pending: Arc<Mutex<HashMap<String, PendingEntry>>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait]
impl RequestModule for Deduplicator {
    fn name(&self) -> &'static str {
        "deduplicator"
    }

    async fn on_request(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<Outcome, ClassifiedError> {
        let key = descriptor.fingerprint();
        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.get(&key) {
            debug!(key = %key, "superseding in-flight request");
            previous.cancel.cancel();
        }
        pending.insert(
            key,
            PendingEntry {
                id: descriptor.id,
                cancel: descriptor.cancel.clone(),
            },
        );
        Ok(Outcome::Proceed)
    }

    async fn on_completed(&self, descriptor: &RequestDescriptor) {
        let key = descriptor.fingerprint();
        let mut pending = self.pending.lock().await;
        if pending.get(&key).map_or(false, |entry| entry.id == descriptor.id) {
            pending.remove(&key);
        }
    }
}
