use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ClassifiedError;
use crate::pipeline::descriptor::{Outcome, RequestDescriptor, ResponseEnvelope};
use crate::pipeline::module::RequestModule;
use crate::utils::lru::BoundedCache;

/// Wraps the bounded LRU+TTL store as a pipeline stage: short-circuits the
/// outgoing pass on a hit, populates the store from successful responses.
/// Keys derive from the pre-mutation body snapshot, so an encrypted payload
/// caches under the same key as its plaintext form.
#[derive(Clone)]
pub struct CacheModule {
    cache: Arc<Mutex<BoundedCache>>,
}

impl CacheModule {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Arc::new(Mutex::new(BoundedCache::new(capacity, ttl))),
        }
    }

    pub async fn contains(&self, descriptor: &RequestDescriptor) -> bool {
        self.cache.lock().await.has(&descriptor.fingerprint())
    }
}

#[async_trait]
impl RequestModule for CacheModule {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn on_request(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<Outcome, ClassifiedError> {
        if !descriptor.cache {
            return Ok(Outcome::Proceed);
        }
        let key = descriptor.fingerprint();
        if let Some(value) = self.cache.lock().await.get(&key) {
            debug!(key = %key, "cache hit, short-circuiting request");
            return Ok(Outcome::ShortCircuit(value));
        }
        Ok(Outcome::Proceed)
    }

    // Only reached on a real transport response; a short-circuited request
    // skips the incoming pass, so a cached value is never re-stored.
    async fn on_response(
        &self,
        descriptor: &RequestDescriptor,
        response: &mut ResponseEnvelope,
    ) -> Result<(), ClassifiedError> {
        if descriptor.cache {
            let key = descriptor.fingerprint();
            self.cache.lock().await.put(key, response.body.clone());
        }
        Ok(())
    }
}
