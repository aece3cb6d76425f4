pub mod descriptor;
pub mod key;
pub mod module;

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::debug;

use crate::config::ServiceOptions;
use crate::error::{ClassifiedError, ErrorKind};
use crate::events::EventBus;
use crate::modules::{
    AuthManager, CacheModule, ConcurrencyGate, Deduplicator, EncryptionModule, ErrorForwarder,
};
use crate::security::token_store::TokenStorage;

use self::descriptor::{Outcome, RequestDescriptor, ResponseEnvelope};
use self::module::RequestModule;

/// Drives the module chain around one `reqwest` client: an outgoing pass in
/// registration order, the transport call (unless short-circuited), an
/// incoming pass in the same order, and a completion pass that always runs.
/// One service per application; call sites hold it by reference.
pub struct ApiService {
    http: reqwest::Client,
    base_url: String,
    modules: Vec<Arc<dyn RequestModule>>,
    auth: Option<Arc<AuthManager>>,
    events: EventBus,
}

impl ApiService {
    /// Build the default chain: dedup and admission ahead of cache,
    /// encryption and auth, so a superseded or throttled request never
    /// reaches the network; the error forwarder last.
    pub fn new(
        options: ServiceOptions,
        storage: Arc<dyn TokenStorage>,
    ) -> Result<Self, ClassifiedError> {
        let http = build_client(&options)?;
        let events = EventBus::new(options.event_capacity);
        let auth = Arc::new(AuthManager::new(storage, http.clone(), options.refresh_url()));

        let mut gate = ConcurrencyGate::new(options.max_concurrent);
        if let Some(limit) = options.queue_limit {
            gate = gate.with_queue_limit(limit);
        }

        let mut modules: Vec<Arc<dyn RequestModule>> = vec![
            Arc::new(Deduplicator::new()),
            Arc::new(gate),
            Arc::new(CacheModule::new(options.cache_capacity, options.cache_ttl())),
        ];
        if let Some(secret) = options.encryption_secret.as_deref() {
            modules.push(Arc::new(EncryptionModule::new(secret)));
        }
        modules.push(auth.clone());
        modules.push(Arc::new(ErrorForwarder::new(events.clone())));

        Ok(Self {
            http,
            base_url: options.base_url,
            modules,
            auth: Some(auth),
            events,
        })
    }

    /// Build a service around a custom chain. `auth` enables 401-refresh
    /// recovery and is normally the same instance installed in `modules`.
    pub fn with_modules(
        options: &ServiceOptions,
        events: EventBus,
        modules: Vec<Arc<dyn RequestModule>>,
        auth: Option<Arc<AuthManager>>,
    ) -> Result<Self, ClassifiedError> {
        Ok(Self {
            http: build_client(options)?,
            base_url: options.base_url.clone(),
            modules,
            auth,
            events,
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn auth(&self) -> Option<&Arc<AuthManager>> {
        self.auth.as_ref()
    }

    pub async fn get(&self, url: &str) -> Result<Value, ClassifiedError> {
        self.request(RequestDescriptor::get(url)).await
    }

    pub async fn post(&self, url: &str, body: Value) -> Result<Value, ClassifiedError> {
        self.request(RequestDescriptor::post(url).with_body(body)).await
    }

    /// Run one logical request through the pipeline.
    pub async fn request(
        &self,
        mut descriptor: RequestDescriptor,
    ) -> Result<Value, ClassifiedError> {
        descriptor.snapshot_body();
        let result = self.drive(&mut descriptor).await;
        self.run_completed(&descriptor).await;
        match result {
            Ok(value) => Ok(value),
            Err(error) => {
                self.run_error(&error, &descriptor).await;
                Err(error)
            }
        }
    }

    async fn drive(&self, descriptor: &mut RequestDescriptor) -> Result<Value, ClassifiedError> {
        for module in &self.modules {
            match module.on_request(descriptor).await? {
                Outcome::Proceed => {}
                Outcome::ShortCircuit(value) => {
                    debug!(module = module.name(), url = %descriptor.url, "request short-circuited");
                    return Ok(value);
                }
            }
        }

        let mut envelope = match self.dispatch(descriptor).await {
            Err(error)
                if error.kind() == ErrorKind::Auth
                    && error.status() == Some(401)
                    && !descriptor.retried =>
            {
                self.retry_unauthorized(descriptor, error).await?
            }
            other => other?,
        };

        for module in &self.modules {
            module.on_response(descriptor, &mut envelope).await?;
        }
        Ok(envelope.body)
    }

    /// Bounded 401 recovery: one coordinated refresh, one redispatch. A
    /// second rejection is terminal because `retried` is already set.
    async fn retry_unauthorized(
        &self,
        descriptor: &mut RequestDescriptor,
        original: ClassifiedError,
    ) -> Result<ResponseEnvelope, ClassifiedError> {
        let Some(auth) = self.auth.as_ref() else {
            return Err(original);
        };
        descriptor.retried = true;
        let token = auth.refresh_after_unauthorized().await?;
        let header = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClassifiedError::auth("token contains invalid header characters"))?;
        descriptor.headers.insert(AUTHORIZATION, header);
        debug!(url = %descriptor.url, "retrying request after token refresh");
        self.dispatch(descriptor).await
    }

    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResponseEnvelope, ClassifiedError> {
        let url = format!("{}{}", self.base_url, descriptor.url);
        let mut request = self
            .http
            .request(descriptor.method.clone(), &url)
            .headers(descriptor.headers.clone());
        if let Some(params) = &descriptor.params {
            request = request.query(params);
        }
        if let Some(body) = &descriptor.body {
            request = request.json(body);
        }

        debug!(method = %descriptor.method, url = %url, "dispatching request");
        let send = request.send();
        let response = tokio::select! {
            _ = descriptor.cancel.cancelled() => {
                debug!(url = %descriptor.url, "request cancelled in flight");
                return Err(ClassifiedError::cancelled(&descriptor.url));
            }
            result = send => result.map_err(|e| ClassifiedError::from_reqwest(&descriptor.url, &e))?,
        };

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ClassifiedError::from_reqwest(&descriptor.url, &e))?;
        let body: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if let Some(error) = ClassifiedError::from_status(&descriptor.url, status, &body) {
            return Err(error);
        }
        Ok(ResponseEnvelope { status, body })
    }

    async fn run_completed(&self, descriptor: &RequestDescriptor) {
        for module in &self.modules {
            module.on_completed(descriptor).await;
        }
    }

    async fn run_error(&self, error: &ClassifiedError, descriptor: &RequestDescriptor) {
        for module in &self.modules {
            module.on_error(error, Some(descriptor)).await;
        }
    }
}

fn build_client(options: &ServiceOptions) -> Result<reqwest::Client, ClassifiedError> {
    reqwest::Client::builder()
        .timeout(options.timeout())
        .build()
        .map_err(|e| ClassifiedError::new(ErrorKind::Unknown, format!("building http client: {e}")))
}
