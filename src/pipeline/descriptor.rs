use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    Aes,
    /// Declared in the surface; payloads pass through unchanged.
    Rsa,
}

/// How an outgoing payload is encrypted. `whole_message` takes precedence
/// over `fields`; with neither set the payload passes through unchanged.
#[derive(Debug, Clone)]
pub struct EncryptionSpec {
    pub method: EncryptionMethod,
    pub whole_message: bool,
    pub fields: Vec<String>,
}

impl EncryptionSpec {
    pub fn whole(method: EncryptionMethod) -> Self {
        Self {
            method,
            whole_message: true,
            fields: Vec::new(),
        }
    }

    pub fn fields<I, S>(method: EncryptionMethod, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            whole_message: false,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// The logical representation of one outgoing HTTP call as it travels the
/// module chain. Modules mutate it in place during the outgoing pass.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub id: Uuid,
    pub method: Method,
    /// Path relative to the service base URL.
    pub url: String,
    pub headers: HeaderMap,
    pub params: Option<Value>,
    pub body: Option<Value>,
    pub cache: bool,
    pub encryption: Option<EncryptionSpec>,
    pub cancel: CancellationToken,
    /// Body snapshot taken before any module mutates it; fingerprints derive
    /// from this so encryption never changes a request's identity.
    pub(crate) meta_body: Option<Value>,
    pub(crate) retried: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            params: None,
            body: None,
            cache: false,
            encryption: None,
            cancel: CancellationToken::new(),
            meta_body: None,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn with_encryption(mut self, spec: EncryptionSpec) -> Self {
        self.encryption = Some(spec);
        self
    }

    /// Handle callers keep to cancel the request while it is in flight.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn snapshot_body(&mut self) {
        if self.meta_body.is_none() {
            self.meta_body = self.body.clone();
        }
    }

    /// Stable key identifying this request for dedup and cache purposes.
    pub fn fingerprint(&self) -> String {
        key::request_key(
            &self.url,
            self.params.as_ref(),
            self.meta_body.as_ref().or(self.body.as_ref()),
        )
    }
}

/// Response as seen by the incoming pass.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub body: Value,
}

/// Result of one module's outgoing hook: continue the pass, or resolve the
/// request right here without a transport call (e.g. cache hit). A dedicated
/// variant rather than the error channel, so genuine failures stay failures.
#[derive(Debug)]
pub enum Outcome {
    Proceed,
    ShortCircuit(Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_uses_pre_mutation_snapshot() {
        let mut descriptor = RequestDescriptor::post("/login").with_body(json!({"password": "hunter2"}));
        descriptor.snapshot_body();
        let before = descriptor.fingerprint();

        // simulate a module mutating the outgoing payload
        descriptor.body = Some(json!({"password": "AES:deadbeef"}));
        assert_eq!(descriptor.fingerprint(), before);
    }

    #[test]
    fn test_fingerprint_falls_back_to_body_without_snapshot() {
        let a = RequestDescriptor::post("/login").with_body(json!({"user": "alice"}));
        let b = RequestDescriptor::post("/login").with_body(json!({"user": "bob"}));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_descriptors_share_identity_only_by_payload() {
        let a = RequestDescriptor::get("/users").with_params(json!({"page": 1}));
        let b = RequestDescriptor::get("/users").with_params(json!({"page": 1}));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.id, b.id);
    }
}
