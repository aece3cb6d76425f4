use std::sync::{Mutex, PoisonError};

/// Access/refresh credential pair as held by a storage backend.
#[derive(Debug, Clone, Default)]
pub struct TokenPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Storage interface consumed by the auth module. Persistence strategy
/// (keyring, file, browser storage behind FFI) belongs to the embedder.
pub trait TokenStorage: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    /// Stores a new access token; the refresh token is only replaced when a
    /// new one is supplied.
    fn set_tokens(&self, access: String, refresh: Option<String>);
    fn clear_tokens(&self);
}

/// Process-local storage for tests and simple embedders.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    inner: Mutex<TokenPair>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        Self {
            inner: Mutex::new(TokenPair {
                access_token: access.map(str::to_string),
                refresh_token: refresh.map(str::to_string),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TokenPair> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStorage for InMemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.lock().refresh_token.clone()
    }

    fn set_tokens(&self, access: String, refresh: Option<String>) {
        let mut pair = self.lock();
        pair.access_token = Some(access);
        if let Some(refresh) = refresh {
            pair.refresh_token = Some(refresh);
        }
    }

    fn clear_tokens(&self) {
        let mut pair = self.lock();
        pair.access_token = None;
        pair.refresh_token = None;
    }
}
