use serde_json::Value;
use thiserror::Error;

/// Fixed classification for every failure crossing the pipeline boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Admission limit reached and the wait queue is full.
    Concurrent,
    /// Missing, rejected or unrefreshable credential.
    Auth,
    /// Transport-level failure (connect, DNS, broken pipe).
    Network,
    Timeout,
    /// Non-success application status code.
    Business,
    Validation,
    /// Rejected because an identical request is already in flight.
    Duplicate,
    Cancelled,
    Cache,
    Encryption,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Concurrent => "concurrent",
            ErrorKind::Auth => "auth",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Business => "business",
            ErrorKind::Validation => "validation",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Cache => "cache",
            ErrorKind::Encryption => "encryption",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Named notification channel this kind is forwarded on.
    pub fn channel(&self) -> &'static str {
        match self {
            ErrorKind::Concurrent => "API:CONCURRENT_ERROR",
            ErrorKind::Auth => "API:UN_AUTH",
            ErrorKind::Network => "API:NETWORK_ERROR",
            ErrorKind::Timeout => "API:TIMEOUT_ERROR",
            ErrorKind::Business => "API:BUSINESS_ERROR",
            ErrorKind::Validation => "API:VALIDATION_ERROR",
            ErrorKind::Duplicate => "API:DUPLICATE_ERROR",
            ErrorKind::Cancelled => "API:CANCELLED",
            ErrorKind::Cache => "API:CACHE_ERROR",
            ErrorKind::Encryption => "API:ENCRYPTION_ERROR",
            ErrorKind::Unknown => "API:UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sole error type returned to pipeline callers. Immutable once built.
#[derive(Debug, Clone, Error)]
#[error("[{kind}] {message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    data: Option<Value>,
    url: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            data: None,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn encryption(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Encryption, message)
    }

    pub fn cancelled(url: &str) -> Self {
        Self::new(ErrorKind::Cancelled, "request cancelled").with_url(url)
    }

    pub fn duplicate(url: &str) -> Self {
        Self::new(ErrorKind::Duplicate, "identical request already in flight").with_url(url)
    }

    pub fn concurrent(url: &str) -> Self {
        Self::new(ErrorKind::Concurrent, "admission queue full").with_url(url)
    }

    /// Classify a transport error at the boundary where it occurred.
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Network
        };
        Self::new(kind, error.to_string()).with_url(url)
    }

    /// Classify an HTTP response: status mapping first, then the application
    /// envelope (`{code, message, data}` with nonzero `code`).
    /// Returns `None` for a plain success.
    pub fn from_status(url: &str, status: u16, body: &Value) -> Option<Self> {
        if status == 401 {
            return Some(
                Self::auth("credential rejected by server")
                    .with_status(status)
                    .with_url(url),
            );
        }
        if status == 400 || status == 422 {
            return Some(
                Self::new(ErrorKind::Validation, "request failed validation")
                    .with_status(status)
                    .with_data(body.clone())
                    .with_url(url),
            );
        }
        if !(200..300).contains(&status) {
            return Some(
                Self::new(ErrorKind::Business, format!("server responded with status {status}"))
                    .with_status(status)
                    .with_data(body.clone())
                    .with_url(url),
            );
        }
        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("business error")
                    .to_string();
                let mut error = Self::new(ErrorKind::Business, message)
                    .with_status(status)
                    .with_url(url);
                if let Some(data) = body.get("data") {
                    error = error.with_data(data.clone());
                }
                return Some(error);
            }
        }
        None
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}
