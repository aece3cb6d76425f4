pub mod auth;
pub mod cache;
pub mod concurrency;
pub mod deduplicator;
pub mod encryption;
pub mod error_forwarder;

pub use auth::AuthManager;
pub use cache::CacheModule;
pub use concurrency::ConcurrencyGate;
pub use deduplicator::Deduplicator;
pub use encryption::EncryptionModule;
pub use error_forwarder::ErrorForwarder;
