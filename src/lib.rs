pub mod config;
pub mod error;
pub mod events;
pub mod modules;
pub mod pipeline;
pub mod security;
pub mod utils;

pub use config::ServiceOptions;
pub use error::{ClassifiedError, ErrorKind};
pub use events::{ErrorEvent, EventBus};
pub use pipeline::descriptor::{EncryptionMethod, EncryptionSpec, RequestDescriptor};
pub use pipeline::module::RequestModule;
pub use pipeline::ApiService;
pub use security::token_store::{InMemoryTokenStore, TokenStorage};

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
