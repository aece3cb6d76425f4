pub mod logging;
pub mod lru;
