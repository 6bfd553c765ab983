pub mod cache_control;
pub mod config;
pub mod error;
pub mod redact;
pub mod shutdown;
