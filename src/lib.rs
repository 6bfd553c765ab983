pub mod api;
pub mod core;
pub mod observability;
pub mod storage;
