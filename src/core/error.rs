use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required key {var} missing value")]
    Missing { var: &'static str },

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to decode cache-control rules: {0}")]
    InvalidRules(#[source] serde_json::Error),

    #[error(r#"invalid UPLOAD_DRIVER {driver:?}, valid options are "s3" and "mediastore""#)]
    InvalidDriver { driver: String },

    #[error("failed to read config file {path}: {reason}")]
    File { path: String, reason: String },
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors originating from an object store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to initialize {driver} backend: {reason}")]
    Init { driver: &'static str, reason: String },

    #[error("upload failed for path {path}: {reason}")]
    Upload { path: String, reason: String },

    #[error("delete failed for path {path}: {reason}")]
    Delete { path: String, reason: String },

    #[error("request cancelled for path {path}")]
    Cancelled { path: String },

    #[error("failed to read request body: {0}")]
    Body(#[from] std::io::Error),
}

impl StoreError {
    /// Operation label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Init { .. } => "init",
            StoreError::Upload { .. } => "upload",
            StoreError::Delete { .. } => "delete",
            StoreError::Cancelled { .. } => "cancelled",
            StoreError::Body(_) => "body",
        }
    }

    /// Failure text returned to the client: the backend's own message,
    /// without the path context carried by `Display`.
    pub fn message(&self) -> String {
        match self {
            StoreError::Init { reason, .. }
            | StoreError::Upload { reason, .. }
            | StoreError::Delete { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
