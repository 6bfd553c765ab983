use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cache_control::CacheControlRules;
use super::error::ConfigError;
use super::redact::Redacted;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
    pub cache_control: CacheControlRules,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub healthcheck_path: String,
    /// Port for the Prometheus exporter. `None` disables it.
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            healthcheck_path: "/healthcheck".to_string(),
            metrics_port: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub driver: UploadDriver,
    /// S3 bucket, or MediaStore container name.
    pub bucket: String,
    pub region: String,
    /// Resolve credentials from the ambient AWS provider chain.
    pub implicit_auth: bool,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: Redacted<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: UploadDriver::S3,
            bucket: String::new(),
            region: String::new(),
            implicit_auth: true,
            endpoint: None,
            access_key_id: String::new(),
            secret_access_key: Redacted::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// `text` or `json`.
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            log_format: "text".to_string(),
        }
    }
}

/// Object store driver selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadDriver {
    #[default]
    S3,
    MediaStore,
}

impl UploadDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadDriver::S3 => "s3",
            UploadDriver::MediaStore => "mediastore",
        }
    }
}

impl fmt::Display for UploadDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadDriver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(UploadDriver::S3),
            "mediastore" => Ok(UploadDriver::MediaStore),
            other => Err(ConfigError::InvalidDriver {
                driver: other.to_string(),
            }),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered overrides:
    /// 1. built-in defaults
    /// 2. TOML file named by `CONFIG_FILE`, if set
    /// 3. environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CONFIG_FILE") {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a validated configuration from defaults plus the variables
    /// returned by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Overlay environment variables. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.is_empty());

        if let Some(v) = get("BUCKET_NAME") {
            self.storage.bucket = v;
        }
        if let Some(v) = get("S3_REGION") {
            self.storage.region = v;
        }
        if let Some(v) = get("S3_IS_IMPLICIT_AUTH") {
            self.storage.implicit_auth = parse_bool("S3_IS_IMPLICIT_AUTH", &v)?;
        }
        if let Some(v) = get("S3_ENDPOINT") {
            self.storage.endpoint = Some(v);
        }
        if let Some(v) = get("S3_ACCESS_KEY_ID") {
            self.storage.access_key_id = v;
        }
        if let Some(v) = get("S3_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Redacted::new(v);
        }
        if let Some(v) = get("UPLOAD_DRIVER") {
            self.storage.driver = v.parse()?;
        }
        if let Some(v) = get("HEALTHCHECK_PATH") {
            self.server.healthcheck_path = v;
        }
        if let Some(v) = get("HTTP_PORT") {
            self.server.port = parse_port("HTTP_PORT", &v)?;
        }
        if let Some(v) = get("METRICS_PORT") {
            self.server.metrics_port = Some(parse_port("METRICS_PORT", &v)?);
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.observability.log_level = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.observability.log_format = v;
        }
        if let Some(v) = get("CACHE_CONTROL_RULES") {
            self.cache_control = CacheControlRules::from_json(&v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.is_empty() {
            return Err(ConfigError::Missing { var: "BUCKET_NAME" });
        }
        if self.storage.region.is_empty() {
            return Err(ConfigError::Missing { var: "S3_REGION" });
        }
        if self.storage.driver == UploadDriver::S3
            && !self.storage.implicit_auth
            && self.storage.endpoint.is_none()
        {
            return Err(ConfigError::Missing { var: "S3_ENDPOINT" });
        }
        validate_healthcheck_path(&self.server.healthcheck_path)?;
        Ok(())
    }
}

/// The health check path is registered as a literal route, so it must be
/// absolute and free of route syntax.
fn validate_healthcheck_path(path: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        var: "HEALTHCHECK_PATH",
        value: path.to_string(),
        reason: reason.to_string(),
    };
    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path.contains(['{', '}', '*']) {
        return Err(invalid("must not contain '{', '}' or '*'"));
    }
    if path.split('/').any(|segment| segment.starts_with(':')) {
        return Err(invalid("segments must not start with ':'"));
    }
    Ok(())
}

/// Accepts `1`, `t`, `true` (any of `true`/`TRUE`/`True`) and the matching false forms.
fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use crate::core::cache_control::CacheControlRule;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [("BUCKET_NAME", "media"), ("S3_REGION", "us-east-1")];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.server.port, 80);
        assert_eq!(config.server.healthcheck_path, "/healthcheck");
        assert_eq!(config.server.metrics_port, None);
        assert_eq!(config.storage.driver, UploadDriver::S3);
        assert!(config.storage.implicit_auth);
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.cache_control.is_empty());
    }

    #[test]
    fn test_missing_bucket() {
        let err = AppConfig::from_lookup(lookup(&[("S3_REGION", "us-east-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "BUCKET_NAME" }));
    }

    #[test]
    fn test_missing_region() {
        let err = AppConfig::from_lookup(lookup(&[("BUCKET_NAME", "media")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "S3_REGION" }));
    }

    #[test]
    fn test_cache_control_rules_loaded_from_env() {
        let mut vars = REQUIRED.to_vec();
        vars.push((
            "CACHE_CONTROL_RULES",
            r#"[{"ext":".mp4","maxAge":123456},{"ext":".html","maxAge":60}]"#,
        ));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.cache_control.rules(),
            &[
                CacheControlRule::new(".mp4", 123456),
                CacheControlRule::new(".html", 60),
            ]
        );
    }

    #[test]
    fn test_cache_control_rules_invalid_json() {
        let mut vars = REQUIRED.to_vec();
        vars.push((
            "CACHE_CONTROL_RULES",
            r#"[{"ext":".mp4","maxAge":123456},{"ext":".html","#,
        ));
        let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRules(_)));
    }

    #[test]
    fn test_invalid_driver() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("UPLOAD_DRIVER", "gcs"));
        let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDriver { .. }));
    }

    #[test]
    fn test_mediastore_driver() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("UPLOAD_DRIVER", "mediastore"));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.storage.driver, UploadDriver::MediaStore);
    }

    #[test]
    fn test_explicit_auth_requires_endpoint() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("S3_IS_IMPLICIT_AUTH", "false"));
        let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { var: "S3_ENDPOINT" }));

        vars.push(("S3_ENDPOINT", "localhost:4569"));
        vars.push(("S3_ACCESS_KEY_ID", "S3RVER"));
        vars.push(("S3_SECRET_ACCESS_KEY", "S3RVER"));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert!(!config.storage.implicit_auth);
        assert_eq!(config.storage.endpoint.as_deref(), Some("localhost:4569"));
        assert_eq!(config.storage.secret_access_key.expose(), "S3RVER");
    }

    #[test]
    fn test_invalid_bool_and_port() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("S3_IS_IMPLICIT_AUTH", "yes"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::InvalidValue {
                var: "S3_IS_IMPLICIT_AUTH",
                ..
            }
        ));

        let mut vars = REQUIRED.to_vec();
        vars.push(("HTTP_PORT", "70000"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::InvalidValue {
                var: "HTTP_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_healthcheck_path_must_be_absolute() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("HEALTHCHECK_PATH", "health"));
        let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "HEALTHCHECK_PATH",
                ..
            }
        ));
    }

    #[test]
    fn test_healthcheck_path_rejects_route_syntax() {
        for path in ["/health/{id}", "/health/*rest", "/{", "/health/:id"] {
            let mut vars = REQUIRED.to_vec();
            vars.push(("HEALTHCHECK_PATH", path));
            let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(
                    err,
                    ConfigError::InvalidValue {
                        var: "HEALTHCHECK_PATH",
                        ..
                    }
                ),
                "{path}"
            );
        }

        let mut vars = REQUIRED.to_vec();
        vars.push(("HEALTHCHECK_PATH", "/internal/health-check"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_ok());
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("S3_SECRET_ACCESS_KEY", "wJalrXUtnFEMI"));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("wJalrXUtnFEMI"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[storage]
bucket = "from-file"
region = "eu-west-1"

[[cache_control]]
ext = ".css"
maxAge = 300
"#
        )
        .unwrap();

        let mut config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.healthcheck_path, "/healthcheck");
        assert_eq!(
            config.cache_control.header_value("site.css").as_deref(),
            Some("max-age=300")
        );

        config
            .apply_env(lookup(&[("BUCKET_NAME", "from-env")]))
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.storage.bucket, "from-env");
        assert_eq!(config.storage.region, "eu-west-1");
    }

    #[test]
    fn test_unreadable_file() {
        let err = AppConfig::from_file(Path::new("/nonexistent/upload-proxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }
}
