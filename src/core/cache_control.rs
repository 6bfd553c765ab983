use serde::{Deserialize, Serialize};

use super::error::ConfigError;

// ---------------------------------------------------------------------------
// Cache-control rules
// ---------------------------------------------------------------------------

/// Maps one file extension to one cache duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControlRule {
    /// Extension including the leading dot, e.g. `.mp4`.
    #[serde(rename = "ext")]
    pub extension: String,
    /// Cache duration in seconds.
    #[serde(rename = "maxAge")]
    pub max_age: u64,
}

impl CacheControlRule {
    pub fn new(extension: impl Into<String>, max_age: u64) -> Self {
        Self {
            extension: extension.into(),
            max_age,
        }
    }
}

/// Ordered rule set. The first rule whose extension matches wins.
///
/// Loaded once at startup and shared read-only between handlers, so lookups
/// need no synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheControlRules(Vec<CacheControlRule>);

impl CacheControlRules {
    pub fn new(rules: Vec<CacheControlRule>) -> Self {
        Self(rules)
    }

    /// Decode rules from a JSON array such as
    /// `[{"ext":".mp4","maxAge":123456},{"ext":".html","maxAge":60}]`.
    ///
    /// Any malformed element fails the whole decode.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(ConfigError::InvalidRules)
    }

    pub fn rules(&self) -> &[CacheControlRule] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the `Cache-Control` value for `path`, or `None` when no rule
    /// matches and the header should not be set at all.
    ///
    /// Matching is exact and case-sensitive on the extension of the final
    /// path segment.
    pub fn header_value(&self, path: &str) -> Option<String> {
        let ext = extension(path);
        self.0
            .iter()
            .find(|rule| rule.extension == ext)
            .map(|rule| format!("max-age={}", rule.max_age))
    }
}

/// Extension of the last path segment, starting at its last dot.
/// Empty when the segment has no dot.
pub fn extension(path: &str) -> &str {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind('.') {
        Some(idx) => &segment[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> CacheControlRules {
        CacheControlRules::new(vec![
            CacheControlRule::new(".mp4", 123456),
            CacheControlRule::new(".html", 60),
        ])
    }

    #[test]
    fn test_header_value_matches_extension() {
        let rules = sample_rules();
        assert_eq!(
            rules.header_value("file.mp4").as_deref(),
            Some("max-age=123456")
        );
        assert_eq!(
            rules.header_value("some/path/index.html").as_deref(),
            Some("max-age=60")
        );
    }

    #[test]
    fn test_header_value_ignores_url_prefix() {
        let rules = sample_rules();
        assert_eq!(
            rules.header_value("https://github.com/some/file.mp4").as_deref(),
            Some("max-age=123456")
        );
    }

    #[test]
    fn test_header_value_no_match_is_none() {
        let rules = sample_rules();
        assert_eq!(rules.header_value("some/path/video.webm"), None);
        assert_eq!(rules.header_value("README"), None);
        assert_eq!(CacheControlRules::default().header_value("a.mp4"), None);
    }

    #[test]
    fn test_header_value_is_case_sensitive() {
        let rules = sample_rules();
        assert_eq!(rules.header_value("MOVIE.MP4"), None);
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = CacheControlRules::new(vec![
            CacheControlRule::new(".js", 10),
            CacheControlRule::new(".js", 99),
        ]);
        assert_eq!(rules.header_value("app.js").as_deref(), Some("max-age=10"));
    }

    #[test]
    fn test_compound_extension_uses_last_dot() {
        let rules = CacheControlRules::new(vec![
            CacheControlRule::new(".tar.gz", 5),
            CacheControlRule::new(".gz", 7),
        ]);
        assert_eq!(
            rules.header_value("dist/bundle.tar.gz").as_deref(),
            Some("max-age=7")
        );
    }

    #[test]
    fn test_zero_max_age() {
        let rules = CacheControlRules::new(vec![CacheControlRule::new(".m3u8", 0)]);
        assert_eq!(
            rules.header_value("live/index.m3u8").as_deref(),
            Some("max-age=0")
        );
    }

    #[test]
    fn test_extension_only_looks_at_last_segment() {
        assert_eq!(extension("dir.d/file"), "");
        assert_eq!(extension("dir/file.txt"), ".txt");
        assert_eq!(extension("dir/.hidden"), ".hidden");
        assert_eq!(extension("file."), ".");
        assert_eq!(extension(""), "");
    }

    #[test]
    fn test_from_json_preserves_order() {
        let rules = CacheControlRules::from_json(
            r#"[{"ext":".mp4","maxAge":123456},{"ext":".html","maxAge":60}]"#,
        )
        .unwrap();
        assert_eq!(rules, sample_rules());
    }

    #[test]
    fn test_from_json_truncated_fails() {
        let result =
            CacheControlRules::from_json(r#"[{"ext":".mp4","maxAge":123456},{"ext":".html","#);
        assert!(matches!(result, Err(ConfigError::InvalidRules(_))));
    }

    #[test]
    fn test_from_json_missing_field_fails() {
        let result = CacheControlRules::from_json(r#"[{"ext":".mp4"}]"#);
        assert!(matches!(result, Err(ConfigError::InvalidRules(_))));
    }

    #[test]
    fn test_from_json_negative_max_age_fails() {
        let result = CacheControlRules::from_json(r#"[{"ext":".mp4","maxAge":-1}]"#);
        assert!(result.is_err());
    }
}
