use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Level used when `LOG_LEVEL` cannot be parsed.
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::DEBUG;

/// Parse a `LOG_LEVEL` value, falling back to [`DEFAULT_LOG_LEVEL`].
///
/// Also accepts `warning`, `fatal` and `panic`, which have no tracing
/// equivalent and map to the nearest stricter level.
pub fn parse_level(log_level: &str) -> LevelFilter {
    match log_level.trim().to_ascii_lowercase().as_str() {
        "warning" => LevelFilter::WARN,
        "fatal" | "panic" => LevelFilter::ERROR,
        other => other.parse().unwrap_or(DEFAULT_LOG_LEVEL),
    }
}

/// Build the env filter. `RUST_LOG` wins over `log_level`.
pub fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(parse_level(log_level).into()))
}

/// Install the global subscriber. `log_format` is `"json"` or anything else
/// for human-readable text.
pub fn init_tracing(log_level: &str, log_format: &str) {
    let filter = build_filter(log_level);

    match log_format {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
