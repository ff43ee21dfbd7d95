use tracing_subscriber::EnvFilter;

/// Log output shape, from `LOG_FORMAT` (`json` or `text`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env_or(default: LogFormat) -> Self {
        match std::env::var("LOG_FORMAT").ok().as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            _ => default,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins; otherwise `replyscout=info`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("replyscout=info,reddit_client=info,ai_client=info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        // The function runtime timestamps every line already.
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .without_time()
            .init(),
    }
}
