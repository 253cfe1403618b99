//! Logging setup for the connpool binary
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over the default filter.

use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Emit one JSON object per event instead of human-readable lines
    pub json: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close (pool lifecycle timing)
    pub enable_spans: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            include_location: cfg!(debug_assertions),
            enable_spans: false,
            default_filter: "warn,connpool_cli=info,connpool_pool=info,connpool_driver_sqlite=warn"
                .to_string(),
        }
    }
}

impl LoggingConfig {
    /// Raise the default filter by `verbosity` steps (`-v`, `-vv`)
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        let filter = match verbosity {
            0 => return self,
            1 => "info,connpool_cli=debug,connpool_pool=debug,connpool_driver_sqlite=debug",
            _ => "debug,connpool_pool=trace,connpool_driver_sqlite=trace",
        };
        self.default_filter = filter.to_string();
        self.enable_spans = verbosity > 1;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Install the global subscriber
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}
