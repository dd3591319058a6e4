//! Tracing subscriber setup shared by the binaries

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = fmt().with_env_filter(filter).with_target(true);
    // A second init (tests, embedding) keeps the first subscriber
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
