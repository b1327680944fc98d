//! Tracing setup

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::LogConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `config.level`. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .try_init()
    };

    match result {
        Ok(()) => tracing::debug!(level = %config.level, json = config.json, "Tracing initialized"),
        Err(_) => tracing::debug!("Tracing already initialized, skipping re-initialization"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_multiple_calls() {
        init_tracing(&LogConfig::default());
        init_tracing(&LogConfig { level: "debug".to_string(), json: true });
    }

    #[test]
    fn test_init_tracing_bad_filter_falls_back() {
        init_tracing(&LogConfig { level: "not a [valid filter".to_string(), json: false });
    }
}
