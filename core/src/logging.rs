//! Tracing subscriber setup

use crate::config::LoggingConfig;
use crate::error::PlatformError;
use crate::traits::PlatformResult;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over the
/// configured level. Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> PlatformResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| PlatformError::Config(format!("invalid log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .try_init()
        .map_err(|e| PlatformError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        // Another test may have installed a subscriber already.
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
