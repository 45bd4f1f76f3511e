//! Logging setup for contentdb

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize logging based on configuration. Without a logging section
/// the ambient subscriber (if any) is left alone.
pub fn init_logging(config: &Option<LoggingConfig>) -> Result<()> {
    let Some(config) = config else {
        return Ok(());
    };

    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(
        format!("contentdb={}", level)
            .parse()
            .map_err(|e| Error::ConfigError(format!("Invalid log directive: {}", e)))?,
    );

    if !config.stdout {
        return Ok(());
    }

    if config.format.to_lowercase() == "json" {
        let subscriber = fmt::Subscriber::builder()
            .json()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
    }

    Ok(())
}
