//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `KNOWLEDGE_EXPORT` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use knowledge_export::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod error;
mod export;
mod resilience;
mod server;

pub use error::{ConfigError, ValidationError};
pub use export::ExportConfig;
pub use resilience::ResilienceConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// configuration. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Export pipeline limits, retry policy and housekeeping
    #[serde(default)]
    pub export: ExportConfig,

    /// Circuit breaker around document generation
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `KNOWLEDGE_EXPORT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Splits `export.supported_formats` on commas
    ///
    /// # Environment Variable Format
    ///
    /// - `KNOWLEDGE_EXPORT__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `KNOWLEDGE_EXPORT__EXPORT__SUPPORTED_FORMATS=markdown,pdf` -> `export.supported_formats`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("KNOWLEDGE_EXPORT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("export.supported_formats"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.export.validate()?;
        self.resilience.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
