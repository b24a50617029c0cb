//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Maximum file size must be greater than zero")]
    InvalidMaxFileSize,

    #[error("At least one export format must be supported")]
    NoSupportedFormats,

    #[error("Export timeout must be between 1 and 600 seconds")]
    InvalidExportTimeout,

    #[error("Retry attempts must be between 1 and 10")]
    InvalidRetryAttempts,

    #[error("Retry backoff must be a finite number >= 1.0")]
    InvalidRetryBackoff,

    #[error("Cleanup interval must be greater than zero")]
    InvalidCleanupInterval,

    #[error("Notion child limit must be between 1 and 1000")]
    InvalidNotionChildLimit,

    #[error("Circuit breaker {0} must be greater than zero")]
    InvalidBreakerSetting(&'static str),
}
