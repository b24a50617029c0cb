//! Circuit breaker configuration

use serde::Deserialize;
use std::time::Duration;

use crate::ports::CircuitBreakerConfig;

use super::error::ValidationError;

/// Settings for the breaker guarding document generation.
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    /// Failures within the window that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Rolling window for counting failures; 0 counts consecutive failures
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,

    /// Cool-down before a half-open trial request is allowed
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,

    /// Trial successes needed to close again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "default_half_open_max_requests")]
    pub half_open_max_requests: u32,
}

impl ResilienceConfig {
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            success_threshold: self.success_threshold,
            half_open_max_requests: self.half_open_max_requests,
            failure_window: (self.failure_window_secs > 0)
                .then(|| Duration::from_secs(self.failure_window_secs)),
        }
    }

    /// Validate resilience configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.failure_threshold == 0 {
            return Err(ValidationError::InvalidBreakerSetting("failure_threshold"));
        }
        if self.recovery_timeout_secs == 0 {
            return Err(ValidationError::InvalidBreakerSetting("recovery_timeout_secs"));
        }
        if self.success_threshold == 0 {
            return Err(ValidationError::InvalidBreakerSetting("success_threshold"));
        }
        if self.half_open_max_requests == 0 {
            return Err(ValidationError::InvalidBreakerSetting("half_open_max_requests"));
        }
        Ok(())
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_window_secs: default_failure_window_secs(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            success_threshold: default_success_threshold(),
            half_open_max_requests: default_half_open_max_requests(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_failure_window_secs() -> u64 {
    60
}

fn default_recovery_timeout_secs() -> u64 {
    30
}

fn default_success_threshold() -> u32 {
    1
}

fn default_half_open_max_requests() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_breaker_defaults() {
        let config = ResilienceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.breaker_config(), CircuitBreakerConfig::default());
    }

    #[test]
    fn test_zero_window_counts_consecutive_failures() {
        let config = ResilienceConfig {
            failure_window_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.breaker_config().failure_window, None);
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let config = ResilienceConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBreakerSetting("failure_threshold"))
        ));
    }
}
