//! Export pipeline configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::export::{
    ExportFormat, ExportOptions, FormatLimits, GenerationOptions, RetryPolicy, ValidationRules,
};

use super::error::ValidationError;

/// Export configuration
///
/// Read once at startup; every request starts from [`ExportConfig::default_options`].
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Ceiling on serialized content size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: usize,

    /// Formats callers may request
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<ExportFormat>,

    /// Budget for a single generation attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,

    /// Scratch directory for export artifacts.
    ///
    /// Reserved: every format renders in memory today, so nothing reads it
    /// and startup does not create it.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// How often expired status records and caches are swept
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// How long finished status records stay queryable
    #[serde(default = "default_status_retention_secs")]
    pub status_retention_secs: u64,

    #[serde(default = "default_pdf_max_content_bytes")]
    pub pdf_max_content_bytes: usize,

    #[serde(default = "default_notion_max_children")]
    pub notion_max_children: usize,
}

impl ExportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn status_retention(&self) -> Duration {
        Duration::from_secs(self.status_retention_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            backoff_factor: self.retry_backoff,
        }
    }

    /// Per-call options every request starts from.
    pub fn default_options(&self) -> ExportOptions {
        ExportOptions {
            generation: GenerationOptions {
                limits: FormatLimits {
                    pdf_max_content_bytes: self.pdf_max_content_bytes,
                    notion_max_children: self.notion_max_children,
                },
                ..Default::default()
            },
            timeout: self.timeout(),
            retry: self.retry_policy(),
            validation: ValidationRules {
                max_content_size: self.max_file_size_bytes,
                allowed_formats: self.supported_formats.clone(),
                security_checks: true,
            },
        }
    }

    /// Validate export configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_file_size_bytes == 0 {
            return Err(ValidationError::InvalidMaxFileSize);
        }
        if self.supported_formats.is_empty() {
            return Err(ValidationError::NoSupportedFormats);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 600 {
            return Err(ValidationError::InvalidExportTimeout);
        }
        if self.retry_attempts == 0 || self.retry_attempts > 10 {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        if !self.retry_backoff.is_finite() || self.retry_backoff < 1.0 {
            return Err(ValidationError::InvalidRetryBackoff);
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ValidationError::InvalidCleanupInterval);
        }
        if self.notion_max_children == 0 || self.notion_max_children > 1000 {
            return Err(ValidationError::InvalidNotionChildLimit);
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            supported_formats: default_supported_formats(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_backoff: default_retry_backoff(),
            temp_dir: default_temp_dir(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            status_retention_secs: default_status_retention_secs(),
            pdf_max_content_bytes: default_pdf_max_content_bytes(),
            notion_max_children: default_notion_max_children(),
        }
    }
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_supported_formats() -> Vec<ExportFormat> {
    ExportFormat::ALL.to_vec()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_retry_backoff() -> f64 {
    2.0
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("knowledge-export")
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_status_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_pdf_max_content_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_notion_max_children() -> usize {
    100
}
