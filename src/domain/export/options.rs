//! Per-call export options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

use super::format::ExportFormat;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Growth factor applied per further attempt.
    pub backoff_factor: f64,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `base_delay * backoff_factor^(attempt - 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let millis = self.base_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis.min(u64::MAX as f64) as u64)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(ValidationError::out_of_range(
                "retry.max_attempts",
                1,
                10,
                self.max_attempts as i64,
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ValidationError::invalid_format(
                "retry.backoff_factor",
                "must be a finite number >= 1.0",
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            backoff_factor: 2.0,
        }
    }
}

/// Rules applied before any rendering happens.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRules {
    /// Ceiling on the serialized content size in bytes.
    pub max_content_size: usize,
    pub allowed_formats: Vec<ExportFormat>,
    /// Run structural and script-marker checks.
    pub security_checks: bool,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_content_size: 10 * 1024 * 1024,
            allowed_formats: ExportFormat::ALL.to_vec(),
            security_checks: true,
        }
    }
}

/// Output compression for the paginated format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionOptions {
    pub enabled: bool,
    /// Deflate level, 0-9.
    pub level: u8,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 6,
        }
    }
}

/// Accessibility tagging for the paginated format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityOptions {
    /// Emit a structure tree.
    pub tagged: bool,
    /// Natural language of the text, BCP 47.
    pub language: String,
    /// Structure type of the root element.
    pub document_role: String,
    /// Ask viewers to show the title instead of the file name.
    pub display_title: bool,
}

impl Default for AccessibilityOptions {
    fn default() -> Self {
        Self {
            tagged: true,
            language: "en-US".to_string(),
            document_role: "Document".to_string(),
            display_title: true,
        }
    }
}

/// Memory levels that trigger warnings during generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryThresholds {
    pub warning_bytes: u64,
    pub critical_bytes: u64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            warning_bytes: 512 * 1024 * 1024,
            critical_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Format-specific ceilings enforced before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLimits {
    /// Largest serialized content accepted for paginated output.
    pub pdf_max_content_bytes: usize,
    /// Per-parent child limit of the block workspace API.
    pub notion_max_children: usize,
}

impl Default for FormatLimits {
    fn default() -> Self {
        Self {
            pdf_max_content_bytes: 50 * 1024 * 1024,
            notion_max_children: 100,
        }
    }
}

/// Options owned by one document generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub format: ExportFormat,
    pub include_graphs: bool,
    pub locale: String,
    pub timezone: String,
    pub compression: CompressionOptions,
    pub accessibility: AccessibilityOptions,
    pub memory: MemoryThresholds,
    /// Progress is reported in multiples of this many percent.
    pub progress_granularity: u8,
    pub limits: FormatLimits,
}

impl GenerationOptions {
    pub fn for_format(format: ExportFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Merges a partial update. Returns true when the format changed.
    pub fn apply(&mut self, patch: GenerationOptionsPatch) -> bool {
        let previous = self.format;
        if let Some(format) = patch.format {
            self.format = format;
        }
        if let Some(include_graphs) = patch.include_graphs {
            self.include_graphs = include_graphs;
        }
        if let Some(locale) = patch.locale {
            self.locale = locale;
        }
        if let Some(timezone) = patch.timezone {
            self.timezone = timezone;
        }
        if let Some(compression) = patch.compression {
            self.compression = compression;
        }
        if let Some(accessibility) = patch.accessibility {
            self.accessibility = accessibility;
        }
        if let Some(granularity) = patch.progress_granularity {
            self.progress_granularity = granularity;
        }
        previous != self.format
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Markdown,
            include_graphs: true,
            locale: "en-US".to_string(),
            timezone: "UTC".to_string(),
            compression: CompressionOptions::default(),
            accessibility: AccessibilityOptions::default(),
            memory: MemoryThresholds::default(),
            progress_granularity: 10,
            limits: FormatLimits::default(),
        }
    }
}

/// Partial update for [`GenerationOptions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptionsPatch {
    pub format: Option<ExportFormat>,
    pub include_graphs: Option<bool>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub compression: Option<CompressionOptions>,
    pub accessibility: Option<AccessibilityOptions>,
    pub progress_granularity: Option<u8>,
}

/// Everything a caller can configure for one export request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub generation: GenerationOptions,
    /// Budget for a single attempt.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub validation: ValidationRules,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            generation: GenerationOptions::for_format(format),
            ..Default::default()
        }
    }

    pub fn format(&self) -> ExportFormat {
        self.generation.format
    }

    pub fn with_graphs(mut self, include: bool) -> Self {
        self.generation.include_graphs = include;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_validation(mut self, validation: ValidationRules) -> Self {
        self.validation = validation;
        self
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            validation: ValidationRules::default(),
        }
    }
}
