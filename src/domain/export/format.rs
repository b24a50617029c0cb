//! Target encodings supported by the export pipeline.

use serde::{Deserialize, Serialize};

use super::errors::ExportError;

/// Export formats.
///
/// The set is closed: renderer dispatch matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportFormat {
    /// Plain-markup text.
    #[serde(alias = "markdown", alias = "md")]
    Markdown,
    /// Paginated binary document.
    #[serde(alias = "pdf")]
    Pdf,
    /// Block-structured JSON for the Notion workspace API.
    #[serde(alias = "notion", alias = "blocks")]
    Notion,
}

impl ExportFormat {
    /// All formats, in a stable order.
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Markdown, ExportFormat::Pdf, ExportFormat::Notion];

    /// Get the MIME content type for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Notion => "application/json",
        }
    }

    /// Get the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Notion => "json",
        }
    }

    /// Average characters per page, used for page-count estimation.
    ///
    /// A heuristic only; no layout is measured.
    pub fn chars_per_page(&self) -> usize {
        match self {
            ExportFormat::Markdown => 3000,
            ExportFormat::Pdf => 2500,
            ExportFormat::Notion => 4000,
        }
    }

    /// Whether the rendered artifact is binary.
    pub fn is_binary(&self) -> bool {
        matches!(self, ExportFormat::Pdf)
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Markdown => write!(f, "MARKDOWN"),
            ExportFormat::Pdf => write!(f, "PDF"),
            ExportFormat::Notion => write!(f, "NOTION"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "pdf" => Ok(ExportFormat::Pdf),
            "notion" | "blocks" => Ok(ExportFormat::Notion),
            _ => Err(ExportError::format_unsupported(format!(
                "'{}' is not a supported export format",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_case_insensitively() {
        assert_eq!("MARKDOWN".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("Pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!("NOTION".parse::<ExportFormat>().unwrap(), ExportFormat::Notion);
    }

    #[test]
    fn html_is_not_a_supported_format() {
        let err = "HTML".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, ExportError::FormatUnsupported(_)));
    }

    #[test]
    fn serializes_in_upper_case() {
        assert_eq!(serde_json::to_string(&ExportFormat::Notion).unwrap(), "\"NOTION\"");
        let parsed: ExportFormat = serde_json::from_str("\"pdf\"").unwrap();
        assert_eq!(parsed, ExportFormat::Pdf);
    }

    #[test]
    fn content_types_and_extensions() {
        assert_eq!(ExportFormat::Pdf.content_type(), "application/pdf");
        assert_eq!(ExportFormat::Markdown.extension(), "md");
        assert_eq!(ExportFormat::Notion.extension(), "json");
    }

    #[test]
    fn page_density_differs_by_format() {
        assert!(ExportFormat::Pdf.chars_per_page() < ExportFormat::Markdown.chars_per_page());
        assert!(ExportFormat::Markdown.chars_per_page() < ExportFormat::Notion.chars_per_page());
    }
}
