//! Text extraction interface.
//!
//! The ingestion pipeline is polymorphic over input formats; the
//! [`TextExtractor`] trait hides which parser libraries do the work.
//! The full multi-format extractor (PDF, DOCX, HTML) lives in the app
//! crate; [`PlainExtractor`] here handles the text-only formats and
//! serves as the test double.

use crate::error::{Error, Result};

/// Input formats the pipeline can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Html,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Infer the format from a filename extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = filename
            .rsplit('.')
            .next()
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "text" | "log" => Ok(DocumentFormat::PlainText),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            "html" | "htm" => Ok(DocumentFormat::Html),
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            _ => Err(Error::UnsupportedFormat(format!(
                "no extractor for file: {filename}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::PlainText => "text/plain",
            DocumentFormat::Markdown => "text/markdown",
            DocumentFormat::Html => "text/html",
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// Converts raw bytes into extractable UTF-8 text.
///
/// Fails with [`Error::UnsupportedFormat`] when the implementation does
/// not handle the format, and [`Error::ExtractionFailed`] when parsing
/// breaks partway. Extraction is synchronous CPU work; no implementation
/// should block on the network.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String>;
}

/// Extractor for the text-only formats.
///
/// Plain text and Markdown pass through as UTF-8 (lossy); binary formats
/// are reported unsupported. Used in tests and wherever the heavier
/// parsers are not wired up.
pub struct PlainExtractor;

impl TextExtractor for PlainExtractor {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::PlainText | DocumentFormat::Markdown => {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            other => Err(Error::UnsupportedFormat(format!(
                "plain extractor cannot handle {}",
                other.as_str()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_filename() {
        assert_eq!(
            DocumentFormat::from_filename("notes.TXT").unwrap(),
            DocumentFormat::PlainText
        );
        assert_eq!(
            DocumentFormat::from_filename("guide.md").unwrap(),
            DocumentFormat::Markdown
        );
        assert_eq!(
            DocumentFormat::from_filename("manual.pdf").unwrap(),
            DocumentFormat::Pdf
        );
        assert!(matches!(
            DocumentFormat::from_filename("archive.tar.gz"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn plain_extractor_passes_text_through() {
        let text = PlainExtractor
            .extract(b"hello world", DocumentFormat::PlainText)
            .unwrap();
        assert_eq!(text, "hello world");

        assert!(matches!(
            PlainExtractor.extract(b"%PDF-", DocumentFormat::Pdf),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
