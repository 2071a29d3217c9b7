//! PDF extraction via `pdf-extract`

use super::{is_pdf, normalize_whitespace, TextExtractor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Extracts page text from PDF bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "pdf")]
fn extract_blocking(bytes: &[u8]) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::Parse(format!("Failed to extract PDF text: {}", e)))?;
    Ok(pages.iter().map(|p| normalize_whitespace(p)).collect())
}

#[cfg(not(feature = "pdf"))]
fn extract_blocking(_bytes: &[u8]) -> Result<Vec<String>> {
    Err(Error::Parse(
        "PDF support not compiled in (enable the 'pdf' feature)".to_string(),
    ))
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<String>> {
        if !is_pdf(&bytes) {
            return Err(Error::Parse("Not a PDF file".to_string()));
        }

        // pdf-extract is CPU-bound and may panic on malformed input
        let pages = tokio::task::spawn_blocking(move || extract_blocking(&bytes))
            .await
            .map_err(|e| Error::Parse(format!("PDF extraction aborted: {}", e)))??;

        debug!("Extracted {} pages", pages.len());
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_pdf() {
        let err = PdfExtractor::new()
            .extract_pages(b"plain text".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_truncated_pdf_is_parse_error() {
        let result = PdfExtractor::new()
            .extract_pages(b"%PDF-1.4\n%garbage".to_vec())
            .await;
        assert!(result.is_err());
    }
}
