//! Document parsing and text extraction
//!
//! This module handles:
//! - PDF text extraction, one string per page
//! - Whitespace normalization of extracted text
//! - Filename sanitization for stored PDFs

mod pdf;
mod text;

pub use pdf::*;
pub use text::*;

use crate::error::Result;
use async_trait::async_trait;

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Turns a document's raw bytes into per-page text
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the text of each page, in page order
    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<String>>;
}

/// Whether `data` starts with the PDF signature
pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            // Before adding a non-whitespace char, handle accumulated whitespace
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let input = "Hello   world\n\n\n\ntest";
        let result = normalize_whitespace(input);
        assert_eq!(result, "Hello world\n\ntest");
    }

    #[test]
    fn test_pdf_magic() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"<html>"));
        assert!(!is_pdf(b""));
    }
}
