//! Paper search providers
//!
//! This module defines the interface for finding candidate papers in
//! external catalogues, plus the arXiv and PubMed implementations, the
//! reliability heuristic used to rank them, and PDF download.

mod arxiv;
mod download;
mod pubmed;
mod reliability;

pub use arxiv::ArxivProvider;
pub use download::download_pdf;
pub use pubmed::PubMedProvider;
pub use reliability::{assess_reliability, Reliability};

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A candidate paper returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Provider-qualified ID, e.g. `arxiv:2401.01234v1` or `pubmed:38012345`
    pub external_id: String,
    pub source: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Publication date as `YYYY-MM-DD` or `YYYY`, when known
    pub published: Option<String>,
    /// Landing page
    pub url: String,
    pub pdf_url: Option<String>,
}

impl Paper {
    /// Publication year, if the date starts with one
    pub fn year(&self) -> Option<i32> {
        self.published.as_deref()?.get(..4)?.parse().ok()
    }
}

/// Trait for searching an external paper catalogue.
///
/// Implementations return at most `max_results` candidates, best match
/// first as ranked by the catalogue itself.
#[async_trait]
pub trait PaperProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>>;

    /// Source name used in requests and external IDs ("arxiv", "pubmed")
    fn name(&self) -> &str;
}

/// Names accepted in a search request's `sources`
pub const KNOWN_SOURCES: &[&str] = &["arxiv", "pubmed"];

/// Build all providers from configuration
pub fn create_providers(config: &SearchConfig) -> Result<Vec<Arc<dyn PaperProvider>>> {
    let arxiv = ArxivProvider::new(config)?;
    let pubmed = PubMedProvider::new(config)?;
    Ok(vec![Arc::new(arxiv), Arc::new(pubmed)])
}

pub(crate) fn http_client(config: &SearchConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Provider(format!("Invalid selector '{}': {:?}", css, e)))
}

/// Collapse runs of whitespace, as feed text is often hard-wrapped
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year() {
        let mut paper = Paper {
            external_id: "arxiv:1".into(),
            source: "arxiv".into(),
            title: "T".into(),
            authors: vec![],
            abstract_text: String::new(),
            published: Some("2021-06-01".into()),
            url: String::new(),
            pdf_url: None,
        };
        assert_eq!(paper.year(), Some(2021));
        paper.published = Some("n/a".into());
        assert_eq!(paper.year(), None);
        paper.published = None;
        assert_eq!(paper.year(), None);
    }

    #[test]
    fn test_abstract_field_name() {
        let paper = Paper {
            external_id: "pubmed:1".into(),
            source: "pubmed".into(),
            title: "T".into(),
            authors: vec!["A".into()],
            abstract_text: "text".into(),
            published: None,
            url: String::new(),
            pdf_url: None,
        };
        let json = serde_json::to_value(&paper).unwrap();
        assert_eq!(json["abstract"], "text");
    }
}
