//! PubMed E-utilities provider (esearch for IDs, efetch for records)

use super::{http_client, selector, squash, Paper, PaperProvider};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

pub struct PubMedProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl PubMedProvider {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let mut base = config.pubmed_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client: http_client(config)?,
            base_url: Url::parse(&base)?,
        })
    }

    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let url = self.base_url.join("esearch.fcgi")?;
        let retmax = max_results.to_string();
        let response = self
            .client
            .get(url)
            .query(&[
                ("db", "pubmed"),
                ("term", query),
                ("retmax", retmax.as_str()),
                ("retmode", "json"),
                ("sort", "relevance"),
            ])
            .send()
            .await
            .map_err(|e| Error::Provider(format!("PubMed esearch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "PubMed esearch returned {}",
                response.status()
            )));
        }

        let parsed: EsearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Malformed esearch response: {}", e)))?;
        Ok(parsed.esearchresult.idlist)
    }

    async fn fetch_records(&self, ids: &[String]) -> Result<String> {
        let url = self.base_url.join("efetch.fcgi")?;
        let id_list = ids.join(",");
        let response = self
            .client
            .get(url)
            .query(&[("db", "pubmed"), ("id", id_list.as_str()), ("retmode", "xml")])
            .send()
            .await
            .map_err(|e| Error::Provider(format!("PubMed efetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "PubMed efetch returned {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PaperProvider for PubMedProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>> {
        let ids = self.search_ids(query, max_results).await?;
        debug!("PubMed returned {} ids for '{}'", ids.len(), query);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let xml = self.fetch_records(&ids).await?;
        parse_articles(&xml)
    }

    fn name(&self) -> &str {
        "pubmed"
    }
}

fn joined_text(root: &ElementRef, css: &str, sep: &str) -> Result<String> {
    let sel = selector(css)?;
    let parts: Vec<String> = root
        .select(&sel)
        .map(|el| squash(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
        .collect();
    Ok(parts.join(sep))
}

/// Parse a PubMed efetch XML document.
///
/// The HTML parser lowercases element and attribute names, so selectors
/// here use lowercase forms of the PubMed tags.
pub fn parse_articles(xml: &str) -> Result<Vec<Paper>> {
    let doc = Html::parse_document(xml);
    let article_sel = selector("pubmedarticle")?;
    let pmid_sel = selector("medlinecitation > pmid")?;
    let author_sel = selector("authorlist author")?;
    let last_sel = selector("lastname")?;
    let fore_sel = selector("forename")?;
    let year_sel = selector("pubdate year")?;
    let pmc_sel = selector(r#"articleid[idtype="pmc"]"#)?;

    let text_of = |el: ElementRef| squash(&el.text().collect::<String>());

    let mut papers = Vec::new();
    for article in doc.select(&article_sel) {
        let Some(pmid) = article.select(&pmid_sel).next().map(text_of) else {
            continue;
        };
        let title = joined_text(&article, "articletitle", " ")?;
        if pmid.is_empty() || title.is_empty() {
            continue;
        }

        let authors = article
            .select(&author_sel)
            .filter_map(|author| {
                let last = author.select(&last_sel).next().map(text_of)?;
                match author.select(&fore_sel).next().map(text_of) {
                    Some(fore) if !fore.is_empty() => Some(format!("{} {}", fore, last)),
                    _ => Some(last),
                }
            })
            .collect();

        let pdf_url = article
            .select(&pmc_sel)
            .next()
            .map(text_of)
            .filter(|pmc| !pmc.is_empty())
            .map(|pmc| format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{}/pdf/", pmc));

        papers.push(Paper {
            external_id: format!("pubmed:{}", pmid),
            source: "pubmed".to_string(),
            title,
            authors,
            abstract_text: joined_text(&article, "abstract abstracttext", "\n")?,
            published: article.select(&year_sel).next().map(text_of),
            url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
            pdf_url,
        });
    }

    Ok(papers)
}
