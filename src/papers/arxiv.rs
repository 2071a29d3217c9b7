//! arXiv Atom API provider

use super::{http_client, selector, squash, Paper, PaperProvider};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

pub struct ArxivProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl ArxivProvider {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            endpoint: config.arxiv_url.clone(),
        })
    }
}

#[async_trait]
impl PaperProvider for ArxivProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Paper>> {
        let search_query = format!("all:{}", query);
        let max = max_results.to_string();

        debug!("Querying arXiv: {} (max {})", query, max_results);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| Error::Provider(format!("arXiv request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Provider(format!(
                "arXiv returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let papers = parse_feed(&body)?;
        debug!("Parsed {} papers from arXiv", papers.len());
        Ok(papers.into_iter().take(max_results).collect())
    }

    fn name(&self) -> &str {
        "arxiv"
    }
}

fn first_text(entry: &ElementRef, css: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(entry
        .select(&sel)
        .next()
        .map(|el| squash(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty()))
}

/// Parse an Atom feed from the arXiv query API
pub fn parse_feed(xml: &str) -> Result<Vec<Paper>> {
    let doc = Html::parse_document(xml);
    let entry_sel = selector("entry")?;
    let author_sel = selector("author name")?;
    let pdf_link_sel = selector(r#"link[title="pdf"]"#)?;

    let mut papers = Vec::new();
    for entry in doc.select(&entry_sel) {
        let (Some(id_url), Some(title)) = (first_text(&entry, "id")?, first_text(&entry, "title")?)
        else {
            warn!("Skipping arXiv entry without id or title");
            continue;
        };

        let arxiv_id = id_url
            .rsplit_once("/abs/")
            .map(|(_, id)| id.to_string())
            .unwrap_or(id_url.clone());

        let authors = entry
            .select(&author_sel)
            .map(|el| squash(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty())
            .collect();

        let pdf_url = entry
            .select(&pdf_link_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}.pdf", arxiv_id));

        let published = first_text(&entry, "published")?
            .map(|p| p.chars().take(10).collect::<String>());

        papers.push(Paper {
            external_id: format!("arxiv:{}", arxiv_id),
            source: "arxiv".to_string(),
            title,
            authors,
            abstract_text: first_text(&entry, "summary")?.unwrap_or_default(),
            published,
            url: format!("https://arxiv.org/abs/{}", arxiv_id),
            pdf_url: Some(pdf_url),
        });
    }

    Ok(papers)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:transformers</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex
      recurrent or convolutional neural networks.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <published>2024-01-01T00:00:00Z</published>
    <title>A Second Paper</title>
    <summary>Short abstract.</summary>
    <author><name>Jane Doe</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.external_id, "arxiv:1706.03762v7");
        assert_eq!(first.title, "Attention Is All You Need");
        assert_eq!(first.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(first.published.as_deref(), Some("2017-06-12"));
        assert_eq!(first.pdf_url.as_deref(), Some("http://arxiv.org/pdf/1706.03762v7"));
        assert!(first.abstract_text.starts_with("The dominant sequence"));

        let second = &papers[1];
        assert_eq!(second.authors, vec!["Jane Doe"]);
        assert_eq!(
            second.pdf_url.as_deref(),
            Some("https://arxiv.org/pdf/2401.00001v1.pdf")
        );
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "all:transformers"))
            .and(query_param("max_results", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_FEED))
            .expect(1)
            .mount(&server)
            .await;

        let config = SearchConfig {
            arxiv_url: format!("{}/api/query", server.uri()),
            ..SearchConfig::default()
        };
        let provider = ArxivProvider::new(&config).unwrap();
        let papers = provider.search("transformers", 1).await.unwrap();
        assert_eq!(papers.len(), 1);
    }
}
