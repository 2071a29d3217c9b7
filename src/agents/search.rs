//! Paper discovery: query the catalogues, rate candidates, download PDFs

use super::{check_length, check_range, Agent, AgentContext, Services};
use crate::error::{Error, Result};
use crate::llm::{extract_json_object, first_number, CompletionRequest};
use crate::meta::Document;
use crate::papers::{assess_reliability, download_pdf, Paper, KNOWN_SOURCES};
use crate::parse::{safe_external_id, safe_title};
use crate::rank::{adaptive_cutoff, sort_by_score};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Fallback search query length in characters
const FALLBACK_QUERY_CHARS: usize = 100;
const SUMMARY_CHARS: usize = 1000;
const MAX_TITLE_CHARS: usize = 200;
/// Relevance ratings in flight at once
const RATING_CONCURRENCY: usize = 4;

const RELEVANCE_WEIGHT: f32 = 0.8;
const RELIABILITY_WEIGHT: f32 = 0.2;

const COUNT_PROMPT: &str = "Decide how many papers the user wants from their request. \
Respond with only a JSON object like {\"requested_count\": 3}. \
The number must be between 1 and 20; use 5 when the request does not say.";

const QUERY_PROMPT: &str = "You turn research questions into catalogue search queries. \
Reply with 2 to 10 technical keywords and nothing else.";

const RELEVANCE_PROMPT: &str = "You judge how relevant a paper is to a research interest. \
Respond with only a JSON object like {\"relevance_score\": 0.85, \"reason\": \"...\"}, \
where 0.0 is unrelated and 1.0 is highly relevant.";

fn default_sources() -> Vec<String> {
    vec!["arxiv".to_string()]
}

fn default_download() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub session_id: String,
    #[serde(default)]
    pub analysis_goal: Option<String>,
    /// Papers wanted; inferred from the query when absent
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub min_relevance: Option<f32>,
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_download")]
    pub download: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchedPaper {
    pub external_id: String,
    pub source: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub published: Option<String>,
    pub url: String,
    pub pdf_url: Option<String>,
    /// LLM relevance rating, 0.0 - 1.0
    pub relevance_score: f32,
    pub reliability_score: f32,
    pub reliability_flags: Vec<String>,
    /// Blend of relevance and reliability used for ordering
    pub final_score: f32,
    pub downloaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl SearchedPaper {
    fn rated(paper: Paper, relevance: f32, current_year: i32) -> Self {
        let reliability = assess_reliability(&paper, current_year);
        Self {
            final_score: RELEVANCE_WEIGHT * relevance + RELIABILITY_WEIGHT * reliability.score,
            external_id: paper.external_id,
            source: paper.source,
            title: paper.title,
            authors: paper.authors,
            abstract_text: paper.abstract_text,
            published: paper.published,
            url: paper.url,
            pdf_url: paper.pdf_url,
            relevance_score: relevance,
            reliability_score: reliability.score,
            reliability_flags: reliability.flags,
            downloaded: false,
            document_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub search_query: String,
    pub requested_count: usize,
    /// Candidates returned by the catalogues, before filtering
    pub papers_found: usize,
    pub papers_filtered: usize,
    pub papers_downloaded: usize,
    pub papers: Vec<SearchedPaper>,
    pub document_ids: Vec<String>,
    pub tokens_used: i64,
}

pub struct SearchAgent {
    services: Services,
}

impl SearchAgent {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    async fn ask(&self, system: &str, user: String, max_tokens: u32) -> Result<(String, i64)> {
        let response = self
            .services
            .llm
            .complete(
                CompletionRequest::prompt(system, user)
                    .temperature(0.0)
                    .max_tokens(max_tokens),
            )
            .await?;
        Ok((response.content, response.usage.total_tokens as i64))
    }

    /// How many papers the user asked for
    async fn requested_count(&self, query: &str) -> Result<(usize, i64)> {
        let search = &self.services.config.search;
        let (reply, tokens) = self.ask(COUNT_PROMPT, query.to_string(), 50).await?;
        let count = parse_requested_count(&reply)
            .unwrap_or(search.default_count)
            .clamp(1, search.max_count);
        debug!("Requested paper count: {}", count);
        Ok((count, tokens))
    }

    async fn search_query(&self, query: &str, goal: Option<&str>) -> Result<(String, i64)> {
        let prompt = format!(
            "Question: {}\nAnalysis goal: {}\n\nSearch query:",
            query,
            goal.unwrap_or("none")
        );
        let (reply, tokens) = self.ask(QUERY_PROMPT, prompt, 100).await?;
        let keywords = reply.trim().trim_matches('"').trim().to_string();
        if keywords.is_empty() {
            let fallback: String = query.trim().chars().take(FALLBACK_QUERY_CHARS).collect();
            return Ok((fallback, tokens));
        }
        Ok((keywords, tokens))
    }

    /// Gather candidates from every requested source, skipping known IDs
    async fn collect_candidates(
        &self,
        sources: &[String],
        keywords: &str,
        per_source: usize,
        known: &HashSet<String>,
    ) -> Result<(Vec<Paper>, usize)> {
        let mut seen = known.clone();
        let mut candidates = Vec::new();
        let mut found = 0;
        let mut failures = 0;
        let mut queried = 0;

        for source in sources {
            let Some(provider) = self.services.providers.iter().find(|p| p.name() == source) else {
                warn!("No provider configured for source '{}'", source);
                continue;
            };
            queried += 1;
            match provider.search(keywords, per_source).await {
                Ok(papers) => {
                    debug!("{} returned {} candidates", source, papers.len());
                    found += papers.len();
                    candidates.extend(
                        papers
                            .into_iter()
                            .filter(|p| seen.insert(p.external_id.clone())),
                    );
                }
                Err(e) => {
                    warn!("Search on {} failed: {}", source, e);
                    failures += 1;
                }
            }
        }

        if queried > 0 && failures == queried {
            return Err(Error::Provider(
                "Every paper source failed to respond".to_string(),
            ));
        }
        Ok((candidates, found))
    }

    /// LLM relevance for one candidate; failures rate as zero
    async fn rate(&self, paper: &Paper, query: &str, goal: Option<&str>) -> (f32, i64) {
        let prompt = format!(
            "Research question: {}\nAnalysis goal: {}\n\nTitle: {}\nAbstract: {}",
            query,
            goal.unwrap_or("none"),
            paper.title,
            paper.abstract_text
        );
        match self.ask(RELEVANCE_PROMPT, prompt, 200).await {
            Ok((reply, tokens)) => (parse_relevance(&reply), tokens),
            Err(e) => {
                warn!("Relevance rating failed for {}: {}", paper.external_id, e);
                (0.0, 0)
            }
        }
    }

    async fn store_pdf(&self, ctx: &AgentContext, session_id: &str, paper: &SearchedPaper) -> Result<Option<String>> {
        let Some(pdf_url) = &paper.pdf_url else {
            return Ok(None);
        };

        let file_name = format!(
            "{}_{}.pdf",
            safe_external_id(&paper.external_id),
            safe_title(&paper.title)
        );
        let path = self.services.upload_dir.join(session_id).join(&file_name);
        let size = download_pdf(&self.services.http, pdf_url, &path).await?;

        let title: String = paper.title.chars().take(MAX_TITLE_CHARS).collect();
        let mut doc = Document::new(
            ctx.user_id.clone(),
            Some(session_id.to_string()),
            title,
            file_name,
            path.to_string_lossy().to_string(),
            size as i64,
        );
        doc.description = Some(format!(
            "{} {} - Relevance: {:.0}%",
            paper.source,
            paper.external_id,
            paper.final_score * 100.0
        ));
        doc.external_id = Some(paper.external_id.clone());
        doc.relevance_score = Some(paper.final_score as f64);
        doc.summary = Some(paper.abstract_text.chars().take(SUMMARY_CHARS).collect());
        self.services.db.insert_document(&doc).await?;

        Ok(Some(doc.id))
    }
}

/// `{"requested_count": n}` or the first number in the reply
fn parse_requested_count(reply: &str) -> Option<usize> {
    let value = extract_json_object(reply)
        .and_then(|v| v.get("requested_count").and_then(|n| n.as_f64()))
        .or_else(|| first_number(reply))?;
    if value.is_finite() && value >= 1.0 {
        Some(value as usize)
    } else {
        None
    }
}

/// `{"relevance_score": x}` or the first number, clamped to 0..=1; 0 when absent
fn parse_relevance(reply: &str) -> f32 {
    extract_json_object(reply)
        .and_then(|v| v.get("relevance_score").and_then(|n| n.as_f64()))
        .or_else(|| first_number(reply))
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0) as f32)
        .unwrap_or(0.0)
}

#[async_trait]
impl Agent for SearchAgent {
    type Request = SearchRequest;
    type Response = SearchResponse;
    const NAME: &'static str = "search";

    async fn execute(&self, ctx: &AgentContext, request: SearchRequest) -> Result<SearchResponse> {
        let search = &self.services.config.search;
        check_length("query", request.query.trim(), 1, 1000)?;
        if let Some(n) = request.max_results {
            check_range("max_results", n, 1, search.max_count)?;
        }
        let min_relevance = request.min_relevance.unwrap_or(search.min_relevance);
        check_range("min_relevance", min_relevance, 0.0, 1.0)?;
        if request.sources.is_empty() {
            return Err(Error::Validation("At least one source is required".to_string()));
        }
        if let Some(bad) = request
            .sources
            .iter()
            .find(|s| !KNOWN_SOURCES.contains(&s.as_str()))
        {
            return Err(Error::Validation(format!(
                "Unknown source '{}'; expected one of {}",
                bad,
                KNOWN_SOURCES.join(", ")
            )));
        }

        let session = self
            .services
            .db
            .get_session(&request.session_id, &ctx.user_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(request.session_id.clone()))?;
        let goal = request
            .analysis_goal
            .clone()
            .or(session.analysis_goal)
            .filter(|g| !g.trim().is_empty());

        let mut tokens_used = 0;
        let count = match request.max_results {
            Some(n) => n,
            None => {
                let (n, tokens) = self.requested_count(&request.query).await?;
                tokens_used += tokens;
                n
            }
        };

        let (keywords, tokens) = self.search_query(&request.query, goal.as_deref()).await?;
        tokens_used += tokens;
        info!("Searching {:?} for '{}' ({} wanted)", request.sources, keywords, count);

        let known: HashSet<String> = self
            .services
            .db
            .external_ids_for_session(&session.id)
            .await?
            .into_iter()
            .collect();
        let (candidates, papers_found) = self
            .collect_candidates(
                &request.sources,
                &keywords,
                count * search.candidate_multiplier.max(1),
                &known,
            )
            .await?;

        let current_year = Utc::now().year();
        let pending: Vec<_> = candidates
            .iter()
            .map(|paper| self.rate(paper, &request.query, goal.as_deref()))
            .collect();
        let ratings: Vec<(f32, i64)> = stream::iter(pending)
            .buffered(RATING_CONCURRENCY)
            .collect()
            .await;

        let mut kept: Vec<SearchedPaper> = Vec::new();
        for (paper, (relevance, tokens)) in candidates.into_iter().zip(ratings) {
            tokens_used += tokens;
            if relevance >= min_relevance {
                kept.push(SearchedPaper::rated(paper, relevance, current_year));
            } else {
                debug!("Dropping {} (relevance {:.2})", paper.external_id, relevance);
            }
        }

        sort_by_score(&mut kept, |p| p.final_score);
        let scores: Vec<f32> = kept.iter().map(|p| p.final_score).collect();
        kept.truncate(adaptive_cutoff(&scores).min(count));
        let papers_filtered = kept.len();

        let mut document_ids = Vec::new();
        if request.download {
            for paper in kept.iter_mut() {
                match self.store_pdf(ctx, &session.id, paper).await {
                    Ok(Some(doc_id)) => {
                        paper.downloaded = true;
                        paper.document_id = Some(doc_id.clone());
                        document_ids.push(doc_id);
                    }
                    Ok(None) => debug!("{} has no PDF link", paper.external_id),
                    Err(e) => warn!("Download failed for {}: {}", paper.external_id, e),
                }
            }
        }

        info!(
            "Search kept {} of {} candidates, downloaded {}",
            papers_filtered,
            papers_found,
            document_ids.len()
        );

        Ok(SearchResponse {
            success: true,
            search_query: keywords,
            requested_count: count,
            papers_found,
            papers_filtered,
            papers_downloaded: document_ids.len(),
            papers: kept,
            document_ids,
            tokens_used,
        })
    }

    fn session_of(request: &SearchRequest) -> Option<String> {
        Some(request.session_id.clone())
    }

    fn tokens_of(response: &SearchResponse) -> i64 {
        response.tokens_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::tests::{services, FixedProvider, ScriptedLlm};
    use crate::meta::tests::seed_user;
    use crate::meta::Session;
    use std::sync::Arc;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn paper(id: &str, pdf_base: &str) -> Paper {
        Paper {
            external_id: format!("arxiv:{}", id),
            source: "arxiv".to_string(),
            title: format!("Paper {}", id),
            authors: vec!["A. Author".to_string()],
            abstract_text: "We treat n = 40 mice with 10 mg/kg for 14 days.".to_string(),
            published: Some("2024-01-01".to_string()),
            url: format!("https://arxiv.org/abs/{}", id),
            pdf_url: Some(format!("{}/pdf/{}", pdf_base, id)),
        }
    }

    #[test]
    fn test_parse_requested_count() {
        assert_eq!(parse_requested_count(r#"{"requested_count": 3}"#), Some(3));
        assert_eq!(parse_requested_count("I think 7 papers"), Some(7));
        assert_eq!(parse_requested_count("no idea"), None);
        assert_eq!(parse_requested_count(r#"{"requested_count": 0}"#), None);
    }

    #[test]
    fn test_parse_relevance() {
        assert_eq!(parse_relevance(r#"{"relevance_score": 0.9, "reason": "x"}"#), 0.9);
        assert_eq!(parse_relevance("score: 1.7"), 1.0);
        assert_eq!(parse_relevance("unclear"), 0.0);
    }

    #[tokio::test]
    async fn test_repeat_search_skips_downloaded_papers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/pdf/.*"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 body".to_vec()))
            .mount(&server)
            .await;

        let llm = Arc::new(ScriptedLlm::with_replies(
            r#"{"relevance_score": 0.9}"#,
            &["graphene thermal"],
        ));
        let (mut services, _tmp) = services(llm).await;
        services.providers = vec![Arc::new(FixedProvider {
            papers: vec![paper("2401.00001", &server.uri()), paper("2401.00002", &server.uri())],
        })];
        let user = seed_user(&services.db, "alice").await;
        let session = Session::new(user.id.clone(), "S".to_string(), None);
        services.db.insert_session(&session).await.unwrap();

        let request = SearchRequest {
            query: "graphene thermal conductivity".to_string(),
            session_id: session.id.clone(),
            analysis_goal: None,
            max_results: Some(2),
            min_relevance: None,
            sources: default_sources(),
            download: true,
        };
        let ctx = AgentContext::new(user.id.clone());
        let agent = SearchAgent::new(services.clone());

        let first = agent.execute(&ctx, request.clone()).await.unwrap();
        assert_eq!(first.search_query, "graphene thermal");
        assert_eq!(first.papers_downloaded, 2);
        assert!(first.papers.iter().all(|p| p.downloaded));

        let docs = services
            .db
            .list_session_documents(&session.id, &user.id)
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| !d.is_indexed && d.external_id.is_some()));

        let second = agent.execute(&ctx, request).await.unwrap();
        assert_eq!(second.papers_found, 2);
        assert!(second.papers.is_empty());
        assert_eq!(second.papers_downloaded, 0);
    }

    #[tokio::test]
    async fn test_low_relevance_is_filtered() {
        let llm = Arc::new(ScriptedLlm::with_replies(
            r#"{"relevance_score": 0.2}"#,
            &[r#"{"requested_count": 1}"#, "keywords"],
        ));
        let (mut services, _tmp) = services(llm).await;
        services.providers = vec![Arc::new(FixedProvider {
            papers: vec![paper("2401.00003", "http://127.0.0.1:1")],
        })];
        let user = seed_user(&services.db, "alice").await;
        let session = Session::new(user.id.clone(), "S".to_string(), None);
        services.db.insert_session(&session).await.unwrap();

        let resp = SearchAgent::new(services)
            .execute(
                &AgentContext::new(user.id),
                SearchRequest {
                    query: "one paper on graphene".to_string(),
                    session_id: session.id,
                    analysis_goal: None,
                    max_results: None,
                    min_relevance: None,
                    sources: default_sources(),
                    download: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(resp.requested_count, 1);
        assert_eq!(resp.papers_found, 1);
        assert_eq!(resp.papers_filtered, 0);
    }

    #[tokio::test]
    async fn test_unknown_source_rejected() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("x"))).await;
        let user = seed_user(&services.db, "alice").await;
        let resp = SearchAgent::new(services)
            .execute(
                &AgentContext::new(user.id),
                SearchRequest {
                    query: "q".to_string(),
                    session_id: "missing".to_string(),
                    analysis_goal: None,
                    max_results: None,
                    min_relevance: None,
                    sources: vec!["scholar".to_string()],
                    download: false,
                },
            )
            .await;
        assert!(matches!(resp, Err(Error::Validation(_))));
    }
}
