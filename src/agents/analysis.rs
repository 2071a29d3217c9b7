//! Retrieval-augmented question answering over selected documents

use super::{check_length, check_range, Agent, AgentContext, Services};
use crate::chunk::excerpt;
use crate::error::{Error, Result};
use crate::llm::CompletionRequest;
use crate::meta::{ChatMessage, Document, MessageRole};
use crate::rank::Ranker;
use crate::store::SearchFilter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

const EXCERPT_CHARS: usize = 200;
const CONTEXT_SEPARATOR: &str = "\n---\n";
const DEFAULT_TEMPERATURE: f32 = 0.3;

pub const NO_RELEVANT_CONTENT: &str =
    "No relevant content was found in the selected documents for this question.";

const SYSTEM_PROMPT: &str = "You are a research assistant that analyzes scientific papers. \
Answer the question using only the numbered document excerpts provided. \
Cite every claim with the excerpt number in square brackets, e.g. [1]. \
If the excerpts do not contain the answer, say so plainly instead of guessing.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub min_relevance: Option<f32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the context block
    pub index: usize,
    pub document_id: String,
    pub document_title: String,
    pub page_number: i64,
    pub excerpt: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub documents_analyzed: usize,
    pub chunks_retrieved: usize,
    pub tokens_used: i64,
    pub model: String,
    /// Assistant history row, when the analysis ran inside a session
    #[serde(default)]
    pub message_id: Option<String>,
}

/// A retrieved chunk joined to its document
struct Passage {
    document_id: String,
    title: String,
    page_number: i64,
    text: String,
    score: f32,
}

pub struct AnalysisAgent {
    services: Services,
}

impl AnalysisAgent {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// The caller's documents among `ids`; deleted or foreign ids drop out
    async fn load_documents(&self, user_id: &str, ids: &[String]) -> Result<Vec<Document>> {
        let docs = self.services.db.get_documents_by_ids(user_id, ids).await?;
        if docs.len() < ids.len() {
            debug!("{} of {} selected documents unavailable", ids.len() - docs.len(), ids.len());
        }
        Ok(docs)
    }

    async fn retrieve(
        &self,
        query: &str,
        docs: &[Document],
        top_k: usize,
        min_relevance: f32,
    ) -> Result<Vec<Passage>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let query_vector = self.services.embedder.embed_query(query).await?;
        let hits = self
            .services
            .store
            .search(
                query_vector,
                top_k * ids.len(),
                Some(SearchFilter::documents(&ids)),
            )
            .await?;
        debug!("Vector search returned {} hits", hits.len());

        let titles: HashMap<&str, &str> = docs
            .iter()
            .map(|d| (d.id.as_str(), d.title.as_str()))
            .collect();

        let mut passages = Vec::new();
        for hit in Ranker::new(min_relevance, top_k).rank(hits, &ids) {
            let Some(chunk) = self.services.db.get_chunk_by_vector_id(&hit.id).await? else {
                debug!("Dropping hit {} with no chunk row", hit.id);
                continue;
            };
            let title = titles
                .get(hit.document_id.as_str())
                .map(|t| t.to_string())
                .unwrap_or(hit.title);
            passages.push(Passage {
                document_id: chunk.document_id,
                title,
                page_number: chunk.page_number,
                text: chunk.text,
                score: hit.score,
            });
        }
        Ok(passages)
    }
}

/// Number each passage and join them into one context block
fn build_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}, p.{}\n{}", i + 1, p.title, p.page_number, p.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn build_prompt(query: &str, context: &str, goal: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(goal) = goal {
        prompt.push_str(&format!("[Analysis goal]\n{}\n\n", goal));
    }
    prompt.push_str(&format!(
        "[Question]\n{}\n\n[Document excerpts]\n{}\n\nAnswer the question from these excerpts, citing them by number.",
        query, context
    ));
    prompt
}

#[async_trait]
impl Agent for AnalysisAgent {
    type Request = AnalysisRequest;
    type Response = AnalysisResponse;
    const NAME: &'static str = "analysis";

    async fn execute(&self, ctx: &AgentContext, request: AnalysisRequest) -> Result<AnalysisResponse> {
        let config = &self.services.config.analysis;
        check_length("query", request.query.trim(), 1, 4000)?;
        if request.document_ids.is_empty() {
            return Err(Error::Validation("No documents selected".to_string()));
        }
        let top_k = request.top_k.unwrap_or(config.top_k);
        check_range("top_k", top_k, 1, 20)?;
        let min_relevance = request.min_relevance.unwrap_or(config.min_relevance);
        check_range("min_relevance", min_relevance, 0.0, 1.0)?;

        let mut ids = request.document_ids.clone();
        ids.sort();
        ids.dedup();

        let db = &self.services.db;
        let session = match &request.session_id {
            Some(session_id) => Some(
                db.get_session(session_id, &ctx.user_id)
                    .await?
                    .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?,
            ),
            None => None,
        };
        let goal = session
            .as_ref()
            .and_then(|s| s.analysis_goal.clone())
            .filter(|g| !g.trim().is_empty());

        if let Some(session) = &session {
            let question = ChatMessage::new(
                session.id.clone(),
                ctx.user_id.clone(),
                MessageRole::User,
                request.query.clone(),
            );
            db.insert_message(&question).await?;
        }

        let docs = self.load_documents(&ctx.user_id, &ids).await?;
        let passages = self
            .retrieve(&request.query, &docs, top_k, min_relevance)
            .await?;

        info!(
            "Analysis over {} documents retrieved {} passages",
            docs.len(),
            passages.len()
        );

        let mut response = if passages.is_empty() {
            AnalysisResponse {
                success: true,
                answer: NO_RELEVANT_CONTENT.to_string(),
                citations: Vec::new(),
                documents_analyzed: docs.len(),
                chunks_retrieved: 0,
                tokens_used: 0,
                model: self.services.llm.model().to_string(),
                message_id: None,
            }
        } else {
            let context = build_context(&passages);
            let completion = self
                .services
                .llm
                .complete(
                    CompletionRequest::prompt(
                        SYSTEM_PROMPT,
                        build_prompt(&request.query, &context, goal.as_deref()),
                    )
                    .temperature(request.temperature.unwrap_or(DEFAULT_TEMPERATURE))
                    .max_tokens(request.max_tokens.unwrap_or(config.max_tokens)),
                )
                .await?;

            let citations = passages
                .iter()
                .enumerate()
                .map(|(i, p)| Citation {
                    index: i + 1,
                    document_id: p.document_id.clone(),
                    document_title: p.title.clone(),
                    page_number: p.page_number,
                    excerpt: excerpt(&p.text, EXCERPT_CHARS),
                    score: p.score,
                })
                .collect();

            AnalysisResponse {
                success: true,
                answer: completion.content,
                citations,
                documents_analyzed: docs.len(),
                chunks_retrieved: passages.len(),
                tokens_used: completion.usage.total_tokens as i64,
                model: completion.model,
                message_id: None,
            }
        };

        if let Some(session) = &session {
            let mut reply = ChatMessage::new(
                session.id.clone(),
                ctx.user_id.clone(),
                MessageRole::Assistant,
                response.answer.clone(),
            );
            reply.model = Some(response.model.clone());
            reply.total_tokens = Some(response.tokens_used);
            db.insert_message(&reply).await?;
            db.touch_session(&session.id).await?;
            response.message_id = Some(reply.id);
        }

        Ok(response)
    }

    fn session_of(request: &AnalysisRequest) -> Option<String> {
        request.session_id.clone()
    }

    fn tokens_of(response: &AnalysisResponse) -> i64 {
        response.tokens_used
    }
}
