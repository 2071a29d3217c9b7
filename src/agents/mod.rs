//! Research agents
//!
//! Each agent turns one typed request into one typed response. Agents are
//! invoked through [`run_agent`], which times the call and writes an
//! [`AgentLog`] row whatever the outcome.

mod analysis;
mod chat;
mod embedding;
mod report;
mod search;

pub use analysis::{AnalysisAgent, AnalysisRequest, AnalysisResponse, Citation};
pub use chat::{ChatAgent, ChatRequest, ChatResponse, ChatUsage};
pub use embedding::{EmbeddingAgent, EmbeddingRequest, EmbeddingResponse};
pub use report::{
    render_markdown, ReportAgent, ReportContent, ReportRequest, ReportResponse, ReportSection,
    TopicAnalysisAgent, TopicAnalysisRequest, TopicAnalysisResponse, REPORT_TYPES,
};
pub use search::{SearchAgent, SearchRequest, SearchResponse, SearchedPaper};

use crate::config::Config;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::llm::LlmProvider;
use crate::meta::{AgentLog, AgentStatus, MetaDb};
use crate::papers::PaperProvider;
use crate::parse::TextExtractor;
use crate::store::VectorStore;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Shared handles every agent works with
#[derive(Clone)]
pub struct Services {
    pub db: MetaDb,
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub extractor: Arc<dyn TextExtractor>,
    pub providers: Vec<Arc<dyn PaperProvider>>,
    /// Client for PDF downloads
    pub http: reqwest::Client,
    pub upload_dir: PathBuf,
}

/// Who is calling an agent
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub user_id: String,
}

impl AgentContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// A research agent
#[async_trait]
pub trait Agent: Send + Sync {
    type Request: Serialize + Send + Sync;
    type Response: Serialize + Send;

    /// Name recorded in agent logs
    const NAME: &'static str;

    async fn execute(&self, ctx: &AgentContext, request: Self::Request) -> Result<Self::Response>;

    /// Session the request concerns, for the audit row
    fn session_of(_request: &Self::Request) -> Option<String> {
        None
    }

    /// Document the request concerns, for the audit row
    fn document_of(_request: &Self::Request) -> Option<String> {
        None
    }

    /// Tokens the call consumed
    fn tokens_of(_response: &Self::Response) -> i64 {
        0
    }
}

/// Execute `agent` and record the outcome.
///
/// A failure to write the log row is reported but never replaces the
/// agent's own result.
pub async fn run_agent<A: Agent>(
    agent: &A,
    db: &MetaDb,
    ctx: &AgentContext,
    request: A::Request,
) -> Result<A::Response> {
    let mut log = AgentLog::new(A::NAME, AgentStatus::Success, 0);
    log.user_id = Some(ctx.user_id.clone());
    log.session_id = A::session_of(&request);
    log.document_id = A::document_of(&request);
    log.input_json = serde_json::to_string(&request).ok();

    let start = Instant::now();
    let result = agent.execute(ctx, request).await;
    log.execution_time_ms = start.elapsed().as_millis() as i64;

    match &result {
        Ok(response) => {
            log.tokens_used = A::tokens_of(response);
            log.output_json = serde_json::to_string(response).ok();
        }
        Err(e) => {
            log.status = AgentStatus::Error.to_string();
            log.error_message = Some(e.to_string());
        }
    }

    debug!(
        agent = A::NAME,
        status = %log.status,
        elapsed_ms = log.execution_time_ms,
        tokens = log.tokens_used,
        "Agent finished"
    );

    if let Err(e) = db.insert_agent_log(&log).await {
        warn!("Failed to record {} agent log: {}", A::NAME, e);
    }

    result
}

/// Check a text field's character count against inclusive bounds
pub(crate) fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(Error::Validation(format!(
            "{} must be between {} and {} characters (got {})",
            field, min, max, len
        )));
    }
    Ok(())
}

/// Check a numeric field against inclusive bounds
pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(Error::Validation(format!(
            "{} must be between {} and {} (got {})",
            field, min, max, value
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embed::Embedder;
    use crate::llm::{CompletionRequest, CompletionResponse, TokenUsage};
    use crate::meta::tests::{seed_user, setup_test_db};
    use crate::papers::Paper;
    use crate::store::MemoryStore;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    pub(crate) const DIM: usize = 8;

    /// LLM stub replying from a queue, then with a fixed fallback
    pub(crate) struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        fallback: String,
        pub(crate) prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(fallback: &str) -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: fallback.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_replies(fallback: &str, replies: &[&str]) -> Self {
            let llm = Self::new(fallback);
            llm.replies
                .lock()
                .unwrap()
                .extend(replies.iter().map(|r| r.to_string()));
            llm
        }

        pub(crate) fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.prompts.lock().unwrap().push(request);
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            Ok(CompletionResponse {
                content,
                model: "stub-model".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
                finish_reason: Some("stop".to_string()),
            })
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    /// Bag-of-letters embedder: texts sharing words land close together
    pub(crate) struct LetterEmbedder;

    pub(crate) fn letter_vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        for b in text.to_lowercase().bytes().filter(u8::is_ascii_lowercase) {
            v[(b - b'a') as usize % DIM] += 1.0;
        }
        v
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| letter_vector(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(letter_vector(text))
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn model_name(&self) -> &str {
            "letters"
        }
    }

    /// Treats the file bytes as UTF-8 with pages split on form feeds
    pub(crate) struct PlainTextExtractor;

    #[async_trait]
    impl TextExtractor for PlainTextExtractor {
        async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<String>> {
            let text = String::from_utf8_lossy(&bytes).to_string();
            Ok(text.split('\u{c}').map(str::to_string).collect())
        }
    }

    pub(crate) struct FixedProvider {
        pub(crate) papers: Vec<Paper>,
    }

    #[async_trait]
    impl PaperProvider for FixedProvider {
        async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<Paper>> {
            Ok(self.papers.iter().take(max_results).cloned().collect())
        }

        fn name(&self) -> &str {
            "arxiv"
        }
    }

    pub(crate) async fn services(llm: Arc<dyn LlmProvider>) -> (Services, TempDir) {
        let (db, tmp) = setup_test_db().await;
        let mut config = Config::default();
        config.embedding.dimension = DIM;
        config.chunk.chunk_tokens = 500;
        let services = Services {
            db,
            config: Arc::new(config),
            llm,
            embedder: Arc::new(LetterEmbedder),
            store: Arc::new(MemoryStore::new(DIM)),
            extractor: Arc::new(PlainTextExtractor),
            providers: Vec::new(),
            http: reqwest::Client::new(),
            upload_dir: tmp.path().join("uploads"),
        };
        (services, tmp)
    }

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        type Request = String;
        type Response = String;
        const NAME: &'static str = "echo";

        async fn execute(&self, _ctx: &AgentContext, request: String) -> Result<String> {
            if request.is_empty() {
                return Err(Error::Validation("empty".to_string()));
            }
            Ok(request)
        }

        fn tokens_of(response: &String) -> i64 {
            response.len() as i64
        }
    }

    #[tokio::test]
    async fn test_run_agent_logs_success_and_error() {
        let (db, _tmp) = setup_test_db().await;
        let user = seed_user(&db, "alice").await;
        let ctx = AgentContext::new(user.id);

        assert_eq!(run_agent(&EchoAgent, &db, &ctx, "abc".into()).await.unwrap(), "abc");
        assert!(run_agent(&EchoAgent, &db, &ctx, String::new()).await.is_err());

        let logs = db.list_agent_logs(Some("echo"), 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        let ok = logs.iter().find(|l| l.status == "success").unwrap();
        assert_eq!(ok.tokens_used, 3);
        let failed = logs.iter().find(|l| l.status == "error").unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("empty"));
    }

    #[test]
    fn test_bounds_checks() {
        assert!(check_length("query", "abc", 1, 3).is_ok());
        assert!(check_length("query", "", 1, 3).is_err());
        assert!(check_range("top_k", 21, 1, 20).is_err());
        assert!(check_range("min_relevance", 0.5, 0.0, 1.0).is_ok());
    }
}
