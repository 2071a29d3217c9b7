//! PDF embedding agent: extract, chunk, embed, summarize

use super::{check_range, Agent, AgentContext, Services};
use crate::chunk::{chunk_pages, truncate_to_tokens};
use crate::embed::embed_in_batches;
use crate::error::{Error, Result};
use crate::llm::CompletionRequest;
use crate::meta::Chunk;
use crate::store::{parse_point_ids, ChunkPayload, ChunkPoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Leading text handed to the summarizer
const SUMMARY_INPUT_TOKENS: usize = 2000;
/// Characters kept when the summarizer returns nothing
const FALLBACK_SUMMARY_CHARS: usize = 500;

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize academic papers for researchers. \
Write a concise summary covering the research question, methods, key findings, \
and conclusions. Use plain prose without headings.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub document_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Tokens per chunk; the configured default when absent
    #[serde(default)]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub success: bool,
    pub document_id: String,
    pub chunk_count: usize,
    pub embedding_count: usize,
    pub page_count: usize,
    pub summary: String,
    pub status: String,
    pub tokens_used: i64,
}

/// Turns an uploaded PDF into searchable chunks
pub struct EmbeddingAgent {
    services: Services,
}

impl EmbeddingAgent {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    async fn summarize(&self, full_text: &str) -> Result<(String, i64)> {
        let leading = truncate_to_tokens(full_text, SUMMARY_INPUT_TOKENS);
        let request = CompletionRequest::prompt(
            SUMMARY_SYSTEM_PROMPT,
            format!("Summarize the following paper:\n\n{}", leading),
        )
        .temperature(0.2)
        .max_tokens(800);

        let response = self.services.llm.complete(request).await?;
        let tokens = response.usage.total_tokens as i64;
        let summary = response.content.trim();

        if summary.is_empty() {
            warn!("Summarizer returned no text; using leading text instead");
            let fallback: String = full_text.trim().chars().take(FALLBACK_SUMMARY_CHARS).collect();
            return Ok((fallback, tokens));
        }
        Ok((summary.to_string(), tokens))
    }
}

#[async_trait]
impl Agent for EmbeddingAgent {
    type Request = EmbeddingRequest;
    type Response = EmbeddingResponse;
    const NAME: &'static str = "embedding";

    async fn execute(&self, ctx: &AgentContext, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let chunk_config = &self.services.config.chunk;
        let chunk_size = request.chunk_size.unwrap_or(chunk_config.chunk_tokens);
        check_range(
            "chunk_size",
            chunk_size,
            chunk_config.min_tokens,
            chunk_config.max_tokens,
        )?;

        let db = &self.services.db;
        let doc = db
            .get_document(&request.document_id, &ctx.user_id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(request.document_id.clone()))?;

        info!("Embedding document {} ({})", doc.id, doc.file_name);

        let bytes = tokio::fs::read(&doc.file_path).await?;
        let pages = self.services.extractor.extract_pages(bytes).await?;
        let full_text = pages.join("\n\n");
        if full_text.trim().is_empty() {
            return Err(Error::Parse(format!(
                "No text could be extracted from {}",
                doc.file_name
            )));
        }

        let text_chunks = chunk_pages(&pages, chunk_size, chunk_config.overlap_tokens);
        debug!(
            "Split {} pages into {} chunks (size {}, overlap {})",
            pages.len(),
            text_chunks.len(),
            chunk_size,
            chunk_config.overlap_tokens
        );

        let texts: Vec<String> = text_chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embed_in_batches(
            self.services.embedder.as_ref(),
            texts,
            self.services.config.embedding.batch_size,
        )
        .await?;

        let (summary, tokens_used) = self.summarize(&full_text).await?;
        let previous = parse_point_ids(&db.vector_ids_for_document(&doc.id).await?);

        let session_id = request.session_id.clone().or_else(|| doc.session_id.clone());
        let model = self.services.embedder.model_name().to_string();
        let mut points = Vec::with_capacity(text_chunks.len());
        let mut rows = Vec::with_capacity(text_chunks.len());

        for (chunk, vector) in text_chunks.iter().zip(embeddings) {
            let vector_id = chunk.vector_id(&doc.id);
            let point_id = Uuid::try_parse(&vector_id)
                .map_err(|e| Error::Other(format!("Invalid vector id {}: {}", vector_id, e)))?;

            points.push(ChunkPoint {
                id: point_id,
                vector,
                payload: ChunkPayload {
                    session_id: session_id.clone(),
                    document_id: doc.id.clone(),
                    page_number: chunk.page_number as i64,
                    chunk_index: chunk.index as i64,
                    title: doc.title.clone(),
                    file_name: doc.file_name.clone(),
                },
            });

            let mut row = Chunk::new(
                doc.id.clone(),
                chunk.index as i64,
                chunk.page_number as i64,
                chunk.text.clone(),
                chunk.token_count as i64,
                vector_id,
            );
            row.embedding_model = Some(model.clone());
            rows.push(row);
        }

        let embedding_count = points.len();
        let current: HashSet<Uuid> = points.iter().map(|p| p.id).collect();
        if !points.is_empty() {
            self.services.store.upsert_points(points).await?;
        }
        db.replace_chunks(&doc.id, &rows).await?;
        db.mark_document_indexed(&doc.id, pages.len() as i64, &summary)
            .await?;

        // Chunk ids are deterministic, so only ids missing from this run are stale
        let stale: Vec<Uuid> = previous
            .into_iter()
            .filter(|id| !current.contains(id))
            .collect();
        if !stale.is_empty() {
            debug!("Removing {} stale vectors for {}", stale.len(), doc.id);
            if let Err(e) = self.services.store.delete_points(&stale).await {
                warn!("Failed to remove stale vectors for {}: {}", doc.id, e);
            }
        }

        info!(
            "Indexed document {}: {} pages, {} chunks",
            doc.id,
            pages.len(),
            rows.len()
        );

        Ok(EmbeddingResponse {
            success: true,
            document_id: doc.id,
            chunk_count: rows.len(),
            embedding_count,
            page_count: pages.len(),
            summary,
            status: "completed".to_string(),
            tokens_used,
        })
    }

    fn session_of(request: &EmbeddingRequest) -> Option<String> {
        request.session_id.clone()
    }

    fn document_of(request: &EmbeddingRequest) -> Option<String> {
        Some(request.document_id.clone())
    }

    fn tokens_of(response: &EmbeddingResponse) -> i64 {
        response.tokens_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::tests::{services, ScriptedLlm};
    use crate::meta::tests::seed_user;
    use crate::meta::Document;
    use std::sync::Arc;

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn stored_document(services: &Services, user_id: &str, body: &str) -> Document {
        let path = services.upload_dir.join("paper.pdf");
        tokio::fs::create_dir_all(&services.upload_dir).await.unwrap();
        tokio::fs::write(&path, body).await.unwrap();
        let doc = Document::new(
            user_id.to_string(),
            None,
            "Paper".to_string(),
            "paper.pdf".to_string(),
            path.to_string_lossy().to_string(),
            body.len() as i64,
        );
        services.db.insert_document(&doc).await.unwrap();
        doc
    }

    #[tokio::test]
    async fn test_embeds_pages_and_summarizes() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("A short summary."))).await;
        let user = seed_user(&services.db, "alice").await;
        // page 1: 1200 words -> windows at 0, 350, 700; page 2: 10 words -> 1 window
        let body = format!("{}\u{c}{}", words("a", 1200), words("b", 10));
        let doc = stored_document(&services, &user.id, &body).await;

        let agent = EmbeddingAgent::new(services.clone());
        let resp = agent
            .execute(
                &AgentContext::new(user.id.clone()),
                EmbeddingRequest {
                    document_id: doc.id.clone(),
                    session_id: None,
                    chunk_size: Some(500),
                },
            )
            .await
            .unwrap();

        assert_eq!(resp.page_count, 2);
        assert_eq!(resp.chunk_count, 4);
        assert_eq!(resp.embedding_count, 4);
        assert_eq!(resp.summary, "A short summary.");
        assert_eq!(services.store.count().await.unwrap(), 4);

        let chunks = services.db.get_chunks(&doc.id).await.unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].page_number, 2);
        assert_eq!(chunks[2].token_count, 500);

        let reloaded = services
            .db
            .get_document(&doc.id, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.is_indexed);
        assert_eq!(reloaded.page_count, 2);
    }

    #[tokio::test]
    async fn test_reembedding_replaces_vectors() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("Summary."))).await;
        let user = seed_user(&services.db, "alice").await;
        let doc = stored_document(&services, &user.id, &words("w", 900)).await;
        let agent = EmbeddingAgent::new(services.clone());
        let ctx = AgentContext::new(user.id.clone());

        for size in [500, 1000] {
            agent
                .execute(
                    &ctx,
                    EmbeddingRequest {
                        document_id: doc.id.clone(),
                        session_id: None,
                        chunk_size: Some(size),
                    },
                )
                .await
                .unwrap();
        }

        assert_eq!(services.db.get_chunks(&doc.id).await.unwrap().len(), 1);
        assert_eq!(services.store.count().await.unwrap(), 1);
    }

    struct DownLlm;

    #[async_trait]
    impl crate::llm::LlmProvider for DownLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<crate::llm::CompletionResponse> {
            Err(Error::Llm("service unavailable".to_string()))
        }

        fn model(&self) -> &str {
            "down"
        }
    }

    #[tokio::test]
    async fn test_failed_reembedding_keeps_indexed_vectors() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("Summary."))).await;
        let user = seed_user(&services.db, "alice").await;
        let doc = stored_document(&services, &user.id, &words("w", 900)).await;
        let ctx = AgentContext::new(user.id.clone());
        let request = EmbeddingRequest {
            document_id: doc.id.clone(),
            session_id: None,
            chunk_size: Some(500),
        };

        EmbeddingAgent::new(services.clone())
            .execute(&ctx, request.clone())
            .await
            .unwrap();
        let indexed = services.store.count().await.unwrap();
        assert_eq!(indexed, 3);

        let mut broken = services.clone();
        broken.llm = Arc::new(DownLlm);
        let mut resize = request;
        resize.chunk_size = Some(1000);
        assert!(matches!(
            EmbeddingAgent::new(broken).execute(&ctx, resize).await,
            Err(Error::Llm(_))
        ));

        let chunks = services.db.get_chunks(&doc.id).await.unwrap();
        assert_eq!(chunks.len(), indexed);
        assert_eq!(services.store.count().await.unwrap(), indexed);
    }

    #[tokio::test]
    async fn test_empty_summary_falls_back_to_text() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("   "))).await;
        let user = seed_user(&services.db, "alice").await;
        let doc = stored_document(&services, &user.id, "Graphene conducts heat well.").await;

        let resp = EmbeddingAgent::new(services)
            .execute(
                &AgentContext::new(user.id),
                EmbeddingRequest {
                    document_id: doc.id,
                    session_id: None,
                    chunk_size: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.summary, "Graphene conducts heat well.");
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("s"))).await;
        let alice = seed_user(&services.db, "alice").await;
        let bob = seed_user(&services.db, "bob").await;
        let blank = stored_document(&services, &alice.id, "  \u{c}  ").await;
        let agent = EmbeddingAgent::new(services);

        let too_small = EmbeddingRequest {
            document_id: blank.id.clone(),
            session_id: None,
            chunk_size: Some(100),
        };
        assert!(matches!(
            agent.execute(&AgentContext::new(alice.id.clone()), too_small).await,
            Err(Error::Validation(_))
        ));

        let request = EmbeddingRequest {
            document_id: blank.id.clone(),
            session_id: None,
            chunk_size: None,
        };
        assert!(matches!(
            agent.execute(&AgentContext::new(bob.id), request.clone()).await,
            Err(Error::DocumentNotFound(_))
        ));
        assert!(matches!(
            agent.execute(&AgentContext::new(alice.id), request).await,
            Err(Error::Parse(_))
        ));
    }
}
