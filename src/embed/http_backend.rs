use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::embedding_backend::EmbeddingBackendClient;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Embedder backed by the Upstage embeddings API.
///
/// Passages and queries use separate models that share one vector space.
pub struct HttpEmbedder {
    client: EmbeddingBackendClient,
    passage_model: String,
    query_model: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let client = EmbeddingBackendClient::new(&config.base_url, api_key, config.timeout_secs)?;
        Ok(Self {
            client,
            passage_model: config.model.clone(),
            query_model: config.query_model.clone(),
            dimension: config.dimension,
        })
    }

    fn validate_dimensions(&self, model: &str, embeddings: &[Vec<f32>]) -> Result<()> {
        if let Some(mismatch) = embeddings.iter().find(|vec| vec.len() != self.dimension) {
            return Err(Error::Embedding(format!(
                "Embedding dimension mismatch for model '{}': expected {}, got {}",
                model,
                self.dimension,
                mismatch.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.client.embed_text(&self.passage_model, texts).await?;
        self.validate_dimensions(&self.passage_model, &embeddings)?;
        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self
            .client
            .embed_text(&self.query_model, vec![text.to_string()])
            .await?;
        self.validate_dimensions(&self.query_model, &embeddings)?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Embedding("Empty query embedding response".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.passage_model
    }
}
