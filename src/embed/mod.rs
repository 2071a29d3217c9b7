//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - The Upstage HTTP backend
//! - Batch processing for long documents

mod http_backend;

pub use http_backend::*;

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of passages
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    let embedder = HttpEmbedder::new(&config.embedding, config.embedding_api_key()?)?;
    Ok(Box::new(embedder))
}

/// Embed `texts` in batches of `batch_size`, checking that every input got a vector
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let expected = texts.len();
    let mut all_embeddings = Vec::with_capacity(expected);

    for (i, chunk) in texts.chunks(batch_size.max(1)).enumerate() {
        debug!("Embedding batch {} ({} texts)", i, chunk.len());
        let embeddings = embedder.embed(chunk.to_vec()).await?;
        all_embeddings.extend(embeddings);
    }

    if all_embeddings.len() != expected {
        return Err(Error::Embedding(format!(
            "Embedding count mismatch: {} texts, {} vectors",
            expected,
            all_embeddings.len()
        )));
    }

    Ok(all_embeddings)
}
