//! Vector storage
//!
//! This module provides:
//! - The [`VectorStore`] trait used by the agents
//! - A Qdrant implementation for production
//! - An in-memory implementation for local runs and tests

mod memory;
mod payload;
mod qdrant;

pub use memory::MemoryStore;
pub use payload::*;
pub use qdrant::QdrantStore;

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Search result
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Search filter options
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict hits to these documents
    pub document_ids: Option<Vec<String>>,
}

impl SearchFilter {
    pub fn documents(ids: &[String]) -> Self {
        Self {
            document_ids: Some(ids.to_vec()),
        }
    }

    /// Whether a payload passes this filter
    pub fn matches(&self, payload: &ChunkPayload) -> bool {
        match self.document_ids {
            Some(ref ids) => ids.iter().any(|id| *id == payload.document_id),
            None => true,
        }
    }
}

/// Trait for vector stores
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ensure the collection exists with the configured dimension
    async fn ensure_collection(&self) -> Result<()>;

    async fn upsert_points(&self, points: Vec<ChunkPoint>) -> Result<()>;

    async fn delete_points(&self, point_ids: &[Uuid]) -> Result<()>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Number of stored points
    async fn count(&self) -> Result<usize>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Create the configured vector store
pub async fn create_store(config: &Config) -> Result<Box<dyn VectorStore>> {
    match config.vector.backend.as_str() {
        "qdrant" => {
            let store = QdrantStore::connect(config).await?;
            Ok(Box::new(store))
        }
        "memory" => Ok(Box::new(MemoryStore::new(config.embedding.dimension))),
        other => Err(Error::Config(format!(
            "Unsupported vector backend '{}'; expected 'qdrant' or 'memory'",
            other
        ))),
    }
}

/// Parse stored vector IDs, skipping any that are not UUIDs
pub fn parse_point_ids(ids: &[String]) -> Vec<Uuid> {
    ids.iter().filter_map(|id| Uuid::try_parse(id).ok()).collect()
}

fn check_dimensions(points: &[ChunkPoint], dimension: usize, target: &str) -> Result<()> {
    if let Some(mismatch) = points.iter().find(|p| p.vector.len() != dimension) {
        return Err(Error::Qdrant(format!(
            "Vector dimension mismatch for collection '{}': expected {} (got {})",
            target,
            dimension,
            mismatch.vector.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let payload = ChunkPayload {
            session_id: Some("s1".to_string()),
            document_id: "d1".to_string(),
            ..ChunkPayload::default()
        };

        assert!(SearchFilter::default().matches(&payload));
        assert!(SearchFilter::documents(&["d0".into(), "d1".into()]).matches(&payload));
        assert!(!SearchFilter::documents(&["d2".into()]).matches(&payload));
        assert!(!SearchFilter::documents(&[]).matches(&payload));
    }

    #[test]
    fn test_parse_point_ids_skips_garbage() {
        let good = Uuid::new_v4();
        let ids = parse_point_ids(&[good.to_string(), "nope".to_string()]);
        assert_eq!(ids, vec![good]);
    }
}
