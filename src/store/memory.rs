//! In-process vector store with brute-force cosine search

use super::{check_dimensions, ChunkPayload, ChunkPoint, SearchFilter, SearchResult, VectorStore};
use crate::error::Result;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Vectors kept in a map; contents are lost on restart
pub struct MemoryStore {
    dimension: usize,
    points: RwLock<HashMap<Uuid, (Vec<f32>, ChunkPayload)>>,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: RwLock::new(HashMap::new()),
        }
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<ChunkPoint>) -> Result<()> {
        check_dimensions(&points, self.dimension, "memory")?;
        let mut guard = self.points.write().await;
        for point in points {
            guard.insert(point.id, (point.vector, point.payload));
        }
        Ok(())
    }

    async fn delete_points(&self, point_ids: &[Uuid]) -> Result<()> {
        let mut guard = self.points.write().await;
        for id in point_ids {
            guard.remove(id);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<SearchResult>> {
        let guard = self.points.read().await;
        let mut results: Vec<SearchResult> = guard
            .iter()
            .filter(|(_, (_, payload))| filter.as_ref().map_or(true, |f| f.matches(payload)))
            .map(|(id, (vector, payload))| SearchResult {
                id: id.to_string(),
                score: cosine_similarity(&query_vector, vector),
                payload: payload.clone(),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.points.read().await.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
