//! Result ranking
//!
//! This module handles:
//! - Score filtering and document-set restriction of vector hits
//! - Largest-gap cutoff for scored candidate lists

use crate::store::SearchResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Smallest score drop that triggers [`adaptive_cutoff`]
pub const MIN_CUTOFF_GAP: f32 = 0.15;

/// A vector hit that survived ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    /// Vector-store point ID (joins to `chunks.vector_id`)
    pub id: String,
    pub score: f32,
    pub document_id: String,
    pub title: String,
    pub page_number: i64,
    pub chunk_index: i64,
}

impl From<SearchResult> for RankedResult {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.id,
            score: result.score,
            document_id: result.payload.document_id,
            title: result.payload.title,
            page_number: result.payload.page_number,
            chunk_index: result.payload.chunk_index,
        }
    }
}

/// Filters and orders vector hits for retrieval-augmented answers
pub struct Ranker {
    min_score: f32,
    top_k: usize,
}

impl Ranker {
    pub fn new(min_score: f32, top_k: usize) -> Self {
        Self { min_score, top_k }
    }

    /// Keep hits at or above `min_score` whose document is in `allowed`,
    /// best first, at most `top_k`.
    ///
    /// The document check is repeated here even though the store was given
    /// the same filter.
    pub fn rank(&self, results: Vec<SearchResult>, allowed: &[String]) -> Vec<RankedResult> {
        let allowed: HashSet<&str> = allowed.iter().map(String::as_str).collect();

        let mut ranked: Vec<RankedResult> = results
            .into_iter()
            .filter(|r| r.score >= self.min_score)
            .filter(|r| allowed.contains(r.payload.document_id.as_str()))
            .map(RankedResult::from)
            .collect();

        sort_by_score(&mut ranked, |r| r.score);
        ranked.truncate(self.top_k);
        ranked
    }
}

/// Sort descending by `score`; NaN sorts as equal
pub fn sort_by_score<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
}

/// Number of leading items to keep from a descending score list.
///
/// Cuts at the largest drop between neighbours when that drop is at least
/// [`MIN_CUTOFF_GAP`]; at least one item is always kept.
pub fn adaptive_cutoff(scores: &[f32]) -> usize {
    if scores.len() < 2 {
        return scores.len();
    }

    let (idx, gap) = scores
        .windows(2)
        .enumerate()
        .map(|(i, w)| (i, w[0] - w[1]))
        .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if gap >= MIN_CUTOFF_GAP {
        idx + 1
    } else {
        scores.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkPayload;

    fn make_search_result(id: &str, score: f32, document_id: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            score,
            payload: ChunkPayload {
                document_id: document_id.to_string(),
                page_number: 1,
                ..ChunkPayload::default()
            },
        }
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let ranker = Ranker::new(0.0, 2);
        let results = vec![
            make_search_result("1", 0.5, "d"),
            make_search_result("2", 0.9, "d"),
            make_search_result("3", 0.7, "d"),
        ];

        let ranked = ranker.rank(results, &["d".to_string()]);
        let ids: Vec<_> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_rank_drops_low_scores_and_foreign_documents() {
        let ranker = Ranker::new(0.6, 10);
        let results = vec![
            make_search_result("1", 0.95, "outside"),
            make_search_result("2", 0.55, "inside"),
            make_search_result("3", 0.6, "inside"),
        ];

        let ranked = ranker.rank(results, &["inside".to_string()]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "3");
    }

    #[test]
    fn test_adaptive_cutoff() {
        assert_eq!(adaptive_cutoff(&[]), 0);
        assert_eq!(adaptive_cutoff(&[0.9]), 1);
        // Largest gap 0.3 after the second item
        assert_eq!(adaptive_cutoff(&[0.95, 0.9, 0.6, 0.55]), 2);
        // No gap reaches the threshold
        assert_eq!(adaptive_cutoff(&[0.9, 0.85, 0.8, 0.75]), 4);
        // Gap right after the first item still keeps one
        assert_eq!(adaptive_cutoff(&[0.99, 0.7, 0.69]), 1);
    }
}
