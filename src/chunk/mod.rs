//! Page-aware token window chunking
//!
//! A token is a whitespace-delimited word. Each page is split on its own,
//! so a chunk never spans two pages, and chunk indexes run across the
//! whole document.

use blake3::Hasher;
use uuid::Uuid;

/// A text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Words of the window joined by single spaces
    pub text: String,

    /// 1-based page the window came from
    pub page_number: usize,

    /// Document-global chunk index (0-based)
    pub index: usize,

    /// Number of words in the window
    pub token_count: usize,
}

impl TextChunk {
    /// Compute a content hash for this chunk
    pub fn compute_hash(&self, document_id: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(document_id.as_bytes());
        hasher.update(&(self.index as u64).to_le_bytes());
        hasher.update(self.text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Deterministic vector-store point ID for this chunk
    pub fn vector_id(&self, document_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.compute_hash(document_id).as_bytes()).to_string()
    }
}

/// Start offsets of the windows over `n` words.
///
/// Overlap is clamped below the window size so the step is always positive.
pub fn window_starts(n: usize, size: usize, overlap: usize) -> Vec<usize> {
    let size = size.max(1);
    let overlap = overlap.min(size - 1);
    let step = (size - overlap).max(1);

    let mut starts = Vec::new();
    let mut start = 0;
    while start < n {
        starts.push(start);
        if start + size >= n {
            break;
        }
        start += step;
    }
    starts
}

/// Split per-page text into overlapping token windows
pub fn chunk_pages(pages: &[String], size: usize, overlap: usize) -> Vec<TextChunk> {
    let mut chunks = Vec::new();

    for (page_idx, page) in pages.iter().enumerate() {
        let words: Vec<&str> = page.split_whitespace().collect();
        for start in window_starts(words.len(), size, overlap) {
            let end = (start + size.max(1)).min(words.len());
            chunks.push(TextChunk {
                text: words[start..end].join(" "),
                page_number: page_idx + 1,
                index: chunks.len(),
                token_count: end - start,
            });
        }
    }

    chunks
}

/// Keep at most the first `max_tokens` words of `text`
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    text.split_whitespace()
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}

/// First `max_chars` characters of `text`, with `...` appended when cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_window_starts() {
        assert_eq!(window_starts(10, 4, 1), vec![0, 3, 6]);
        assert_eq!(window_starts(4, 4, 1), vec![0]);
        assert_eq!(window_starts(0, 4, 1), Vec::<usize>::new());
        // Overlap >= size is clamped to size - 1
        assert_eq!(window_starts(3, 2, 5), vec![0, 1]);
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        let pages = vec![words(1000)];
        let chunks = chunk_pages(&pages, 300, 50);
        // step 250: starts 0, 250, 500, 750 (750 + 300 >= 1000)
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].token_count, 300);
        assert_eq!(chunks[3].token_count, 250);
        assert!(chunks[3].text.ends_with("w999"));
    }

    #[test]
    fn test_overlap_shares_words() {
        let pages = vec![words(10)];
        let chunks = chunk_pages(&pages, 4, 2);
        assert_eq!(chunks[0].text, "w0 w1 w2 w3");
        assert_eq!(chunks[1].text, "w2 w3 w4 w5");
    }

    #[test]
    fn test_pages_and_global_indexes() {
        let pages = vec![words(5), String::new(), "   ".to_string(), words(3)];
        let chunks = chunk_pages(&pages, 4, 1);

        let layout: Vec<(usize, usize)> = chunks.iter().map(|c| (c.index, c.page_number)).collect();
        assert_eq!(layout, vec![(0, 1), (1, 1), (2, 4)]);
    }

    #[test]
    fn test_vector_id_is_stable() {
        let chunk = &chunk_pages(&[words(3)], 10, 0)[0];
        assert_eq!(chunk.vector_id("doc-1"), chunk.vector_id("doc-1"));
        assert_ne!(chunk.vector_id("doc-1"), chunk.vector_id("doc-2"));
        assert!(Uuid::parse_str(&chunk.vector_id("doc-1")).is_ok());
    }

    #[test]
    fn test_truncate_and_excerpt() {
        assert_eq!(truncate_to_tokens("a  b\nc d", 3), "a b c");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
    }
}
