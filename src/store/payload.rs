//! Payload schema for vector points

use qdrant_client::qdrant::{PointStruct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// A point ready to be upserted
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl ChunkPoint {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> PointStruct {
        let payload_map = self.payload.to_qdrant_payload();
        PointStruct::new(self.id.to_string(), self.vector, payload_map)
    }
}

/// Payload stored with each chunk vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Session the document belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    pub document_id: String,

    /// 1-based page number
    #[serde(default)]
    pub page_number: i64,

    /// Chunk index within the document
    #[serde(default)]
    pub chunk_index: i64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub file_name: String,
}

impl ChunkPayload {
    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(self) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();

        map.insert("document_id".to_string(), string_to_qdrant(&self.document_id));
        map.insert("page_number".to_string(), int_to_qdrant(self.page_number));
        map.insert("chunk_index".to_string(), int_to_qdrant(self.chunk_index));
        map.insert("title".to_string(), string_to_qdrant(&self.title));
        map.insert("file_name".to_string(), string_to_qdrant(&self.file_name));

        if let Some(ref session_id) = self.session_id {
            map.insert("session_id".to_string(), string_to_qdrant(session_id));
        }

        map
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::StringValue(s.to_string())),
    }
}

fn int_to_qdrant(i: i64) -> QdrantValue {
    QdrantValue {
        kind: Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)),
    }
}

impl From<Map<String, Value>> for ChunkPayload {
    fn from(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> ChunkPayload {
        ChunkPayload {
            session_id: None,
            document_id: "doc-456".to_string(),
            page_number: 3,
            chunk_index: 7,
            title: "Attention Is All You Need".to_string(),
            file_name: "attention.pdf".to_string(),
        }
    }

    #[test]
    fn test_qdrant_payload_omits_missing_session() {
        let map = payload().to_qdrant_payload();
        assert!(!map.contains_key("session_id"));
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn test_payload_from_json_map() {
        let map = json!({
            "document_id": "doc-456",
            "session_id": "s-1",
            "page_number": 2,
            "chunk_index": 0,
            "title": "T",
            "file_name": "f.pdf"
        });
        let Value::Object(map) = map else { unreachable!() };
        let parsed = ChunkPayload::from(map);
        assert_eq!(parsed.session_id.as_deref(), Some("s-1"));
        assert_eq!(parsed.page_number, 2);
    }

    #[test]
    fn test_malformed_payload_defaults() {
        let map = json!({"page_number": "not a number"});
        let Value::Object(map) = map else { unreachable!() };
        assert_eq!(ChunkPayload::from(map), ChunkPayload::default());
    }
}
