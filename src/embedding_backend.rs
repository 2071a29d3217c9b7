use crate::error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingUsage {
    #[serde(default)]
    pub total_tokens: u64,
}

/// Raw client for an OpenAI-compatible `/v1/embeddings` endpoint
pub struct EmbeddingBackendClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl EmbeddingBackendClient {
    pub fn new(base_url: &str, api_key: String, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid embedding API URL: {}", e)))
    }

    /// Embed `inputs` with `model`, returning vectors in input order
    pub async fn embed_text(&self, model: &str, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = inputs.len();
        let url = self.endpoint("/v1/embeddings")?;
        let request = EmbeddingRequest { model, input: inputs };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Embedding API returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Malformed embedding response: {}", e)))?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(model, tokens = usage.total_tokens, "Embedding call complete");
        }

        if parsed.data.len() != expected {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_embeddings_reordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ],
                "usage": {"total_tokens": 4}
            })))
            .mount(&server)
            .await;

        let client = EmbeddingBackendClient::new(&server.uri(), "key".to_string(), 5).unwrap();
        let vectors = client
            .embed_text("embedding-passage", vec!["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let client = EmbeddingBackendClient::new(&server.uri(), "key".to_string(), 5).unwrap();
        let err = client
            .embed_text("m", vec!["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_http_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(1)
            .mount(&server)
            .await;

        let client = EmbeddingBackendClient::new(&server.uri(), "key".to_string(), 5).unwrap();
        let err = client.embed_text("m", vec!["a".into()]).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
