use super::{ChatTurn, CompletionRequest, CompletionResponse, LlmProvider, Role, TokenUsage};
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Upstage Solar chat client (OpenAI-compatible wire format)
pub struct UpstageClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

impl UpstageClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        })
    }

    fn build_messages(request: &CompletionRequest) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatTurn {
                role: Role::System,
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().cloned());
        messages
    }
}

#[async_trait]
impl LlmProvider for UpstageClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = self
            .base_url
            .join("/v1/chat/completions")
            .map_err(|e| Error::Config(format!("Invalid LLM API URL: {}", e)))?;

        let body = ChatRequest {
            model: &self.model,
            messages: Self::build_messages(&request),
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            top_p: request.top_p.unwrap_or(self.top_p),
        };

        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("LLM API returned {}: {}", status, text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("Malformed completion response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Llm("Completion response has no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens.max(u.prompt_tokens + u.completion_tokens),
            })
            .unwrap_or_default();

        debug!(
            model = %self.model,
            tokens = usage.total_tokens,
            latency_ms = start.elapsed().as_millis() as u64,
            "Completion finished"
        );

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> UpstageClient {
        let config = LlmConfig {
            base_url: uri.to_string(),
            ..LlmConfig::default()
        };
        UpstageClient::new(&config, "secret".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_complete_sends_system_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "model": "solar-1-mini-chat",
                "temperature": 0.2,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "solar-1-mini-chat-240612",
                "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client(&server.uri())
            .complete(CompletionRequest::prompt("be brief", "hi").temperature(0.2))
            .await
            .unwrap();

        assert_eq!(resp.content, "hello");
        assert_eq!(resp.model, "solar-1-mini-chat-240612");
        assert_eq!(resp.usage.total_tokens, 6);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_upstream_error_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .complete(CompletionRequest::prompt("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[tokio::test]
    async fn test_missing_usage_defaults_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": null}}]
            })))
            .mount(&server)
            .await;

        let resp = client(&server.uri())
            .complete(CompletionRequest::prompt("s", "u"))
            .await
            .unwrap();
        assert_eq!(resp.content, "");
        assert_eq!(resp.usage, TokenUsage::default());
        assert_eq!(resp.model, "solar-1-mini-chat");
    }
}
