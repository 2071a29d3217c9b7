//! Chat completion providers
//!
//! Agents talk to the model through [`LlmProvider`]; the production
//! implementation is [`UpstageClient`], an OpenAI-compatible
//! `/v1/chat/completions` client.

mod parse;
mod upstage;

pub use parse::{extract_json_object, first_number};
pub use upstage::UpstageClient;

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// USD per one million prompt tokens
pub const INPUT_COST_PER_MILLION: f64 = 0.0004;
/// USD per one million completion tokens
pub const OUTPUT_COST_PER_MILLION: f64 = 0.0006;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request for a chat completion.
///
/// `None` for a sampling field means "use the provider's configured default".
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatTurn>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl CompletionRequest {
    /// A single-turn request
    pub fn prompt(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system.into()),
            messages: vec![ChatTurn::user(user)],
            ..Self::default()
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn estimated_cost_usd(&self) -> f64 {
        estimate_cost(self.prompt_tokens, self.completion_tokens)
    }
}

/// Response from a chat completion
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// Estimated USD cost of a call
pub fn estimate_cost(prompt_tokens: u64, completion_tokens: u64) -> f64 {
    (prompt_tokens as f64 / 1_000_000.0) * INPUT_COST_PER_MILLION
        + (completion_tokens as f64 / 1_000_000.0) * OUTPUT_COST_PER_MILLION
}

/// Trait for chat completion providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model identifier for logging and persisted rows
    fn model(&self) -> &str;
}

/// Create the configured provider
pub fn create_provider(config: &Config) -> Result<Box<dyn LlmProvider>> {
    let client = UpstageClient::new(&config.llm, config.llm_api_key()?)?;
    Ok(Box::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_estimate() {
        let cost = estimate_cost(1_000_000, 2_000_000);
        assert!((cost - (0.0004 + 0.0012)).abs() < 1e-12);
        assert_eq!(TokenUsage::default().estimated_cost_usd(), 0.0);
    }

    #[test]
    fn test_prompt_builder() {
        let req = CompletionRequest::prompt("sys", "hello")
            .temperature(0.2)
            .max_tokens(800);
        assert_eq!(req.system_prompt.as_deref(), Some("sys"));
        assert_eq!(req.messages, vec![ChatTurn::user("hello")]);
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(800));
        assert!(req.top_p.is_none());
    }
}
