//! General conversation within a research session

use super::{check_length, check_range, Agent, AgentContext, Services};
use crate::error::{Error, Result};
use crate::llm::{ChatTurn, CompletionRequest};
use crate::meta::{ChatMessage, MessageRole};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prior messages replayed to the model
const HISTORY_MESSAGES: i64 = 10;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2048;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful research assistant. \
Engage naturally with questions on any topic. When reference documents are provided, \
ground your answer in them and say which document supports each point. \
Be clear and accurate, and admit when you do not know something.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub content: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub selected_documents: Option<Vec<String>>,
    #[serde(default)]
    pub analysis_goal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message_id: String,
    pub user_message_id: String,
    pub content: String,
    pub role: String,
    pub usage: ChatUsage,
    pub finish_reason: Option<String>,
    pub model: String,
}

pub struct ChatAgent {
    services: Services,
}

impl ChatAgent {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

/// Wrap the question with the goal and reference documents, when present
fn build_user_prompt(content: &str, goal: Option<&str>, references: &[(String, String)]) -> String {
    if goal.is_none() && references.is_empty() {
        return content.to_string();
    }

    let mut sections = Vec::new();
    if let Some(goal) = goal {
        sections.push(format!("[Analysis goal]: {}", goal));
    }
    if !references.is_empty() {
        let listed = references
            .iter()
            .enumerate()
            .map(|(i, (title, summary))| format!("[{}] {}\n{}", i + 1, title, summary))
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push(format!("[Reference documents]:\n{}", listed));
    }
    sections.push(format!("[Question]: {}", content));
    sections.join("\n\n")
}

fn history_turn(message: &ChatMessage) -> ChatTurn {
    match message.role.parse::<MessageRole>() {
        Ok(MessageRole::Assistant) => ChatTurn::assistant(message.content.clone()),
        _ => ChatTurn::user(message.content.clone()),
    }
}

#[async_trait]
impl Agent for ChatAgent {
    type Request = ChatRequest;
    type Response = ChatResponse;
    const NAME: &'static str = "general_chat";

    async fn execute(&self, ctx: &AgentContext, request: ChatRequest) -> Result<ChatResponse> {
        check_length("content", request.content.trim(), 1, 8000)?;
        if let Some(prompt) = &request.system_prompt {
            check_length("system_prompt", prompt, 0, 4000)?;
        }
        let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        check_range("temperature", temperature, 0.0, 2.0)?;
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        check_range("max_tokens", max_tokens, 100, 8192)?;

        let db = &self.services.db;
        let session = db
            .get_session(&request.session_id, &ctx.user_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(request.session_id.clone()))?;

        let goal = request
            .analysis_goal
            .clone()
            .or(session.analysis_goal)
            .filter(|g| !g.trim().is_empty());

        let references: Vec<(String, String)> = match &request.selected_documents {
            Some(ids) if !ids.is_empty() => db
                .get_documents_by_ids(&ctx.user_id, ids)
                .await?
                .into_iter()
                .map(|d| (d.title, d.summary.unwrap_or_default()))
                .collect(),
            _ => Vec::new(),
        };

        let history = db.recent_messages(&session.id, HISTORY_MESSAGES).await?;
        debug!(
            "Chat in session {} with {} history messages and {} references",
            session.id,
            history.len(),
            references.len()
        );

        let user_message = ChatMessage::new(
            session.id.clone(),
            ctx.user_id.clone(),
            MessageRole::User,
            request.content.clone(),
        );
        db.insert_message(&user_message).await?;

        let mut messages: Vec<ChatTurn> = history.iter().map(history_turn).collect();
        messages.push(ChatTurn::user(build_user_prompt(
            &request.content,
            goal.as_deref(),
            &references,
        )));

        let system_prompt = request
            .system_prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let completion = self
            .services
            .llm
            .complete(CompletionRequest {
                system_prompt: Some(system_prompt),
                messages,
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                top_p: None,
            })
            .await?;

        let usage = ChatUsage {
            prompt_tokens: completion.usage.prompt_tokens as i64,
            completion_tokens: completion.usage.completion_tokens as i64,
            total_tokens: completion.usage.total_tokens as i64,
            estimated_cost_usd: completion.usage.estimated_cost_usd(),
        };

        let mut reply = ChatMessage::new(
            session.id.clone(),
            ctx.user_id.clone(),
            MessageRole::Assistant,
            completion.content.clone(),
        );
        reply.model = Some(completion.model.clone());
        reply.prompt_tokens = Some(usage.prompt_tokens);
        reply.completion_tokens = Some(usage.completion_tokens);
        reply.total_tokens = Some(usage.total_tokens);
        reply.estimated_cost_usd = Some(usage.estimated_cost_usd);
        db.insert_message(&reply).await?;
        db.touch_session(&session.id).await?;

        Ok(ChatResponse {
            message_id: reply.id,
            user_message_id: user_message.id,
            content: completion.content,
            role: MessageRole::Assistant.to_string(),
            usage,
            finish_reason: completion.finish_reason,
            model: completion.model,
        })
    }

    fn session_of(request: &ChatRequest) -> Option<String> {
        Some(request.session_id.clone())
    }

    fn tokens_of(response: &ChatResponse) -> i64 {
        response.usage.total_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::tests::{services, ScriptedLlm};
    use crate::llm::Role;
    use crate::meta::tests::seed_user;
    use crate::meta::Session;
    use std::sync::Arc;

    fn request(session_id: &str, content: &str) -> ChatRequest {
        ChatRequest {
            session_id: session_id.to_string(),
            content: content.to_string(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            selected_documents: None,
            analysis_goal: None,
        }
    }

    #[test]
    fn test_plain_prompt_without_context() {
        assert_eq!(build_user_prompt("hello", None, &[]), "hello");
    }

    #[test]
    fn test_sectioned_prompt() {
        let refs = vec![("Paper A".to_string(), "About A".to_string())];
        let prompt = build_user_prompt("what now?", Some("compare"), &refs);
        assert_eq!(
            prompt,
            "[Analysis goal]: compare\n\n[Reference documents]:\n[1] Paper A\nAbout A\n\n[Question]: what now?"
        );
    }

    #[tokio::test]
    async fn test_round_trip_persists_both_turns() {
        let llm = Arc::new(ScriptedLlm::with_replies("later", &["first reply", "second reply"]));
        let (services, _tmp) = services(llm.clone()).await;
        let user = seed_user(&services.db, "alice").await;
        let session = Session::new(user.id.clone(), "S".to_string(), None);
        services.db.insert_session(&session).await.unwrap();
        let agent = ChatAgent::new(services.clone());
        let ctx = AgentContext::new(user.id.clone());

        let first = agent.execute(&ctx, request(&session.id, "hi")).await.unwrap();
        assert_eq!(first.content, "first reply");
        assert_eq!(first.role, "assistant");
        assert_eq!(first.usage.total_tokens, 15);

        agent.execute(&ctx, request(&session.id, "again")).await.unwrap();

        let stored = services.db.list_messages(&session.id, 50, 0).await.unwrap();
        let roles: Vec<&str> = stored.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
        assert_eq!(stored[0].content, "hi");
        assert_eq!(stored[1].content, "first reply");
        assert_eq!(stored[1].total_tokens, Some(15));

        // second call replays the first exchange before the new question
        let prompts = llm.prompts.lock().unwrap();
        let second = &prompts[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, Role::Assistant);
        assert_eq!(second.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_and_foreign_session() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("x"))).await;
        let alice = seed_user(&services.db, "alice").await;
        let bob = seed_user(&services.db, "bob").await;
        let session = Session::new(alice.id.clone(), "S".to_string(), None);
        services.db.insert_session(&session).await.unwrap();
        let agent = ChatAgent::new(services);

        let mut hot = request(&session.id, "hi");
        hot.temperature = Some(2.5);
        assert!(matches!(
            agent.execute(&AgentContext::new(alice.id), hot).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            agent.execute(&AgentContext::new(bob.id), request(&session.id, "hi")).await,
            Err(Error::SessionNotFound(_))
        ));
    }
}
