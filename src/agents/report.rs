//! Research reports and quick topic analysis

use super::{check_length, check_range, Agent, AgentContext, Services};
use crate::error::{Error, Result};
use crate::llm::{extract_json_object, CompletionRequest};
use crate::meta::{Document, Report};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

/// Accepted values of `report_type`
pub const REPORT_TYPES: &[&str] = &["comprehensive", "summary", "detailed"];

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2048;
/// Summary characters per document in the prompt
const DOCUMENT_SUMMARY_CHARS: usize = 1500;

const REPORT_SYSTEM_PROMPT: &str = "You are a research analyst who assesses the feasibility \
of research topics against the literature provided. Respond with only a JSON object with the keys \
title (string), is_feasible (boolean), feasibility_score (number 0-100), reasoning (string), \
sections (array of {title, content}), evidence_summary (string), recommendations (array of strings) \
and limitations (array of strings).";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a research analyst. Give a short, structured \
analysis of the research topic: its current state, open problems, and promising directions.";

fn default_report_type() -> String {
    "comprehensive".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub research_topic: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_report_type")]
    pub report_type: String,
    #[serde(default)]
    pub document_ids: Option<Vec<String>>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
}

/// Structured report body, as stored in `reports.content_json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportContent {
    pub title: String,
    pub research_topic: String,
    pub is_feasible: bool,
    /// 0 - 100
    pub feasibility_score: f64,
    pub reasoning: String,
    pub sections: Vec<ReportSection>,
    pub evidence_summary: String,
    pub recommendations: Vec<String>,
    pub limitations: Vec<String>,
    /// Titles of the documents the report drew on
    pub related_papers: Vec<String>,
    pub generated_at: String,
}

impl ReportContent {
    /// Read the model's reply, degrading to a single section of raw text
    pub fn from_reply(reply: &str, topic: &str) -> Self {
        let parsed = extract_json_object(reply)
            .and_then(|value| serde_json::from_value::<ReportContent>(value).ok());

        let mut content = match parsed {
            Some(content) => content,
            None => {
                warn!("Report reply was not valid JSON; keeping raw text");
                ReportContent {
                    sections: vec![ReportSection {
                        title: "Analysis".to_string(),
                        content: reply.trim().to_string(),
                    }],
                    ..ReportContent::default()
                }
            }
        };

        if content.title.trim().is_empty() {
            content.title = format!("Research Report: {}", topic);
        }
        content.research_topic = topic.to_string();
        content.feasibility_score = if content.feasibility_score.is_finite() {
            content.feasibility_score.clamp(0.0, 100.0)
        } else {
            0.0
        };
        content
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub report_id: String,
    pub report: ReportContent,
    pub markdown: String,
    /// Chart data, keyed by chart name
    pub visualizations: Map<String, Value>,
    pub tokens_used: i64,
}

/// Render a report as Markdown
pub fn render_markdown(report: &ReportContent) -> String {
    let mut lines = vec![format!("# {}", report.title), String::new()];

    lines.push("## Overview".to_string());
    lines.push(format!("- **Research topic**: {}", report.research_topic));
    if !report.generated_at.is_empty() {
        lines.push(format!("- **Generated**: {}", report.generated_at));
    }
    lines.push(format!("- **Reference papers**: {}", report.related_papers.len()));
    lines.push(String::new());

    lines.push("## Feasibility".to_string());
    lines.push(format!(
        "**Verdict**: {}",
        if report.is_feasible {
            "feasible"
        } else {
            "needs further review"
        }
    ));
    lines.push(format!("- **Score**: {:.1}/100", report.feasibility_score));
    if !report.reasoning.is_empty() {
        lines.push(format!("- **Reasoning**: {}", report.reasoning));
    }
    lines.push(String::new());

    if !report.sections.is_empty() {
        lines.push("## Analysis".to_string());
        for section in &report.sections {
            lines.push(format!("### {}", section.title));
            lines.push(section.content.clone());
            lines.push(String::new());
        }
    }

    if !report.evidence_summary.is_empty() {
        lines.push("## Evidence Summary".to_string());
        lines.push(report.evidence_summary.clone());
        lines.push(String::new());
    }

    if !report.recommendations.is_empty() {
        lines.push("## Recommendations".to_string());
        for (i, rec) in report.recommendations.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, rec));
        }
        lines.push(String::new());
    }

    if !report.limitations.is_empty() {
        lines.push("## Limitations".to_string());
        lines.extend(report.limitations.iter().map(|l| format!("- {}", l)));
        lines.push(String::new());
    }

    if !report.related_papers.is_empty() {
        lines.push("## References".to_string());
        for (i, title) in report.related_papers.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, title));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn documents_block(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No reference documents were provided.".to_string();
    }
    docs.iter()
        .enumerate()
        .map(|(i, d)| {
            let summary: String = d
                .summary
                .as_deref()
                .unwrap_or("(no summary)")
                .chars()
                .take(DOCUMENT_SUMMARY_CHARS)
                .collect();
            format!("[{}] {}\n{}", i + 1, d.title, summary)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct ReportAgent {
    services: Services,
}

impl ReportAgent {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    async fn gather_documents(&self, ctx: &AgentContext, request: &ReportRequest) -> Result<Vec<Document>> {
        let db = &self.services.db;
        if let Some(session_id) = &request.session_id {
            if db.get_session(session_id, &ctx.user_id).await?.is_none() {
                return Err(Error::SessionNotFound(session_id.clone()));
            }
        }

        match (&request.document_ids, &request.session_id) {
            (Some(ids), _) if !ids.is_empty() => db.get_documents_by_ids(&ctx.user_id, ids).await,
            (_, Some(session_id)) => db.list_session_documents(session_id, &ctx.user_id).await,
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Agent for ReportAgent {
    type Request = ReportRequest;
    type Response = ReportResponse;
    const NAME: &'static str = "report";

    async fn execute(&self, ctx: &AgentContext, request: ReportRequest) -> Result<ReportResponse> {
        check_length("research_topic", request.research_topic.trim(), 1, 2000)?;
        if !REPORT_TYPES.contains(&request.report_type.as_str()) {
            return Err(Error::Validation(format!(
                "report_type must be one of {}",
                REPORT_TYPES.join(", ")
            )));
        }
        let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        check_range("temperature", temperature, 0.0, 2.0)?;
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        check_range("max_tokens", max_tokens, 1000, 8192)?;

        let docs = self.gather_documents(ctx, &request).await?;
        info!(
            "Generating {} report on '{}' from {} documents",
            request.report_type,
            request.research_topic,
            docs.len()
        );

        let prompt = format!(
            "Research topic: {}\nReport type: {}\n\nReference documents:\n{}",
            request.research_topic,
            request.report_type,
            documents_block(&docs)
        );
        let completion = self
            .services
            .llm
            .complete(
                CompletionRequest::prompt(REPORT_SYSTEM_PROMPT, prompt)
                    .temperature(temperature)
                    .max_tokens(max_tokens),
            )
            .await?;

        let mut content = ReportContent::from_reply(&completion.content, &request.research_topic);
        content.related_papers = docs.iter().map(|d| d.title.clone()).collect();
        content.generated_at = Utc::now().to_rfc3339();
        let markdown = render_markdown(&content);
        let visualizations = Map::new();
        let tokens_used = completion.usage.total_tokens as i64;

        let report = Report {
            id: Uuid::new_v4().to_string(),
            user_id: ctx.user_id.clone(),
            session_id: request.session_id.clone(),
            title: content.title.clone(),
            research_topic: request.research_topic.clone(),
            report_type: request.report_type.clone(),
            markdown: markdown.clone(),
            content_json: serde_json::to_string(&content)?,
            visualizations_json: Some(serde_json::to_string(&visualizations)?),
            tokens_used,
            created_at: content.generated_at.clone(),
        };
        self.services.db.insert_report(&report).await?;

        Ok(ReportResponse {
            report_id: report.id,
            report: content,
            markdown,
            visualizations,
            tokens_used,
        })
    }

    fn session_of(request: &ReportRequest) -> Option<String> {
        request.session_id.clone()
    }

    fn tokens_of(response: &ReportResponse) -> i64 {
        response.tokens_used
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicAnalysisRequest {
    pub research_topic: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicAnalysisResponse {
    pub topic: String,
    pub analysis: String,
    pub tokens_used: i64,
}

/// One-shot analysis of a topic; nothing is stored
pub struct TopicAnalysisAgent {
    services: Services,
}

impl TopicAnalysisAgent {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Agent for TopicAnalysisAgent {
    type Request = TopicAnalysisRequest;
    type Response = TopicAnalysisResponse;
    const NAME: &'static str = "report_analyze";

    async fn execute(&self, _ctx: &AgentContext, request: TopicAnalysisRequest) -> Result<TopicAnalysisResponse> {
        check_length("research_topic", request.research_topic.trim(), 1, 2000)?;
        let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        check_range("temperature", temperature, 0.0, 2.0)?;
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        check_range("max_tokens", max_tokens, 1000, 8192)?;

        let completion = self
            .services
            .llm
            .complete(
                CompletionRequest::prompt(ANALYSIS_SYSTEM_PROMPT, request.research_topic.clone())
                    .temperature(temperature)
                    .max_tokens(max_tokens),
            )
            .await?;

        Ok(TopicAnalysisResponse {
            topic: request.research_topic,
            analysis: completion.content,
            tokens_used: completion.usage.total_tokens as i64,
        })
    }

    fn tokens_of(response: &TopicAnalysisResponse) -> i64 {
        response.tokens_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::tests::{services, ScriptedLlm};
    use crate::meta::tests::seed_user;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const JSON_REPLY: &str = r#"Here you go:
{"title": "CRISPR delivery", "is_feasible": true, "feasibility_score": 140,
 "reasoning": "Strong precedent", "sections": [{"title": "Background", "content": "Lipid nanoparticles"}],
 "evidence_summary": "Three trials", "recommendations": ["Start in vitro"], "limitations": ["Small cohorts"]}"#;

    fn request(topic: &str) -> ReportRequest {
        ReportRequest {
            research_topic: topic.to_string(),
            session_id: None,
            report_type: default_report_type(),
            document_ids: None,
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn test_from_reply_parses_and_clamps() {
        let content = ReportContent::from_reply(JSON_REPLY, "CRISPR");
        assert_eq!(content.title, "CRISPR delivery");
        assert!(content.is_feasible);
        assert_eq!(content.feasibility_score, 100.0);
        assert_eq!(content.sections[0].title, "Background");
        assert_eq!(content.research_topic, "CRISPR");
    }

    #[test]
    fn test_from_reply_falls_back_to_raw_text() {
        let content = ReportContent::from_reply("plain prose answer", "Topic");
        assert_eq!(content.title, "Research Report: Topic");
        assert_eq!(
            content.sections,
            vec![ReportSection {
                title: "Analysis".to_string(),
                content: "plain prose answer".to_string(),
            }]
        );
    }

    #[test]
    fn test_markdown_sections() {
        let mut content = ReportContent::from_reply(JSON_REPLY, "CRISPR");
        content.related_papers = vec!["Paper A".to_string()];
        let md = render_markdown(&content);
        assert!(md.starts_with("# CRISPR delivery\n"));
        assert!(md.contains("- **Score**: 100.0/100"));
        assert!(md.contains("### Background\nLipid nanoparticles"));
        assert!(md.contains("1. Start in vitro"));
        assert!(md.contains("- Small cohorts"));
        assert!(md.contains("## References\n1. Paper A"));
    }

    #[tokio::test]
    async fn test_generate_persists_report() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new(JSON_REPLY))).await;
        let user = seed_user(&services.db, "alice").await;

        let resp = ReportAgent::new(services.clone())
            .execute(&AgentContext::new(user.id.clone()), request("CRISPR"))
            .await
            .unwrap();

        assert!(resp.visualizations.is_empty());
        assert_eq!(resp.tokens_used, 15);

        let stored = services
            .db
            .get_report(&resp.report_id, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.markdown, resp.markdown);
        let reloaded: ReportContent = serde_json::from_str(&stored.content_json).unwrap();
        assert_eq!(reloaded, resp.report);
    }

    #[tokio::test]
    async fn test_report_validation() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("x"))).await;
        let user = seed_user(&services.db, "alice").await;
        let agent = ReportAgent::new(services);
        let ctx = AgentContext::new(user.id);

        let mut bad_type = request("t");
        bad_type.report_type = "haiku".to_string();
        assert!(matches!(agent.execute(&ctx, bad_type).await, Err(Error::Validation(_))));

        let mut short = request("t");
        short.max_tokens = Some(500);
        assert!(matches!(agent.execute(&ctx, short).await, Err(Error::Validation(_))));

        let mut missing_session = request("t");
        missing_session.session_id = Some("nope".to_string());
        assert!(matches!(
            agent.execute(&ctx, missing_session).await,
            Err(Error::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_topic_analysis_returns_text() {
        let (services, _tmp) = services(Arc::new(ScriptedLlm::new("Promising area."))).await;
        let resp = TopicAnalysisAgent::new(services)
            .execute(
                &AgentContext::new("anyone"),
                TopicAnalysisRequest {
                    research_topic: "Solid-state batteries".to_string(),
                    temperature: None,
                    max_tokens: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.analysis, "Promising area.");
        assert_eq!(resp.topic, "Solid-state batteries");
    }
}
