//! Metadata storage using SQLite
//!
//! This module handles all relational storage including:
//! - Users and refresh tokens
//! - Sessions, documents, and chunks
//! - Chat messages and reports
//! - Agent logs and API usage audit rows
//!
//! Foreign keys are enforced, so deleting a parent row cascades to its
//! children (document -> chunks, session -> messages/documents/reports).

mod accounts;
mod activity;
mod library;
mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(Error::Validation(format!("Unknown message role: {}", s))),
        }
    }
}

/// Agent invocation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Success => write!(f, "success"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(email: String, username: String, password_hash: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            username,
            password_hash,
            full_name: None,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// An issued refresh token, keyed by its `jti`
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    pub expires_at: String,
    pub revoked: bool,
    pub created_at: String,
}

/// A research session owned by a user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub analysis_goal: Option<String>,
    pub is_active: bool,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Session {
    pub fn new(user_id: String, title: String, description: Option<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            title,
            description,
            analysis_goal: None,
            is_active: true,
            message_count: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A PDF document, uploaded or fetched by the search agent
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub page_count: i64,
    pub summary: Option<String>,
    pub is_indexed: bool,
    pub indexed_at: Option<String>,
    pub external_id: Option<String>,
    pub relevance_score: Option<f64>,
    pub chunk_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn new(
        user_id: String,
        session_id: Option<String>,
        title: String,
        file_name: String,
        file_path: String,
        file_size: i64,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            session_id,
            title,
            description: None,
            file_name,
            file_path,
            file_size,
            mime_type: "application/pdf".to_string(),
            page_count: 0,
            summary: None,
            is_indexed: false,
            indexed_at: None,
            external_id: None,
            relevance_score: None,
            chunk_count: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A stored chunk; the embedding itself lives in the vector store under `vector_id`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub page_number: i64,
    pub text: String,
    pub char_count: i64,
    pub token_count: i64,
    pub vector_id: String,
    pub embedding_model: Option<String>,
    pub created_at: String,
}

impl Chunk {
    pub fn new(
        document_id: String,
        chunk_index: i64,
        page_number: i64,
        text: String,
        token_count: i64,
        vector_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            chunk_index,
            page_number,
            char_count: text.chars().count() as i64,
            text,
            token_count,
            vector_id,
            embedding_model: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A chat turn
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub model: Option<String>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
    pub estimated_cost_usd: Option<f64>,
    pub seq: i64,
    pub created_at: String,
}

impl ChatMessage {
    pub fn new(session_id: String, user_id: String, role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            user_id,
            role: role.to_string(),
            content,
            model: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            estimated_cost_usd: None,
            seq: 0,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A generated report
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub title: String,
    pub research_topic: String,
    pub report_type: String,
    pub markdown: String,
    pub content_json: String,
    pub visualizations_json: Option<String>,
    pub tokens_used: i64,
    pub created_at: String,
}

/// An agent invocation audit row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AgentLog {
    pub id: String,
    pub user_id: Option<String>,
    pub agent_name: String,
    pub session_id: Option<String>,
    pub document_id: Option<String>,
    pub status: String,
    pub input_json: Option<String>,
    pub output_json: Option<String>,
    pub error_message: Option<String>,
    pub execution_time_ms: i64,
    pub tokens_used: i64,
    pub created_at: String,
}

impl AgentLog {
    pub fn new(agent_name: &str, status: AgentStatus, execution_time_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            agent_name: agent_name.to_string(),
            session_id: None,
            document_id: None,
            status: status.to_string(),
            input_json: None,
            output_json: None,
            error_message: None,
            execution_time_ms,
            tokens_used: 0,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// An HTTP request audit row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiUsage {
    pub id: String,
    pub user_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub status_code: i64,
    pub response_time_ms: i64,
    pub created_at: String,
}

/// Row counts across the main tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub user_count: i64,
    pub session_count: i64,
    pub document_count: i64,
    pub indexed_document_count: i64,
    pub chunk_count: i64,
    pub message_count: i64,
    pub report_count: i64,
    pub agent_run_count: i64,
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the metadata database at `db_path`
    pub async fn connect(db_path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Cheap liveness probe used by the readiness endpoint
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Row counts for the status command
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let indexed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE is_indexed = 1")
                .fetch_one(&self.pool)
                .await?;

        Ok(GlobalStats {
            user_count: self.count_rows("users").await?,
            session_count: self.count_rows("sessions").await?,
            document_count: self.count_rows("documents").await?,
            indexed_document_count: indexed,
            chunk_count: self.count_rows("chunks").await?,
            message_count: self.count_rows("chat_messages").await?,
            report_count: self.count_rows("reports").await?,
            agent_run_count: self.count_rows("agent_logs").await?,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let query = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
        Ok(n)
    }
}
