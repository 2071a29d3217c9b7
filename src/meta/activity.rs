//! Chat history, reports, and audit rows

use super::{AgentLog, ApiUsage, ChatMessage, MetaDb, Report};
use crate::error::Result;

impl MetaDb {
    // ===== Chat Message Operations =====

    /// Append a message to its session; `seq` is assigned here and returned
    pub async fn insert_message(&self, msg: &ChatMessage) -> Result<i64> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO chat_messages (id, session_id, user_id, role, content, model, prompt_tokens,
                completion_tokens, total_tokens, estimated_cost_usd, seq, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM chat_messages WHERE session_id = ?), ?)
            RETURNING seq
            "#,
        )
        .bind(&msg.id)
        .bind(&msg.session_id)
        .bind(&msg.user_id)
        .bind(&msg.role)
        .bind(&msg.content)
        .bind(&msg.model)
        .bind(msg.prompt_tokens)
        .bind(msg.completion_tokens)
        .bind(msg.total_tokens)
        .bind(msg.estimated_cost_usd)
        .bind(&msg.session_id)
        .bind(&msg.created_at)
        .fetch_one(self.pool())
        .await?;
        Ok(seq)
    }

    /// Page through a session's messages in chronological order
    pub async fn list_messages(
        &self,
        session_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY seq LIMIT ? OFFSET ?",
        )
        .bind(session_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;
        Ok(messages)
    }

    /// The last `n` messages of a session, oldest first
    pub async fn recent_messages(&self, session_id: &str, n: i64) -> Result<Vec<ChatMessage>> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY seq DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(n)
        .fetch_all(self.pool())
        .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn count_messages(&self, session_id: &str) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }

    /// Get a message owned by `user_id`
    pub async fn get_message(&self, id: &str, user_id: &str) -> Result<Option<ChatMessage>> {
        let msg = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(msg)
    }

    pub async fn delete_message(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every message in a session; returns how many were deleted
    pub async fn clear_messages(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    // ===== Report Operations =====

    pub async fn insert_report(&self, report: &Report) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reports (id, user_id, session_id, title, research_topic, report_type,
                markdown, content_json, visualizations_json, tokens_used, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(&report.user_id)
        .bind(&report.session_id)
        .bind(&report.title)
        .bind(&report.research_topic)
        .bind(&report.report_type)
        .bind(&report.markdown)
        .bind(&report.content_json)
        .bind(&report.visualizations_json)
        .bind(report.tokens_used)
        .bind(&report.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get a report owned by `user_id`
    pub async fn get_report(&self, id: &str, user_id: &str) -> Result<Option<Report>> {
        let report =
            sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(report)
    }

    /// List a user's reports, newest first, optionally limited to one session
    pub async fn list_reports(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Report>> {
        let reports = match session_id {
            Some(sid) => {
                sqlx::query_as::<_, Report>(
                    r#"
                    SELECT * FROM reports WHERE user_id = ? AND session_id = ?
                    ORDER BY created_at DESC LIMIT ?
                    "#,
                )
                .bind(user_id)
                .bind(sid)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, Report>(
                    "SELECT * FROM reports WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.pool())
                .await?
            }
        };
        Ok(reports)
    }

    pub async fn delete_report(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Audit Operations =====

    pub async fn insert_agent_log(&self, log: &AgentLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_logs (id, user_id, agent_name, session_id, document_id, status,
                input_json, output_json, error_message, execution_time_ms, tokens_used, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.id)
        .bind(&log.user_id)
        .bind(&log.agent_name)
        .bind(&log.session_id)
        .bind(&log.document_id)
        .bind(&log.status)
        .bind(&log.input_json)
        .bind(&log.output_json)
        .bind(&log.error_message)
        .bind(log.execution_time_ms)
        .bind(log.tokens_used)
        .bind(&log.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Agent runs, newest first, optionally filtered by agent name
    pub async fn list_agent_logs(&self, agent_name: Option<&str>, limit: i64) -> Result<Vec<AgentLog>> {
        let logs = sqlx::query_as::<_, AgentLog>(
            r#"
            SELECT * FROM agent_logs
            WHERE (? IS NULL OR agent_name = ?)
            ORDER BY created_at DESC LIMIT ?
            "#,
        )
        .bind(agent_name)
        .bind(agent_name)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(logs)
    }

    pub async fn insert_api_usage(&self, usage: &ApiUsage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO api_usage (id, user_id, endpoint, method, status_code, response_time_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&usage.id)
        .bind(&usage.user_id)
        .bind(&usage.endpoint)
        .bind(&usage.method)
        .bind(usage.status_code)
        .bind(usage.response_time_ms)
        .bind(&usage.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn count_api_usage(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_usage")
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }
}
