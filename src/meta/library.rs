//! Session, document, and chunk operations
//!
//! Every read that a user can trigger is scoped by `user_id`, so rows owned
//! by someone else look exactly like missing rows.

use super::{Chunk, Document, MetaDb, Session};
use crate::error::Result;
use chrono::Utc;

const SESSION_SELECT: &str = r#"
    SELECT s.*, (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id) AS message_count
    FROM sessions s
"#;

const DOCUMENT_SELECT: &str = r#"
    SELECT d.*, (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id) AS chunk_count
    FROM documents d
"#;

impl MetaDb {
    // ===== Session Operations =====

    /// Insert a new session
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, title, description, analysis_goal, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.title)
        .bind(&session.description)
        .bind(&session.analysis_goal)
        .bind(session.is_active)
        .bind(&session.created_at)
        .bind(&session.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get a session owned by `user_id`
    pub async fn get_session(&self, id: &str, user_id: &str) -> Result<Option<Session>> {
        let query = format!("{} WHERE s.id = ? AND s.user_id = ?", SESSION_SELECT);
        let session = sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(session)
    }

    /// List sessions for a user, most recently updated first
    pub async fn list_sessions(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>> {
        let query = format!(
            "{} WHERE s.user_id = ? ORDER BY s.updated_at DESC LIMIT ? OFFSET ?",
            SESSION_SELECT
        );
        let sessions = sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;
        Ok(sessions)
    }

    /// Count sessions for a user
    pub async fn count_sessions(&self, user_id: &str) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }

    /// Update title and/or description; `None` leaves a field unchanged
    pub async fn update_session(
        &self,
        id: &str,
        user_id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Session>> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_session(id, user_id).await
    }

    /// Set (or clear, with `None`) the session's analysis goal
    pub async fn update_analysis_goal(
        &self,
        id: &str,
        user_id: &str,
        goal: Option<&str>,
    ) -> Result<Option<Session>> {
        let result = sqlx::query(
            "UPDATE sessions SET analysis_goal = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(goal)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_session(id, user_id).await
    }

    /// Touch `updated_at` so recently used sessions sort first
    pub async fn touch_session(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Delete a session; messages, documents, chunks, and reports cascade
    pub async fn delete_session(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Document Operations =====

    /// Insert a new document
    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, user_id, session_id, title, description, file_name, file_path,
                file_size, mime_type, page_count, summary, is_indexed, indexed_at, external_id,
                relevance_score, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.user_id)
        .bind(&doc.session_id)
        .bind(&doc.title)
        .bind(&doc.description)
        .bind(&doc.file_name)
        .bind(&doc.file_path)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(doc.page_count)
        .bind(&doc.summary)
        .bind(doc.is_indexed)
        .bind(&doc.indexed_at)
        .bind(&doc.external_id)
        .bind(doc.relevance_score)
        .bind(&doc.created_at)
        .bind(&doc.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get a document owned by `user_id`
    pub async fn get_document(&self, id: &str, user_id: &str) -> Result<Option<Document>> {
        let query = format!("{} WHERE d.id = ? AND d.user_id = ?", DOCUMENT_SELECT);
        let doc = sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(doc)
    }

    /// List all documents of a user, newest first
    pub async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        let query = format!(
            "{} WHERE d.user_id = ? ORDER BY d.created_at DESC",
            DOCUMENT_SELECT
        );
        let docs = sqlx::query_as::<_, Document>(&query)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;
        Ok(docs)
    }

    /// List documents attached to a session
    pub async fn list_session_documents(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Vec<Document>> {
        let query = format!(
            "{} WHERE d.session_id = ? AND d.user_id = ? ORDER BY d.created_at DESC",
            DOCUMENT_SELECT
        );
        let docs = sqlx::query_as::<_, Document>(&query)
            .bind(session_id)
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;
        Ok(docs)
    }

    /// Fetch the subset of `ids` owned by `user_id`
    pub async fn get_documents_by_ids(&self, user_id: &str, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "{} WHERE d.user_id = ? AND d.id IN ({})",
            DOCUMENT_SELECT, placeholders
        );

        let mut query_builder = sqlx::query_as::<_, Document>(&query).bind(user_id);
        for id in ids {
            query_builder = query_builder.bind(id);
        }
        let docs = query_builder.fetch_all(self.pool()).await?;
        Ok(docs)
    }

    /// External identifiers (e.g. `arxiv:2401.01234`) already present in a session
    pub async fn external_ids_for_session(&self, session_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT external_id FROM documents WHERE session_id = ? AND external_id IS NOT NULL",
        )
        .bind(session_id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }

    /// Record the results of embedding a document
    pub async fn mark_document_indexed(
        &self,
        id: &str,
        page_count: i64,
        summary: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE documents
            SET is_indexed = 1, page_count = ?, summary = ?, indexed_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(page_count)
        .bind(summary)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Delete a document; its chunks cascade
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // ===== Chunk Operations =====

    /// Replace all chunks of a document in one transaction
    pub async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, page_number, text, char_count,
                    token_count, vector_id, embedding_model, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(chunk.page_number)
            .bind(&chunk.text)
            .bind(chunk.char_count)
            .bind(chunk.token_count)
            .bind(&chunk.vector_id)
            .bind(&chunk.embedding_model)
            .bind(&chunk.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get all chunks for a document, in order
    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let chunks = sqlx::query_as::<_, Chunk>(
            "SELECT * FROM chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(self.pool())
        .await?;
        Ok(chunks)
    }

    /// Get chunk by its vector-store point ID
    pub async fn get_chunk_by_vector_id(&self, vector_id: &str) -> Result<Option<Chunk>> {
        let chunk = sqlx::query_as::<_, Chunk>("SELECT * FROM chunks WHERE vector_id = ?")
            .bind(vector_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(chunk)
    }

    /// Vector IDs of a document's chunks
    pub async fn vector_ids_for_document(&self, document_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT vector_id FROM chunks WHERE document_id = ?")
                .bind(document_id)
                .fetch_all(self.pool())
                .await?;
        Ok(ids)
    }

    /// Vector IDs of every chunk in a session
    pub async fn vector_ids_for_session(&self, session_id: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT c.vector_id FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_all(self.pool())
        .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use crate::meta::tests::{seed_user, setup_test_db};
    use crate::meta::{ChatMessage, Chunk, Document, MessageRole, Session};

    #[tokio::test]
    async fn test_session_crud_and_goal() {
        let (db, _tmp) = setup_test_db().await;
        let user = seed_user(&db, "alice").await;

        let session = Session::new(user.id.clone(), "Kinase targets".to_string(), None);
        db.insert_session(&session).await.unwrap();

        let updated = db
            .update_analysis_goal(&session.id, &user.id, Some("Focus on EGFR inhibitors"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.analysis_goal.as_deref(), Some("Focus on EGFR inhibitors"));

        let reloaded = db.get_session(&session.id, &user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.analysis_goal.as_deref(), Some("Focus on EGFR inhibitors"));

        let renamed = db
            .update_session(&session.id, &user.id, Some("Renamed"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.title, "Renamed");
        assert_eq!(renamed.analysis_goal.as_deref(), Some("Focus on EGFR inhibitors"));

        assert_eq!(db.count_sessions(&user.id).await.unwrap(), 1);
        assert!(db.delete_session(&session.id, &user.id).await.unwrap());
        assert!(db.get_session(&session.id, &user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_owner_scoped() {
        let (db, _tmp) = setup_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let mallory = seed_user(&db, "mallory").await;

        let session = Session::new(alice.id.clone(), "Private".to_string(), None);
        db.insert_session(&session).await.unwrap();

        assert!(db.get_session(&session.id, &mallory.id).await.unwrap().is_none());
        assert!(db
            .update_analysis_goal(&session.id, &mallory.id, Some("x"))
            .await
            .unwrap()
            .is_none());
        assert!(!db.delete_session(&session.id, &mallory.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_document_delete_cascades_chunks() {
        let (db, _tmp) = setup_test_db().await;
        let user = seed_user(&db, "alice").await;

        let doc = Document::new(
            user.id.clone(),
            None,
            "Paper".to_string(),
            "paper.pdf".to_string(),
            "/tmp/paper.pdf".to_string(),
            1024,
        );
        db.insert_document(&doc).await.unwrap();

        let chunks = vec![
            Chunk::new(doc.id.clone(), 0, 1, "first".to_string(), 1, "v-0".to_string()),
            Chunk::new(doc.id.clone(), 1, 2, "second".to_string(), 1, "v-1".to_string()),
        ];
        db.replace_chunks(&doc.id, &chunks).await.unwrap();

        let loaded = db.get_document(&doc.id, &user.id).await.unwrap().unwrap();
        assert_eq!(loaded.chunk_count, 2);
        assert_eq!(db.get_chunk_by_vector_id("v-1").await.unwrap().unwrap().page_number, 2);

        db.delete_document(&doc.id).await.unwrap();
        assert!(db.get_chunks(&doc.id).await.unwrap().is_empty());
        assert!(db.get_chunk_by_vector_id("v-0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_delete_cascades_messages_and_documents() {
        let (db, _tmp) = setup_test_db().await;
        let user = seed_user(&db, "alice").await;
        let session = Session::new(user.id.clone(), "S".to_string(), None);
        db.insert_session(&session).await.unwrap();

        let mut doc = Document::new(
            user.id.clone(),
            Some(session.id.clone()),
            "Paper".to_string(),
            "paper.pdf".to_string(),
            "/tmp/paper.pdf".to_string(),
            10,
        );
        doc.external_id = Some("arxiv:2401.00001".to_string());
        db.insert_document(&doc).await.unwrap();

        let msg = ChatMessage::new(
            session.id.clone(),
            user.id.clone(),
            MessageRole::User,
            "hi".to_string(),
        );
        db.insert_message(&msg).await.unwrap();

        assert_eq!(
            db.external_ids_for_session(&session.id).await.unwrap(),
            vec!["arxiv:2401.00001".to_string()]
        );

        db.delete_session(&session.id, &user.id).await.unwrap();
        assert!(db.get_document(&doc.id, &user.id).await.unwrap().is_none());
        assert_eq!(db.count_messages(&session.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_documents_by_ids_filters_owner() {
        let (db, _tmp) = setup_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        let mine = Document::new(alice.id.clone(), None, "A".into(), "a.pdf".into(), "/a".into(), 1);
        let theirs = Document::new(bob.id.clone(), None, "B".into(), "b.pdf".into(), "/b".into(), 1);
        db.insert_document(&mine).await.unwrap();
        db.insert_document(&theirs).await.unwrap();

        let docs = db
            .get_documents_by_ids(&alice.id, &[mine.id.clone(), theirs.id.clone()])
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, mine.id);
    }
}
