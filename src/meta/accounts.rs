//! User and refresh-token operations

use super::{MetaDb, RefreshToken, User};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

impl MetaDb {
    // ===== User Operations =====

    /// Insert a new user; duplicate email or username is a conflict
    pub async fn insert_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, full_name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.is_active)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(Error::Conflict(
                "Email or username already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Get user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    /// Get user by email (case-insensitive)
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower(?)")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    // ===== Refresh Token Operations =====

    /// Record an issued refresh token
    pub async fn insert_refresh_token(
        &self,
        jti: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, expires_at, revoked, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Get a refresh token by its `jti`
    pub async fn get_refresh_token(&self, jti: &str) -> Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE id = ?")
            .bind(jti)
            .fetch_optional(self.pool())
            .await?;
        Ok(token)
    }

    /// Revoke a refresh token. Returns false if it was unknown or already revoked.
    pub async fn revoke_refresh_token(&self, jti: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
                .bind(jti)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::meta::tests::{seed_user, setup_test_db};
    use crate::meta::User;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (db, _tmp) = setup_test_db().await;
        seed_user(&db, "alice").await;

        let dup = User::new(
            "ALICE@example.com".to_string().to_lowercase(),
            "other".to_string(),
            "hash".to_string(),
        );
        let err = db.insert_user(&dup).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_lookup_by_email_ignores_case() {
        let (db, _tmp) = setup_test_db().await;
        let user = seed_user(&db, "bob").await;

        let found = db.get_user_by_email("BOB@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn test_refresh_token_revocation() {
        let (db, _tmp) = setup_test_db().await;
        let user = seed_user(&db, "carol").await;

        db.insert_refresh_token("jti-1", &user.id, Utc::now() + Duration::days(7))
            .await
            .unwrap();

        let token = db.get_refresh_token("jti-1").await.unwrap().unwrap();
        assert!(!token.revoked);

        assert!(db.revoke_refresh_token("jti-1").await.unwrap());
        assert!(!db.revoke_refresh_token("jti-1").await.unwrap());
        assert!(db.get_refresh_token("jti-1").await.unwrap().unwrap().revoked);
    }
}
