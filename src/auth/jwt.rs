//! HS256 access and refresh tokens

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of the two token flavours a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Token ID; refresh tokens are tracked by this
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

/// A freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_jti: String,
    pub refresh_expires_at: DateTime<Utc>,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Issues and verifies tokens with a shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }

    fn sign(&self, user_id: &str, kind: TokenKind, ttl: Duration) -> Result<(String, Claims)> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, claims))
    }

    /// Issue an access token and a refresh token for `user_id`
    pub fn issue(&self, user_id: &str) -> Result<TokenPair> {
        let (access_token, _) = self.sign(user_id, TokenKind::Access, self.access_ttl)?;
        let (refresh_token, refresh) = self.sign(user_id, TokenKind::Refresh, self.refresh_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_at: DateTime::from_timestamp(refresh.exp, 0).unwrap_or_else(Utc::now),
            refresh_jti: refresh.jti,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify signature, expiry, and token kind
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| Error::Unauthorized(format!("Invalid token: {}", e)))?;

        if data.claims.kind != expected {
            return Err(Error::Unauthorized("Wrong token type".to_string()));
        }
        Ok(data.claims)
    }
}
