use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TokenConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("token claims are invalid")]
    ClaimsInvalid,
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// The complete claim set of both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub session_id: String,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Mints and verifies HS256 tokens bound to a session id. Access and
/// refresh tokens are signed with different secrets.
#[derive(Clone)]
pub struct TokenService {
    access: Arc<Keys>,
    refresh: Arc<Keys>,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            access: Arc::new(Keys::from_secret(&config.access_secret)),
            refresh: Arc::new(Keys::from_secret(&config.refresh_secret)),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            validation,
        }
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    #[cfg(test)]
    pub fn mint(&self, session_id: &str) -> Result<TokenPair, TokenError> {
        self.mint_at(session_id, Utc::now())
    }

    /// Mints a pair as if issued at `issued_at`.
    pub fn mint_at(&self, session_id: &str, issued_at: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(
                session_id,
                issued_at + self.access_ttl,
                &self.access.encoding,
            )?,
            refresh_token: self.sign(
                session_id,
                issued_at + self.refresh_ttl,
                &self.refresh.encoding,
            )?,
        })
    }

    fn sign(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        key: &EncodingKey,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            session_id: session_id.to_string(),
            exp: expires_at.timestamp(),
        };
        encode(&Header::default(), &claims, key).map_err(TokenError::Signing)
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let keys = match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        };

        let claims = decode::<Claims>(token, &keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    TokenError::ClaimsInvalid
                }
                _ => TokenError::Invalid,
            })?;

        if claims.session_id.is_empty() {
            return Err(TokenError::ClaimsInvalid);
        }
        Ok(claims)
    }
}
