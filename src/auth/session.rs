use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::jwt::{TokenError, TokenKind, TokenPair, TokenService};
use super::password::{self, PasswordError};
use crate::models::user::{User, UserResponse, UserRole};
use crate::store::{SessionStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("credentials do not match")]
    Unauthorized,
    #[error("session not found or expired")]
    SessionNotFound,
    #[error("session payload is malformed: {0}")]
    MalformedSession(#[source] serde_json::Error),
    #[error("token was superseded by a newer one")]
    TokenSuperseded,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the session store holds under a session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user_id: i64,
    pub timezone: String,
    pub role: UserRole,
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionPayload {
    pub fn decode(raw: &str) -> Result<Self, AuthError> {
        serde_json::from_str(raw).map_err(AuthError::MalformedSession)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Authenticated {
    pub user: UserResponse,
    pub session_id: String,
    pub token: TokenPair,
}

/// Issues sessions on login and rotates their tokens on refresh.
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenService,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenService,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
        }
    }

    pub async fn login(&self, username: &str, secret: &str) -> Result<Authenticated, AuthError> {
        self.login_at(username, secret, Utc::now()).await
    }

    pub async fn login_at(
        &self,
        username: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Authenticated, AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !password::verify_password(secret, &user.password_hash)? {
            return Err(AuthError::Unauthorized);
        }

        let session_id = new_session_id(user.user_id);
        let token = self.tokens.mint_at(&session_id, now)?;
        self.persist(&session_id, &user, &token, self.tokens.access_ttl())
            .await?;

        tracing::info!(user_id = user.user_id, %session_id, "session opened");

        Ok(Authenticated {
            user: user.into(),
            session_id,
            token,
        })
    }

    pub async fn refresh(
        &self,
        refresh_token: &str,
        session_id: &str,
    ) -> Result<Authenticated, AuthError> {
        self.refresh_at(refresh_token, session_id, Utc::now()).await
    }

    /// Mints a new pair for an existing session. The session id stays the
    /// same; only the tokens stored under it change.
    pub async fn refresh_at(
        &self,
        refresh_token: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Authenticated, AuthError> {
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh)?;
        if claims.session_id != session_id {
            return Err(TokenError::Invalid.into());
        }

        let raw = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        let payload = SessionPayload::decode(&raw)?;
        if payload.refresh_token != refresh_token {
            return Err(AuthError::TokenSuperseded);
        }

        let user = self
            .users
            .find_by_id(payload.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // exp has whole-second precision; the new pair must expire strictly
        // after the presented one
        let issued_at = DateTime::from_timestamp(claims.exp, 0)
            .map(|exp| exp - self.tokens.refresh_ttl() + chrono::Duration::seconds(1))
            .map_or(now, |floor| now.max(floor));

        let token = self.tokens.mint_at(session_id, issued_at)?;
        self.persist(session_id, &user, &token, self.tokens.refresh_ttl())
            .await?;

        tracing::info!(user_id = user.user_id, %session_id, "session refreshed");

        Ok(Authenticated {
            user: user.into(),
            session_id: session_id.to_string(),
            token,
        })
    }

    async fn persist(
        &self,
        session_id: &str,
        user: &User,
        token: &TokenPair,
        ttl: chrono::Duration,
    ) -> Result<(), AuthError> {
        let payload = SessionPayload {
            user_id: user.user_id,
            timezone: user.timezone.clone(),
            role: user.role,
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
        };
        let raw = serde_json::to_string(&payload).map_err(AuthError::MalformedSession)?;
        self.sessions
            .set_ex(session_id, &raw, ttl.to_std().unwrap_or_default())
            .await?;
        Ok(())
    }
}

fn new_session_id(user_id: i64) -> String {
    format!("session:{user_id}-{}", Uuid::new_v4().simple())
}
