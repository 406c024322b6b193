use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use super::jwt::{TokenKind, TokenService};
use super::session::{AuthError, SessionPayload};
use crate::error::AppError;
use crate::store::SessionStore;
use crate::AppState;

/// The caller behind a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub session_id: String,
}

/// Resolves bearer access tokens to the live session they belong to.
#[derive(Clone)]
pub struct AuthGate {
    tokens: TokenService,
    sessions: Arc<dyn SessionStore>,
}

impl AuthGate {
    pub fn new(tokens: TokenService, sessions: Arc<dyn SessionStore>) -> Self {
        Self { tokens, sessions }
    }

    pub async fn resolve(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.tokens.verify(access_token, TokenKind::Access)?;

        let raw = self
            .sessions
            .get(&claims.session_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        let payload = SessionPayload::decode(&raw)?;

        // a refresh replaces the stored pair, retiring the old access token
        if payload.access_token != access_token {
            return Err(AuthError::TokenSuperseded);
        }

        Ok(AuthUser {
            user_id: payload.user_id,
            session_id: claims.session_id,
        })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized)?;

        state.gate.resolve(bearer.token()).await.map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            AppError::Unauthorized
        })
    }
}
