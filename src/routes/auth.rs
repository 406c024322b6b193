use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::auth::middleware::AuthUser;
use crate::auth::session::Authenticated;
use crate::error::AppError;
use crate::models::user::{LoginRequest, RefreshRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Authenticated>, AppError> {
    let username = body.username.trim().to_lowercase();

    if username.is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".into(),
        ));
    }

    let authenticated = state
        .sessions
        .login(&username, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(%username, error = %e, "login rejected"))?;

    Ok(Json(authenticated))
}

async fn refresh(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<Authenticated>, AppError> {
    if body.refresh_token.is_empty() {
        return Err(AppError::BadRequest("refresh_token is required".into()));
    }

    let authenticated = state
        .sessions
        .refresh(&body.refresh_token, &auth.session_id)
        .await
        .inspect_err(|e| {
            tracing::warn!(user_id = auth.user_id, session_id = %auth.session_id, error = %e, "refresh rejected")
        })?;

    Ok(Json(authenticated))
}
