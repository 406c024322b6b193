use axum::extract::State;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono_tz::Tz;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::user::{UpdateTimezoneRequest, UserResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/timezone", patch(update_timezone))
}

async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn update_timezone(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateTimezoneRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let timezone = body.timezone.trim();
    if timezone.parse::<Tz>().is_err() {
        return Err(AppError::BadRequest(format!(
            "Unknown timezone: {timezone}"
        )));
    }

    let user = state
        .users
        .update_timezone(auth.user_id, timezone)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    tracing::info!(user_id = auth.user_id, timezone, "timezone updated");
    Ok(Json(UserResponse::from(user)))
}
