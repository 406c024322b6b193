use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::appointment::AppointmentView;
use crate::models::invitation::Decision;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/invitations", get(list_pending))
        .route("/api/invitations/{id}/accept", patch(accept))
        .route("/api/invitations/{id}/reject", patch(reject))
}

async fn list_pending(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let pending = state.invitations.list_pending(auth.user_id).await?;
    Ok(Json(pending))
}

async fn accept(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    decide(&state, &auth, id, Decision::Accept).await
}

async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    decide(&state, &auth, id, Decision::Reject).await
}

/// Answers 202 even when nothing matched, so callers cannot discover which
/// invitation ids exist or belong to other users.
async fn decide(
    state: &AppState,
    auth: &AuthUser,
    invitation_id: i64,
    decision: Decision,
) -> Result<(StatusCode, Json<Value>), AppError> {
    state
        .invitations
        .set_status(auth.user_id, invitation_id, decision)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "invitation_id": invitation_id, "status": decision.target() })),
    ))
}
