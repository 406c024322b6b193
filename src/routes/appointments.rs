use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Days, Utc};

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::appointment::{
    AppointmentQuery, AppointmentView, CreateAppointmentRequest, CreatedAppointment, DateRange,
    NewAppointment,
};
use crate::AppState;

/// Days after `start_date` covered when no `end_date` is given.
const DEFAULT_WINDOW_DAYS: u64 = 4;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/appointments",
        get(list_appointments).post(create_appointment),
    )
}

async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<AppointmentQuery>,
) -> Result<Json<Vec<AppointmentView>>, AppError> {
    let start = params
        .start_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let end = match params.end_date {
        Some(end) => end,
        None => start
            .checked_add_days(Days::new(DEFAULT_WINDOW_DAYS))
            .ok_or_else(|| AppError::BadRequest("start_date out of range".into()))?,
    };
    if end < start {
        return Err(AppError::BadRequest(
            "end_date must not be before start_date".into(),
        ));
    }

    let views = state
        .bookings
        .list_appointments_for_user(auth.user_id, DateRange::days(start, end))
        .await?;
    Ok(Json(views))
}

async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<CreatedAppointment>), AppError> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }
    if body.start_time >= body.end_time {
        return Err(AppError::BadRequest(
            "start_time must be before end_time".into(),
        ));
    }

    let created = state
        .bookings
        .create_appointment(NewAppointment {
            host_id: auth.user_id,
            title: title.to_string(),
            start_time: body.start_time,
            end_time: body.end_time,
            invitee_ids: body.invitee_ids,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}
