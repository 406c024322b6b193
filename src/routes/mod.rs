pub mod appointments;
pub mod auth;
pub mod invitations;
pub mod users;

use axum::Router;
use crate::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(appointments::router())
        .merge(invitations::router())
}
