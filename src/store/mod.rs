//! Persistence seams. Services only see these traits; `postgres` and
//! `redis_sessions` back them in production, `memory` in tests.

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod redis_sessions;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::appointment::{Appointment, AppointmentRecord, DateRange, NewAppointment};
use crate::models::invitation::{Attendant, InvitationStatus, NewInvitation};
use crate::models::user::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("session store error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// Lookups never return soft-deleted users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn update_timezone(&self, user_id: i64, timezone: &str)
    -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Opens the write transaction used for appointment creation.
    async fn begin(&self) -> Result<Box<dyn BookingTx>, StoreError>;

    /// Appointments starting in `range` that `user_id` hosts or has accepted.
    async fn visible_appointments(
        &self,
        user_id: i64,
        range: DateRange,
    ) -> Result<Vec<AppointmentRecord>, StoreError>;

    /// Appointments hosted by someone else where `user_id` is still pending.
    async fn pending_appointments(&self, user_id: i64) -> Result<Vec<AppointmentRecord>, StoreError>;

    /// Invitations of the given appointments, ordered by appointment then invitation id.
    async fn attendants(&self, appointment_ids: &[i64]) -> Result<Vec<Attendant>, StoreError>;

    /// Sets the status of the invitation matching both ids and returns the
    /// status it had before, or `None` when nothing matched.
    async fn update_invitation_status(
        &self,
        invitee_id: i64,
        invitation_id: i64,
        status: InvitationStatus,
    ) -> Result<Option<InvitationStatus>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// A scoped write transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait BookingTx: Send {
    async fn insert_appointment(&mut self, new: &NewAppointment) -> Result<Appointment, StoreError>;
    async fn insert_invitations(&mut self, rows: &[NewInvitation]) -> Result<(), StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Key-value store with per-key expiry holding serialized sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}
