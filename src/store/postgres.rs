use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

use super::{BookingStore, BookingTx, StoreError, UserStore};
use crate::models::appointment::{Appointment, AppointmentRecord, DateRange, NewAppointment};
use crate::models::invitation::{Attendant, InvitationStatus, NewInvitation};
use crate::models::user::{NewUser, User, UserSummary};

const USER_COLUMNS: &str = "user_id, name, username, role, password_hash, timezone, \
                            created_at, updated_at, deleted_at";

const APPOINTMENT_COLUMNS: &str = "a.appointment_id, a.host_id, a.title, a.start_time, \
                                   a.end_time, a.created_at, h.username AS host_username, \
                                   h.name AS host_name, h.timezone AS host_timezone";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn classify(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db)
            if db.is_foreign_key_violation() || db.is_unique_violation() =>
        {
            StoreError::Constraint(db.message().to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[derive(FromRow)]
struct AppointmentRow {
    appointment_id: i64,
    host_id: i64,
    title: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
    host_username: String,
    host_name: String,
    host_timezone: String,
}

impl From<AppointmentRow> for AppointmentRecord {
    fn from(row: AppointmentRow) -> Self {
        Self {
            appointment: Appointment {
                appointment_id: row.appointment_id,
                host_id: row.host_id,
                title: row.title,
                start_time: row.start_time,
                end_time: row.end_time,
                created_at: row.created_at,
            },
            host: UserSummary {
                username: row.host_username,
                name: row.host_name,
                timezone: row.host_timezone,
            },
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL LIMIT 1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY username"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn update_timezone(
        &self,
        user_id: i64,
        timezone: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET timezone = $1, updated_at = now()
             WHERE user_id = $2 AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(timezone)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, username, role, password_hash, timezone)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.username)
        .bind(user.role)
        .bind(&user.password_hash)
        .bind(&user.timezone)
        .fetch_one(&self.db)
        .await
        .map_err(classify)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn BookingTx>, StoreError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgBookingTx { tx }))
    }

    async fn visible_appointments(
        &self,
        user_id: i64,
        range: DateRange,
    ) -> Result<Vec<AppointmentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointments a
             JOIN users h ON h.user_id = a.host_id AND h.deleted_at IS NULL
             WHERE a.start_time >= $2 AND a.start_time < $3
               AND (
                   a.host_id = $1
                   OR EXISTS (
                       SELECT 1 FROM invitations i
                       WHERE i.appointment_id = a.appointment_id
                         AND i.invitee_id = $1
                         AND i.status = 'accepted'
                   )
               )
             ORDER BY a.start_time, a.appointment_id"
        ))
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn pending_appointments(&self, user_id: i64) -> Result<Vec<AppointmentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
            "SELECT {APPOINTMENT_COLUMNS}
             FROM appointments a
             JOIN users h ON h.user_id = a.host_id AND h.deleted_at IS NULL
             JOIN invitations i ON i.appointment_id = a.appointment_id
             WHERE i.invitee_id = $1
               AND a.host_id <> $1
               AND i.status = 'pending'
             ORDER BY a.start_time, a.appointment_id"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn attendants(&self, appointment_ids: &[i64]) -> Result<Vec<Attendant>, StoreError> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let attendants = sqlx::query_as::<_, Attendant>(
            "SELECT i.invitation_id, i.appointment_id, i.invitee_id, i.status, i.created_at,
                    u.username, u.name, u.timezone
             FROM invitations i
             JOIN users u ON u.user_id = i.invitee_id AND u.deleted_at IS NULL
             WHERE i.appointment_id = ANY($1)
             ORDER BY i.appointment_id, i.invitation_id",
        )
        .bind(appointment_ids)
        .fetch_all(&self.db)
        .await?;
        Ok(attendants)
    }

    async fn update_invitation_status(
        &self,
        invitee_id: i64,
        invitation_id: i64,
        status: InvitationStatus,
    ) -> Result<Option<InvitationStatus>, StoreError> {
        // The self-join exposes the row as it was before this statement.
        let previous = sqlx::query_as::<_, (InvitationStatus,)>(
            "UPDATE invitations i SET status = $1
             FROM invitations prev
             WHERE prev.invitation_id = i.invitation_id
               AND i.invitation_id = $2
               AND i.invitee_id = $3
             RETURNING prev.status",
        )
        .bind(status)
        .bind(invitation_id)
        .bind(invitee_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(previous.map(|(s,)| s))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn insert_appointment(&mut self, new: &NewAppointment) -> Result<Appointment, StoreError> {
        let appointment = sqlx::query_as::<_, Appointment>(
            "INSERT INTO appointments (host_id, title, start_time, end_time)
             SELECT $1, $2, $3, $4
             WHERE EXISTS (
                 SELECT 1 FROM users
                 WHERE user_id = $1 AND deleted_at IS NULL
                 FOR SHARE
             )
             RETURNING appointment_id, host_id, title, start_time, end_time, created_at",
        )
        .bind(new.host_id)
        .bind(&new.title)
        .bind(new.start_time)
        .bind(new.end_time)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        appointment.ok_or_else(|| StoreError::Constraint("appointments_host_id_fkey".into()))
    }

    async fn insert_invitations(&mut self, rows: &[NewInvitation]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let invitee_ids: Vec<i64> = rows.iter().map(|r| r.invitee_id).collect();
        let live: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM users
             WHERE user_id = ANY($1) AND deleted_at IS NULL
             FOR SHARE",
        )
        .bind(&invitee_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        if invitee_ids.iter().any(|id| !live.contains(id)) {
            return Err(StoreError::Constraint("invitations_invitee_id_fkey".into()));
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO invitations (appointment_id, invitee_id, status, notes, created_at) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.appointment_id)
                .push_bind(row.invitee_id)
                .push_bind(row.status)
                .push_bind(row.notes.as_str())
                .push_bind(row.created_at);
        });
        builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
