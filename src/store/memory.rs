//! In-process stand-ins for Postgres and Redis, with the same integrity
//! rules the schema enforces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{BookingStore, BookingTx, SessionStore, StoreError, UserStore};
use crate::auth::password;
use crate::models::appointment::{Appointment, AppointmentRecord, DateRange, NewAppointment};
use crate::models::invitation::{Attendant, InvitationStatus, NewInvitation};
use crate::models::user::{NewUser, User, UserRole, UserSummary};

pub const TEST_PASSWORD: &str = "correct horse battery";

fn test_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| password::hash_password(TEST_PASSWORD).unwrap())
        .clone()
}

#[derive(Debug, Clone)]
pub struct InvitationRow {
    pub invitation_id: i64,
    pub appointment_id: i64,
    pub invitee_id: i64,
    pub status: InvitationStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    appointments: Vec<Appointment>,
    invitations: Vec<InvitationRow>,
    next_user_id: i64,
    next_appointment_id: i64,
    next_invitation_id: i64,
}

impl State {
    fn live_user(&self, user_id: i64) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.user_id == user_id && u.deleted_at.is_none())
    }

    fn record(&self, appointment: &Appointment) -> Option<AppointmentRecord> {
        let host = self.live_user(appointment.host_id)?;
        Some(AppointmentRecord {
            appointment: appointment.clone(),
            host: UserSummary {
                username: host.username.clone(),
                name: host.name.clone(),
                timezone: host.timezone.clone(),
            },
        })
    }

    fn records<'a>(
        &self,
        appointments: impl Iterator<Item = &'a Appointment>,
    ) -> Vec<AppointmentRecord> {
        let mut records: Vec<_> = appointments.filter_map(|a| self.record(a)).collect();
        records.sort_by_key(|r| (r.appointment.start_time, r.appointment.appointment_id));
        records
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Adds a live user whose password is [`TEST_PASSWORD`].
    pub fn seed_user(&self, username: &str, timezone: &str) -> User {
        let mut state = self.lock();
        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            user_id: state.next_user_id,
            name: username.to_uppercase(),
            username: username.to_string(),
            role: UserRole::Member,
            password_hash: test_password_hash(),
            timezone: timezone.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.users.push(user.clone());
        user
    }

    pub fn soft_delete(&self, user_id: i64) {
        let mut state = self.lock();
        if let Some(user) = state.users.iter_mut().find(|u| u.user_id == user_id) {
            user.deleted_at = Some(Utc::now());
        }
    }

    pub fn appointments(&self) -> Vec<Appointment> {
        self.lock().appointments.clone()
    }

    pub fn invitations(&self) -> Vec<InvitationRow> {
        self.lock().invitations.clone()
    }

    pub fn invitation_for(&self, appointment_id: i64, invitee_id: i64) -> Option<InvitationRow> {
        self.lock()
            .invitations
            .iter()
            .find(|i| i.appointment_id == appointment_id && i.invitee_id == invitee_id)
            .cloned()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().live_user(user_id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<_> = self
            .lock()
            .users
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update_timezone(
        &self,
        user_id: i64,
        timezone: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.lock();
        let Some(user) = state
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id && u.deleted_at.is_none())
        else {
            return Ok(None);
        };
        user.timezone = timezone.to_string();
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn insert(&self, new: &NewUser) -> Result<User, StoreError> {
        let mut state = self.lock();
        if state.users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Constraint("users_username_key".into()));
        }
        state.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            user_id: state.next_user_id,
            name: new.name.clone(),
            username: new.username.clone(),
            role: new.role,
            password_hash: new.password_hash.clone(),
            timezone: new.timezone.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn BookingTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            state: Arc::clone(&self.state),
            appointments: Vec::new(),
            invitations: Vec::new(),
        }))
    }

    async fn visible_appointments(
        &self,
        user_id: i64,
        range: DateRange,
    ) -> Result<Vec<AppointmentRecord>, StoreError> {
        let state = self.lock();
        let visible = state.appointments.iter().filter(|a| {
            range.contains(a.start_time)
                && (a.host_id == user_id
                    || state.invitations.iter().any(|i| {
                        i.appointment_id == a.appointment_id
                            && i.invitee_id == user_id
                            && i.status == InvitationStatus::Accepted
                    }))
        });
        Ok(state.records(visible))
    }

    async fn pending_appointments(&self, user_id: i64) -> Result<Vec<AppointmentRecord>, StoreError> {
        let state = self.lock();
        let pending = state.appointments.iter().filter(|a| {
            a.host_id != user_id
                && state.invitations.iter().any(|i| {
                    i.appointment_id == a.appointment_id
                        && i.invitee_id == user_id
                        && i.status == InvitationStatus::Pending
                })
        });
        Ok(state.records(pending))
    }

    async fn attendants(&self, appointment_ids: &[i64]) -> Result<Vec<Attendant>, StoreError> {
        let state = self.lock();
        let mut attendants: Vec<_> = state
            .invitations
            .iter()
            .filter(|i| appointment_ids.contains(&i.appointment_id))
            .filter_map(|i| {
                let user = state.live_user(i.invitee_id)?;
                Some(Attendant {
                    invitation_id: i.invitation_id,
                    appointment_id: i.appointment_id,
                    invitee_id: i.invitee_id,
                    status: i.status,
                    created_at: i.created_at,
                    username: user.username.clone(),
                    name: user.name.clone(),
                    timezone: user.timezone.clone(),
                })
            })
            .collect();
        attendants.sort_by_key(|a| (a.appointment_id, a.invitation_id));
        Ok(attendants)
    }

    async fn update_invitation_status(
        &self,
        invitee_id: i64,
        invitation_id: i64,
        status: InvitationStatus,
    ) -> Result<Option<InvitationStatus>, StoreError> {
        let mut state = self.lock();
        let Some(row) = state
            .invitations
            .iter_mut()
            .find(|i| i.invitation_id == invitation_id && i.invitee_id == invitee_id)
        else {
            return Ok(None);
        };
        let previous = row.status;
        row.status = status;
        Ok(Some(previous))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Writes are staged here and only reach the shared state on commit.
struct MemoryTx {
    state: Arc<Mutex<State>>,
    appointments: Vec<Appointment>,
    invitations: Vec<InvitationRow>,
}

#[async_trait]
impl BookingTx for MemoryTx {
    async fn insert_appointment(&mut self, new: &NewAppointment) -> Result<Appointment, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.live_user(new.host_id).is_none() {
            return Err(StoreError::Constraint("appointments_host_id_fkey".into()));
        }
        state.next_appointment_id += 1;
        let appointment = Appointment {
            appointment_id: state.next_appointment_id,
            host_id: new.host_id,
            title: new.title.clone(),
            start_time: new.start_time,
            end_time: new.end_time,
            created_at: Utc::now(),
        };
        self.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn insert_invitations(&mut self, rows: &[NewInvitation]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            let appointment_known = self
                .appointments
                .iter()
                .chain(&state.appointments)
                .any(|a| a.appointment_id == row.appointment_id);
            if !appointment_known {
                return Err(StoreError::Constraint("invitations_appointment_id_fkey".into()));
            }
            if state.live_user(row.invitee_id).is_none() {
                return Err(StoreError::Constraint("invitations_invitee_id_fkey".into()));
            }
            let duplicate = self
                .invitations
                .iter()
                .chain(&state.invitations)
                .chain(&staged)
                .any(|i| i.appointment_id == row.appointment_id && i.invitee_id == row.invitee_id);
            if duplicate {
                return Err(StoreError::Constraint(
                    "invitations_appointment_id_invitee_id_key".into(),
                ));
            }
            state.next_invitation_id += 1;
            staged.push(InvitationRow {
                invitation_id: state.next_invitation_id,
                appointment_id: row.appointment_id,
                invitee_id: row.invitee_id,
                status: row.status,
                notes: row.notes.clone(),
                created_at: row.created_at,
            });
        }
        self.invitations.extend(staged);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx {
            state,
            appointments,
            invitations,
        } = *self;
        let mut state = state.lock().unwrap();
        state.appointments.extend(appointments);
        state.invitations.extend(invitations);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Session store with Redis-like expiry semantics.
#[derive(Clone, Default)]
pub struct MemorySessions {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw payload and remaining lifetime, ignoring expiry.
    pub fn entry(&self, key: &str) -> Option<(String, Duration)> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .map(|(v, at)| (v.clone(), at.saturating_duration_since(Instant::now())))
    }

    pub fn evict(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            (value.to_string(), Instant::now() + Duration::from_secs(3600)),
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
