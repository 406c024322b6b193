use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::invitation::ViewerStatus;
use super::user::UserSummary;

/// A stored appointment. Times are always UTC at rest.
#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct Appointment {
    pub appointment_id: i64,
    pub host_id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub host_id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub invitee_ids: Vec<i64>,
}

/// The appointment returned to its host right after booking.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub invitee_ids: Vec<i64>,
}

/// An appointment together with its host's public details.
#[derive(Debug, Clone)]
pub struct AppointmentRecord {
    pub appointment: Appointment,
    pub host: UserSummary,
}

/// Half-open `[start, end)` window on appointment start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Whole UTC days from `first` through `last`, both inclusive.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        let end = last.checked_add_days(Days::new(1)).unwrap_or(last);
        Self {
            start: first.and_time(NaiveTime::MIN).and_utc(),
            end: end.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttendantPreview {
    pub invitation_id: i64,
    pub invitee_id: i64,
    pub username: String,
    pub name: String,
    pub timezone: String,
    pub status: ViewerStatus,
}

/// Per-user projection of an appointment, with times in the viewer's timezone.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppointmentView {
    pub appointment_id: i64,
    pub title: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub created_at: DateTime<Utc>,
    pub host: UserSummary,
    pub total_attendants: usize,
    pub attendants: Vec<AttendantPreview>,
    pub invitation_id: Option<i64>,
    pub invitee_id: i64,
    pub status: ViewerStatus,
    pub invitation_created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub invitee_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
