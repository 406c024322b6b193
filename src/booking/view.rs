//! Builds the per-user projection of appointments.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::models::appointment::{AppointmentRecord, AppointmentView, AttendantPreview};
use crate::models::invitation::{Attendant, ViewerStatus};
use crate::models::user::User;
use crate::store::{BookingStore, StoreError};

pub const PREVIEW_LIMIT: usize = 3;

/// Parses a stored IANA name, falling back to UTC for names the tz database
/// does not know.
pub fn zone_for(timezone: &str) -> Tz {
    timezone.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone, "unknown timezone, presenting times in UTC");
        Tz::UTC
    })
}

pub fn to_zone(instant: DateTime<Utc>, zone: Tz) -> DateTime<FixedOffset> {
    instant.with_timezone(&zone).fixed_offset()
}

pub async fn load_views(
    store: &dyn BookingStore,
    viewer: &User,
    records: Vec<AppointmentRecord>,
) -> Result<Vec<AppointmentView>, StoreError> {
    let ids: Vec<i64> = records.iter().map(|r| r.appointment.appointment_id).collect();
    let attendants = store.attendants(&ids).await?;
    Ok(assemble(
        viewer.user_id,
        zone_for(&viewer.timezone),
        records,
        attendants,
    ))
}

pub fn assemble(
    viewer_id: i64,
    zone: Tz,
    records: Vec<AppointmentRecord>,
    attendants: Vec<Attendant>,
) -> Vec<AppointmentView> {
    let mut by_appointment: HashMap<i64, Vec<Attendant>> = HashMap::new();
    for attendant in attendants {
        by_appointment
            .entry(attendant.appointment_id)
            .or_default()
            .push(attendant);
    }

    let mut views = Vec::with_capacity(records.len());
    for AppointmentRecord { appointment, host } in records {
        let mut invited = by_appointment
            .remove(&appointment.appointment_id)
            .unwrap_or_default();
        invited.sort_by_key(|a| a.invitation_id);

        let own = invited.iter().find(|a| a.invitee_id == viewer_id);
        let (invitation_id, status, invitation_created_at) = match own {
            Some(a) => (Some(a.invitation_id), a.status.into(), a.created_at),
            None if appointment.host_id == viewer_id => {
                (None, ViewerStatus::Host, appointment.created_at)
            }
            None => continue,
        };

        let attendants = invited
            .iter()
            .take(PREVIEW_LIMIT)
            .map(|a| AttendantPreview {
                invitation_id: a.invitation_id,
                invitee_id: a.invitee_id,
                username: a.username.clone(),
                name: a.name.clone(),
                timezone: a.timezone.clone(),
                status: a.status.into(),
            })
            .collect();

        views.push(AppointmentView {
            appointment_id: appointment.appointment_id,
            title: appointment.title,
            start_time: to_zone(appointment.start_time, zone),
            end_time: to_zone(appointment.end_time, zone),
            created_at: appointment.created_at,
            host,
            total_attendants: invited.len(),
            attendants,
            invitation_id,
            invitee_id: viewer_id,
            status,
            invitation_created_at,
        });
    }

    views.sort_by_key(|v| (v.start_time, v.appointment_id));
    views
}
