pub mod invitations;
pub mod view;

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::models::appointment::{
    Appointment, AppointmentView, CreatedAppointment, DateRange, NewAppointment,
};
use crate::models::invitation::{InvitationStatus, NewInvitation};
use crate::store::{BookingStore, BookingTx, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("user not found")]
    UserNotFound,
    #[error("appointment was not created: {0}")]
    TransactionAborted(#[source] StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    users: Arc<dyn UserStore>,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, users: Arc<dyn UserStore>) -> Self {
        Self { store, users }
    }

    /// Creates the appointment and one pending invitation per invitee in a
    /// single transaction: either all rows land or none do.
    pub async fn create_appointment(
        &self,
        new: NewAppointment,
    ) -> Result<CreatedAppointment, BookingError> {
        let invitee_ids = distinct_invitees(new.host_id, &new.invitee_ids);

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(BookingError::TransactionAborted)?;

        let outcome = fan_out(&mut *tx, &new, &invitee_ids).await;
        match outcome {
            Ok(appointment) => {
                tx.commit()
                    .await
                    .map_err(BookingError::TransactionAborted)?;
                tracing::info!(
                    appointment_id = appointment.appointment_id,
                    host_id = appointment.host_id,
                    invitees = invitee_ids.len(),
                    "appointment booked"
                );
                Ok(CreatedAppointment {
                    appointment,
                    invitee_ids,
                })
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                Err(BookingError::TransactionAborted(e))
            }
        }
    }

    /// Appointments starting in `range` that the user hosts or has accepted,
    /// with times in the user's own timezone.
    pub async fn list_appointments_for_user(
        &self,
        user_id: i64,
        range: DateRange,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        let viewer = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(BookingError::UserNotFound)?;

        let records = self.store.visible_appointments(user_id, range).await?;
        Ok(view::load_views(self.store.as_ref(), &viewer, records).await?)
    }
}

async fn fan_out(
    tx: &mut dyn BookingTx,
    new: &NewAppointment,
    invitee_ids: &[i64],
) -> Result<Appointment, StoreError> {
    let appointment = tx.insert_appointment(new).await?;

    let created_at = Utc::now();
    let rows: Vec<NewInvitation> = invitee_ids
        .iter()
        .map(|&invitee_id| NewInvitation {
            appointment_id: appointment.appointment_id,
            invitee_id,
            status: InvitationStatus::Pending,
            notes: String::new(),
            created_at,
        })
        .collect();
    tx.insert_invitations(&rows).await?;

    Ok(appointment)
}

/// Invitees in request order without repeats. The host is never invited to
/// their own appointment.
fn distinct_invitees(host_id: i64, requested: &[i64]) -> Vec<i64> {
    let mut seen = Vec::with_capacity(requested.len());
    for &id in requested {
        if id != host_id && !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
