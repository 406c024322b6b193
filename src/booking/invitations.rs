use std::sync::Arc;

use super::{BookingError, view};
use crate::models::appointment::AppointmentView;
use crate::models::invitation::{Decision, StatusChange};
use crate::store::{BookingStore, UserStore};

/// Invitee-side operations: what is waiting for an answer, and answering it.
#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn BookingStore>,
    users: Arc<dyn UserStore>,
}

impl InvitationService {
    pub fn new(store: Arc<dyn BookingStore>, users: Arc<dyn UserStore>) -> Self {
        Self { store, users }
    }

    pub async fn list_pending(&self, user_id: i64) -> Result<Vec<AppointmentView>, BookingError> {
        let viewer = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(BookingError::UserNotFound)?;

        let records = self.store.pending_appointments(user_id).await?;
        Ok(view::load_views(self.store.as_ref(), &viewer, records).await?)
    }

    /// Moves the invitation owned by `user_id` to the decided status.
    ///
    /// Only the owning invitee can change an invitation; any other id yields
    /// `NoMatch` without touching the store. An earlier decision can be
    /// overridden by a later one.
    pub async fn set_status(
        &self,
        user_id: i64,
        invitation_id: i64,
        decision: Decision,
    ) -> Result<StatusChange, BookingError> {
        let target = decision.target();
        let previous = self
            .store
            .update_invitation_status(user_id, invitation_id, target)
            .await?;

        match previous {
            Some(previous) => {
                if previous.is_terminal() && previous != target {
                    tracing::warn!(
                        user_id,
                        invitation_id,
                        ?previous,
                        ?target,
                        "earlier decision overridden"
                    );
                }
                tracing::info!(user_id, invitation_id, status = ?target, "invitation updated");
                Ok(StatusChange::Applied { previous })
            }
            None => {
                tracing::warn!(user_id, invitation_id, "no invitation of this user matched");
                Ok(StatusChange::NoMatch)
            }
        }
    }
}
