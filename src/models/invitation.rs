use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a single invitation: `pending` until its invitee decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// The two moves an invitee can make on a pending invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn target(self) -> InvitationStatus {
        match self {
            Self::Accept => InvitationStatus::Accepted,
            Self::Reject => InvitationStatus::Rejected,
        }
    }
}

/// Status as seen by the requesting user: either their own invitation
/// status, or `host` when they own the appointment and hold no invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerStatus {
    Pending,
    Accepted,
    Rejected,
    Host,
}

impl From<InvitationStatus> for ViewerStatus {
    fn from(status: InvitationStatus) -> Self {
        match status {
            InvitationStatus::Pending => Self::Pending,
            InvitationStatus::Accepted => Self::Accepted,
            InvitationStatus::Rejected => Self::Rejected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub appointment_id: i64,
    pub invitee_id: i64,
    pub status: InvitationStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

/// An invitation joined with its invitee's public details.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Attendant {
    pub invitation_id: i64,
    pub appointment_id: i64,
    pub invitee_id: i64,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub name: String,
    pub timezone: String,
}

/// Result of an invitee acting on an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied { previous: InvitationStatus },
    /// No invitation with that id belongs to the acting user.
    NoMatch,
}
