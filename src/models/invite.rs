use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::WorkspaceRole;
use crate::errors::{AppError, AppResult};
use crate::models::parse_uuid;

/// Invite lifecycle. `accepted`, `expired` and `revoked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Expired => "expired",
            InviteStatus::Revoked => "revoked",
        }
    }
}

/// Who terminated a revoked invite. Both paths share the `revoked` terminal
/// state; the reason distinguishes inviter-cancel from invitee-reject so
/// notifications can phrase the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RevokeReason {
    Cancelled,
    Rejected,
}

impl RevokeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevokeReason::Cancelled => "cancelled",
            RevokeReason::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Invite {
    pub id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_id: Uuid,
    pub workspace_id: Uuid,
    pub selected_projects: Vec<Uuid>,
    pub role: WorkspaceRole,
    pub status: InviteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_reason: Option<RevokeReason>,
    pub invite_token: String,
    pub invite_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration_time
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbInvite {
    pub id: String,
    pub inviter_id: String,
    pub invitee_id: String,
    pub workspace_id: String,
    pub selected_projects: String,
    pub role: String,
    pub status: String,
    pub revoked_reason: Option<String>,
    pub invite_token: String,
    pub invite_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}

fn parse_enum<T: serde::de::DeserializeOwned>(value: &str, field: &str) -> AppResult<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|err| AppError::internal(format!("malformed value in column {field}: {err}")))
}

impl TryFrom<DbInvite> for Invite {
    type Error = AppError;

    fn try_from(row: DbInvite) -> Result<Self, Self::Error> {
        let selected: Vec<String> = serde_json::from_str(&row.selected_projects)?;
        let selected_projects = selected
            .iter()
            .map(|id| parse_uuid(id, "invites.selected_projects"))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Invite {
            id: parse_uuid(&row.id, "invites.id")?,
            inviter_id: parse_uuid(&row.inviter_id, "invites.inviter_id")?,
            invitee_id: parse_uuid(&row.invitee_id, "invites.invitee_id")?,
            workspace_id: parse_uuid(&row.workspace_id, "invites.workspace_id")?,
            selected_projects,
            role: parse_enum(&row.role, "invites.role")?,
            status: parse_enum(&row.status, "invites.status")?,
            revoked_reason: row
                .revoked_reason
                .as_deref()
                .map(|reason| parse_enum(reason, "invites.revoked_reason"))
                .transpose()?,
            invite_token: row.invite_token,
            invite_time: row.invite_time,
            expiration_time: row.expiration_time,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InviteCreateRequest {
    pub invitee_id: Uuid,
    pub workspace_id: Uuid,
    /// Projects the invitee gains access to on acceptance.
    #[serde(default)]
    pub selected_projects: Vec<Uuid>,
    /// Workspace role granted on acceptance; defaults to `member`.
    pub role: Option<WorkspaceRole>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptInviteRequest {
    pub invite_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inviter_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&InviteStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&RevokeReason::Rejected).unwrap(), "\"rejected\"");
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let invite = Invite {
            id: Uuid::new_v4(),
            inviter_id: Uuid::new_v4(),
            invitee_id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            selected_projects: vec![],
            role: WorkspaceRole::Member,
            status: InviteStatus::Pending,
            revoked_reason: None,
            invite_token: "t".into(),
            invite_time: now,
            expiration_time: now,
        };

        assert!(!invite.is_expired(now));
        assert!(invite.is_expired(now + chrono::Duration::seconds(1)));
    }
}
