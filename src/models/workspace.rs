use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::WorkspaceRole;
use crate::errors::AppResult;
use crate::models::parse_uuid;

/// Canonical in-memory member entry. Persisted as
/// `{"userId": "...", "role": "..."}` in the workspace `members` JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: Uuid,
    pub role: WorkspaceRole,
}

/// Storage-boundary shape of a single `members` element. Two historical
/// encodings exist: a bare user id (legacy, implies role `member`) and the
/// `{userId, role}` object. The untagged decode checks each element's shape
/// rather than guessing from array position; nothing past this point ever
/// sees the legacy form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MemberRecord {
    Entry(Member),
    Bare(Uuid),
}

impl From<MemberRecord> for Member {
    fn from(record: MemberRecord) -> Self {
        match record {
            MemberRecord::Entry(member) => member,
            MemberRecord::Bare(user_id) => Member {
                user_id,
                role: WorkspaceRole::Member,
            },
        }
    }
}

/// Decode a persisted `members` column, tolerating both encodings and
/// dropping duplicate user ids (first entry wins).
pub fn decode_members(raw: &str) -> AppResult<Vec<Member>> {
    let records: Vec<MemberRecord> = serde_json::from_str(raw)?;

    let mut members: Vec<Member> = Vec::with_capacity(records.len());
    for record in records {
        let member = Member::from(record);
        if members.iter().all(|m| m.user_id != member.user_id) {
            members.push(member);
        }
    }
    Ok(members)
}

/// Serialize members in canonical object form. Every save path goes through
/// this, so legacy rows migrate to the new shape as they are touched.
pub fn encode_members(members: &[Member]) -> AppResult<String> {
    Ok(serde_json::to_string(members)?)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub members: Vec<Member>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// Role recorded in the membership collection, ignoring `owner_id`.
    /// Use `authz::resolve_workspace_role` for the effective role.
    pub fn member_role(&self, user_id: Uuid) -> Option<WorkspaceRole> {
        self.members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.role)
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id || self.member_role(user_id).is_some()
    }

    /// Idempotent upsert: a present entry keeps its slot (role updated),
    /// otherwise the member is appended. Returns whether anything changed.
    pub fn upsert_member(&mut self, user_id: Uuid, role: WorkspaceRole) -> bool {
        if let Some(entry) = self.members.iter_mut().find(|m| m.user_id == user_id) {
            if entry.role == role {
                return false;
            }
            entry.role = role;
            return true;
        }
        self.members.push(Member { user_id, role });
        true
    }

    /// Remove a member entry, returning it so the caller can inspect the
    /// removed role.
    pub fn remove_member(&mut self, user_id: Uuid) -> Option<Member> {
        let idx = self.members.iter().position(|m| m.user_id == user_id)?;
        Some(self.members.remove(idx))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbWorkspace {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub members: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbWorkspace> for Workspace {
    type Error = crate::errors::AppError;

    fn try_from(row: DbWorkspace) -> Result<Self, Self::Error> {
        Ok(Workspace {
            id: parse_uuid(&row.id, "workspaces.id")?,
            owner_id: parse_uuid(&row.owner_id, "workspaces.owner_id")?,
            members: decode_members(&row.members)?,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WorkspaceCreateRequest {
    #[schema(example = "Marketing Team")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WorkspaceUpdateRequest {
    #[schema(example = "Marketing Team 2.0")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: WorkspaceRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRoleRequest {
    pub role: WorkspaceRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_object_members() {
        let id = Uuid::new_v4();
        let raw = format!(r#"[{{"userId":"{id}","role":"admin"}}]"#);
        let members = decode_members(&raw).unwrap();
        assert_eq!(members, vec![Member { user_id: id, role: WorkspaceRole::Admin }]);
    }

    #[test]
    fn decodes_legacy_bare_ids_as_members() {
        let id = Uuid::new_v4();
        let raw = format!(r#"["{id}"]"#);
        let members = decode_members(&raw).unwrap();
        assert_eq!(members, vec![Member { user_id: id, role: WorkspaceRole::Member }]);
    }

    #[test]
    fn decodes_mixed_shapes_per_element() {
        let legacy = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let raw = format!(r#"["{legacy}",{{"userId":"{admin}","role":"admin"}}]"#);
        let members = decode_members(&raw).unwrap();
        assert_eq!(members[0].role, WorkspaceRole::Member);
        assert_eq!(members[1].role, WorkspaceRole::Admin);
    }

    #[test]
    fn duplicate_user_ids_collapse_to_first_entry() {
        let id = Uuid::new_v4();
        let raw = format!(r#"[{{"userId":"{id}","role":"admin"}},"{id}"]"#);
        let members = decode_members(&raw).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, WorkspaceRole::Admin);
    }

    #[test]
    fn encode_is_always_canonical_object_form() {
        let id = Uuid::new_v4();
        let raw = format!(r#"["{id}"]"#);
        let members = decode_members(&raw).unwrap();
        let encoded = encode_members(&members).unwrap();
        assert!(encoded.contains("userId"));
        assert!(encoded.contains("\"member\""));
    }

    #[test]
    fn upsert_member_does_not_duplicate() {
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let mut ws = Workspace {
            id: Uuid::new_v4(),
            name: "t".into(),
            owner_id: owner,
            members: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(ws.upsert_member(user, WorkspaceRole::Member));
        assert!(!ws.upsert_member(user, WorkspaceRole::Member));
        assert!(ws.upsert_member(user, WorkspaceRole::Admin));
        assert_eq!(ws.members.len(), 1);
    }
}
