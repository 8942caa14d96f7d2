use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role of a user within a workspace. Serialized lowercase, matching the
/// persisted `members` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    Member,
}

/// Role of a user within a single project. Persisted project `roles` entries
/// use the capitalized vocabulary (`Owner|Admin|Member`), distinct from the
/// lowercase workspace roles; both are kept for compatibility with existing
/// data and related only through the explicit `From` mapping below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ProjectRole {
    Owner,
    Admin,
    Member,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Admin => "admin",
            WorkspaceRole::Member => "member",
        }
    }
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "Owner",
            ProjectRole::Admin => "Admin",
            ProjectRole::Member => "Member",
        }
    }
}

impl From<WorkspaceRole> for ProjectRole {
    fn from(role: WorkspaceRole) -> Self {
        match role {
            WorkspaceRole::Owner => ProjectRole::Owner,
            WorkspaceRole::Admin => ProjectRole::Admin,
            WorkspaceRole::Member => ProjectRole::Member,
        }
    }
}

impl std::fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&WorkspaceRole::Owner).unwrap(), "\"owner\"");
        assert_eq!(serde_json::to_string(&WorkspaceRole::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn project_roles_serialize_capitalized() {
        assert_eq!(serde_json::to_string(&ProjectRole::Owner).unwrap(), "\"Owner\"");
        assert_eq!(serde_json::to_string(&ProjectRole::Member).unwrap(), "\"Member\"");
    }

    #[test]
    fn workspace_to_project_mapping_preserves_rank() {
        assert_eq!(ProjectRole::from(WorkspaceRole::Owner), ProjectRole::Owner);
        assert_eq!(ProjectRole::from(WorkspaceRole::Admin), ProjectRole::Admin);
        assert_eq!(ProjectRole::from(WorkspaceRole::Member), ProjectRole::Member);
    }
}
