use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::ProjectRole;
use crate::errors::{AppError, AppResult};
use crate::models::{parse_enum, parse_uuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    OnTrack,
    AtRisk,
    OffTrack,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectVisibility {
    Public,
    InviteOnly,
}

/// Direct project role entry, persisted as `{"userId": ..., "role": ...}`
/// in the project `roles` JSON column. Unlike workspace members there is no
/// legacy encoding here; role strings are the capitalized project vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub user_id: Uuid,
    pub role: ProjectRole,
}

pub fn decode_roles(raw: &str) -> AppResult<Vec<ProjectMember>> {
    Ok(serde_json::from_str(raw)?)
}

pub fn encode_roles(roles: &[ProjectMember]) -> AppResult<String> {
    Ok(serde_json::to_string(roles)?)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub status: ProjectStatus,
    pub visibility: ProjectVisibility,
    pub roles: Vec<ProjectMember>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn role_of(&self, user_id: Uuid) -> Option<ProjectRole> {
        self.roles
            .iter()
            .find(|r| r.user_id == user_id)
            .map(|r| r.role)
    }

    /// Idempotent enrollment; keeps an existing entry as-is (lazy enrollment
    /// never demotes). Returns whether the roles collection changed.
    pub fn enroll(&mut self, user_id: Uuid, role: ProjectRole) -> bool {
        if self.role_of(user_id).is_some() {
            return false;
        }
        self.roles.push(ProjectMember { user_id, role });
        true
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub status: String,
    pub visibility: String,
    pub roles: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbProject> for Project {
    type Error = AppError;

    fn try_from(row: DbProject) -> Result<Self, Self::Error> {
        Ok(Project {
            id: parse_uuid(&row.id, "projects.id")?,
            workspace_id: parse_uuid(&row.workspace_id, "projects.workspace_id")?,
            status: parse_enum(&row.status, "projects.status")?,
            visibility: parse_enum(&row.visibility, "projects.visibility")?,
            roles: decode_roles(&row.roles)?,
            name: row.name,
            description: row.description,
            color: row.color,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[schema(example = "Prepare milestones for the product launch.")]
    pub description: Option<String>,
    #[schema(example = "#3498db")]
    pub color: Option<String>,
    pub status: Option<ProjectStatus>,
    pub visibility: Option<ProjectVisibility>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub status: Option<ProjectStatus>,
    pub visibility: Option<ProjectVisibility>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddProjectMemberRequest {
    pub user_id: Uuid,
    pub role: Option<ProjectRole>,
}
