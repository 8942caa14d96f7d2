use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{parse_enum, parse_uuid};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    OnTrack,
    AtRisk,
    OffTrack,
    Achieved,
    #[default]
    NoStatus,
}

/// Reporting period a goal is pinned to. Quarter and half labels are stored
/// verbatim; `custom` relies on the explicit start and due dates instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Timeframe {
    Q1,
    Q2,
    Q3,
    Q4,
    H1,
    H2,
    FY,
    #[default]
    #[serde(rename = "custom")]
    Custom,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Goal {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: GoalStatus,
    pub progress: i64,
    pub is_private: bool,
    pub members: Vec<Uuid>,
    pub timeframe: Timeframe,
    pub timeframe_year: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn decode_goal_members(raw: &str) -> AppResult<Vec<Uuid>> {
    let ids: Vec<String> = serde_json::from_str(raw)?;
    ids.iter()
        .map(|id| parse_uuid(id, "goals.members"))
        .collect()
}

pub fn encode_goal_members(members: &[Uuid]) -> AppResult<String> {
    let ids: Vec<String> = members.iter().map(Uuid::to_string).collect();
    Ok(serde_json::to_string(&ids)?)
}

#[derive(Debug, Clone, FromRow)]
pub struct DbGoal {
    pub id: String,
    pub workspace_id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub progress: i64,
    pub is_private: bool,
    pub members: String,
    pub timeframe: String,
    pub timeframe_year: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbGoal> for Goal {
    type Error = AppError;

    fn try_from(row: DbGoal) -> Result<Self, Self::Error> {
        Ok(Goal {
            id: parse_uuid(&row.id, "goals.id")?,
            workspace_id: parse_uuid(&row.workspace_id, "goals.workspace_id")?,
            owner_id: parse_uuid(&row.owner_id, "goals.owner_id")?,
            status: parse_enum(&row.status, "goals.status")?,
            members: decode_goal_members(&row.members)?,
            timeframe: parse_enum(&row.timeframe, "goals.timeframe")?,
            title: row.title,
            description: row.description,
            progress: row.progress,
            is_private: row.is_private,
            timeframe_year: row.timeframe_year,
            start_date: row.start_date,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoalCreateRequest {
    #[schema(example = "Ship the onboarding revamp")]
    pub title: String,
    pub description: Option<String>,
    pub status: Option<GoalStatus>,
    pub progress: Option<i64>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub members: Vec<Uuid>,
    pub timeframe: Option<Timeframe>,
    pub timeframe_year: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GoalUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<GoalStatus>,
    pub progress: Option<i64>,
    pub is_private: Option<bool>,
    pub members: Option<Vec<Uuid>>,
    pub timeframe: Option<Timeframe>,
    pub timeframe_year: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_timeframe_wire_forms() {
        assert_eq!(serde_json::to_string(&GoalStatus::NoStatus).unwrap(), "\"no-status\"");
        assert_eq!(serde_json::to_string(&GoalStatus::AtRisk).unwrap(), "\"at-risk\"");
        assert_eq!(serde_json::to_string(&Timeframe::Q3).unwrap(), "\"Q3\"");
        assert_eq!(serde_json::to_string(&Timeframe::Custom).unwrap(), "\"custom\"");
    }

    #[test]
    fn members_column_round_trips_as_string_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = encode_goal_members(&[a, b]).unwrap();
        assert!(raw.contains(&a.to_string()));
        assert_eq!(decode_goal_members(&raw).unwrap(), vec![a, b]);
    }
}
