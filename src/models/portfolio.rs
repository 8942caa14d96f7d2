use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{parse_enum, parse_uuid};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PortfolioStatus {
    OnTrack,
    AtRisk,
    OffTrack,
    Completed,
    #[default]
    NoStatus,
}

/// A named grouping of projects within a workspace. Unlike goals there is no
/// private flag; any workspace member may read a portfolio.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Portfolio {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub projects: Vec<Uuid>,
    pub status: PortfolioStatus,
    pub progress: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn decode_portfolio_projects(raw: &str) -> AppResult<Vec<Uuid>> {
    let ids: Vec<String> = serde_json::from_str(raw)?;
    ids.iter()
        .map(|id| parse_uuid(id, "portfolios.projects"))
        .collect()
}

pub fn encode_portfolio_projects(projects: &[Uuid]) -> AppResult<String> {
    let ids: Vec<String> = projects.iter().map(Uuid::to_string).collect();
    Ok(serde_json::to_string(&ids)?)
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPortfolio {
    pub id: String,
    pub workspace_id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub projects: String,
    pub status: String,
    pub progress: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbPortfolio> for Portfolio {
    type Error = AppError;

    fn try_from(row: DbPortfolio) -> Result<Self, Self::Error> {
        Ok(Portfolio {
            id: parse_uuid(&row.id, "portfolios.id")?,
            workspace_id: parse_uuid(&row.workspace_id, "portfolios.workspace_id")?,
            owner_id: parse_uuid(&row.owner_id, "portfolios.owner_id")?,
            projects: decode_portfolio_projects(&row.projects)?,
            status: parse_enum(&row.status, "portfolios.status")?,
            name: row.name,
            description: row.description,
            progress: row.progress,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PortfolioCreateRequest {
    #[schema(example = "Growth initiatives")]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub projects: Vec<Uuid>,
    pub status: Option<PortfolioStatus>,
    pub progress: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PortfolioUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub projects: Option<Vec<Uuid>>,
    pub status: Option<PortfolioStatus>,
    pub progress: Option<i64>,
}
