use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{resolve_workspace_role, WorkspaceRole};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::portfolio::{
    encode_portfolio_projects, DbPortfolio, Portfolio, PortfolioCreateRequest, PortfolioStatus,
    PortfolioUpdateRequest,
};
use crate::routes::workspaces::fetch_workspace;
use crate::utils::utc_now;

const SELECT_PORTFOLIO: &str = "SELECT id, workspace_id, owner_id, name, description, projects, \
     status, progress, created_at, updated_at FROM portfolios";

#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}/portfolios",
    tag = "Portfolios",
    params(("workspace_id" = Uuid, Path, description = "Workspace id")),
    responses((status = 200, description = "Portfolios in the workspace", body = [Portfolio]))
)]
pub async fn list_portfolios(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<Portfolio>>> {
    let workspace = fetch_workspace(&state.pool, workspace_id).await?;
    if resolve_workspace_role(&workspace, auth.user_id).is_none() {
        return Err(AppError::forbidden("no access to this workspace"));
    }

    let sql = format!("{SELECT_PORTFOLIO} WHERE workspace_id = ? ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, DbPortfolio>(&sql)
        .bind(workspace_id.to_string())
        .fetch_all(&state.pool)
        .await?;

    let portfolios: Vec<Portfolio> =
        rows.into_iter().map(Portfolio::try_from).collect::<Result<_, _>>()?;
    Ok(Json(portfolios))
}

#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/portfolios",
    tag = "Portfolios",
    params(("workspace_id" = Uuid, Path, description = "Workspace id")),
    request_body = PortfolioCreateRequest,
    responses((status = 201, description = "Portfolio created", body = Portfolio))
)]
pub async fn create_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<PortfolioCreateRequest>,
) -> AppResult<(StatusCode, Json<Portfolio>)> {
    let workspace = fetch_workspace(&state.pool, workspace_id).await?;
    if resolve_workspace_role(&workspace, auth.user_id).is_none() {
        return Err(AppError::forbidden("no access to this workspace"));
    }

    // Listed projects must live in the same workspace.
    for project_id in &payload.projects {
        let project = crate::routes::projects::fetch_project(&state.pool, *project_id).await?;
        if project.workspace_id != workspace_id {
            return Err(AppError::bad_request(format!(
                "project {project_id} does not belong to this workspace"
            )));
        }
    }

    let now = utc_now();
    let portfolio_id = Uuid::new_v4();
    let status = payload.status.unwrap_or_default();

    sqlx::query(
        "INSERT INTO portfolios (id, workspace_id, owner_id, name, description, projects, status, \
         progress, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(portfolio_id.to_string())
    .bind(workspace_id.to_string())
    .bind(auth.user_id.to_string())
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(encode_portfolio_projects(&payload.projects)?)
    .bind(status_str(status))
    .bind(payload.progress.unwrap_or(0))
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let portfolio = fetch_portfolio(&state.pool, portfolio_id).await?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

#[utoipa::path(
    get,
    path = "/portfolios/{id}",
    tag = "Portfolios",
    params(("id" = Uuid, Path, description = "Portfolio id")),
    responses((status = 200, description = "Portfolio detail", body = Portfolio))
)]
pub async fn get_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Portfolio>> {
    let (portfolio, _) = load_portfolio_with_access(&state.pool, auth.user_id, id).await?;
    Ok(Json(portfolio))
}

#[utoipa::path(
    put,
    path = "/portfolios/{id}",
    tag = "Portfolios",
    params(("id" = Uuid, Path, description = "Portfolio id")),
    request_body = PortfolioUpdateRequest,
    responses((status = 200, description = "Portfolio updated", body = Portfolio))
)]
pub async fn update_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PortfolioUpdateRequest>,
) -> AppResult<Json<Portfolio>> {
    let (mut portfolio, _) = load_portfolio_with_access(&state.pool, auth.user_id, id).await?;

    if let Some(name) = payload.name {
        portfolio.name = name;
    }
    if let Some(description) = payload.description {
        portfolio.description = Some(description);
    }
    if let Some(projects) = payload.projects {
        for project_id in &projects {
            let project = crate::routes::projects::fetch_project(&state.pool, *project_id).await?;
            if project.workspace_id != portfolio.workspace_id {
                return Err(AppError::bad_request(format!(
                    "project {project_id} does not belong to this workspace"
                )));
            }
        }
        portfolio.projects = projects;
    }
    if let Some(status) = payload.status {
        portfolio.status = status;
    }
    if let Some(progress) = payload.progress {
        portfolio.progress = progress;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE portfolios SET name = ?, description = ?, projects = ?, status = ?, progress = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(&portfolio.name)
    .bind(&portfolio.description)
    .bind(encode_portfolio_projects(&portfolio.projects)?)
    .bind(status_str(portfolio.status))
    .bind(portfolio.progress)
    .bind(now)
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    portfolio.updated_at = now;
    Ok(Json(portfolio))
}

#[utoipa::path(
    delete,
    path = "/portfolios/{id}",
    tag = "Portfolios",
    params(("id" = Uuid, Path, description = "Portfolio id")),
    responses((status = 204, description = "Portfolio deleted"))
)]
pub async fn delete_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (portfolio, workspace_role) = load_portfolio_with_access(&state.pool, auth.user_id, id).await?;

    let privileged = matches!(
        workspace_role,
        Some(WorkspaceRole::Owner) | Some(WorkspaceRole::Admin)
    );
    if portfolio.owner_id != auth.user_id && !privileged {
        return Err(AppError::forbidden(
            "only the portfolio owner or a workspace admin can delete a portfolio",
        ));
    }

    sqlx::query("DELETE FROM portfolios WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn load_portfolio_with_access(
    pool: &SqlitePool,
    user_id: Uuid,
    portfolio_id: Uuid,
) -> AppResult<(Portfolio, Option<WorkspaceRole>)> {
    let portfolio = fetch_portfolio(pool, portfolio_id).await?;
    let workspace = fetch_workspace(pool, portfolio.workspace_id).await?;
    let workspace_role = resolve_workspace_role(&workspace, user_id);

    if workspace_role.is_none() {
        return Err(AppError::forbidden("no access to this portfolio"));
    }

    Ok((portfolio, workspace_role))
}

async fn fetch_portfolio(pool: &SqlitePool, id: Uuid) -> AppResult<Portfolio> {
    let sql = format!("{SELECT_PORTFOLIO} WHERE id = ?");
    let row = sqlx::query_as::<_, DbPortfolio>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("portfolio not found"))?;

    row.try_into()
}

fn status_str(status: PortfolioStatus) -> &'static str {
    match status {
        PortfolioStatus::OnTrack => "on-track",
        PortfolioStatus::AtRisk => "at-risk",
        PortfolioStatus::OffTrack => "off-track",
        PortfolioStatus::Completed => "completed",
        PortfolioStatus::NoStatus => "no-status",
    }
}
