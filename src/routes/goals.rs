use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{authorize_goal_access, resolve_workspace_role, WorkspaceRole};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::goal::{
    encode_goal_members, DbGoal, Goal, GoalCreateRequest, GoalStatus, GoalUpdateRequest, Timeframe,
};
use crate::routes::workspaces::fetch_workspace;
use crate::utils::utc_now;

const SELECT_GOAL: &str = "SELECT id, workspace_id, owner_id, title, description, status, \
     progress, is_private, members, timeframe, timeframe_year, start_date, due_date, \
     created_at, updated_at FROM goals";

#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}/goals",
    tag = "Goals",
    params(("workspace_id" = Uuid, Path, description = "Workspace id")),
    responses((status = 200, description = "Goals visible to the caller", body = [Goal]))
)]
pub async fn list_goals(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<Goal>>> {
    let workspace = fetch_workspace(&state.pool, workspace_id).await?;
    let workspace_role = resolve_workspace_role(&workspace, auth.user_id);
    if workspace_role.is_none() {
        return Err(AppError::forbidden("no access to this workspace"));
    }

    let sql = format!("{SELECT_GOAL} WHERE workspace_id = ? ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, DbGoal>(&sql)
        .bind(workspace_id.to_string())
        .fetch_all(&state.pool)
        .await?;

    let mut goals = Vec::new();
    for row in rows {
        let goal: Goal = row.try_into()?;
        if authorize_goal_access(&goal, workspace_role, auth.user_id) {
            goals.push(goal);
        }
    }

    Ok(Json(goals))
}

#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/goals",
    tag = "Goals",
    params(("workspace_id" = Uuid, Path, description = "Workspace id")),
    request_body = GoalCreateRequest,
    responses((status = 201, description = "Goal created", body = Goal))
)]
pub async fn create_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<GoalCreateRequest>,
) -> AppResult<(StatusCode, Json<Goal>)> {
    let workspace = fetch_workspace(&state.pool, workspace_id).await?;
    if resolve_workspace_role(&workspace, auth.user_id).is_none() {
        return Err(AppError::forbidden("no access to this workspace"));
    }

    let now = utc_now();
    let goal_id = Uuid::new_v4();
    let status = payload.status.unwrap_or_default();
    let timeframe = payload.timeframe.unwrap_or_default();

    // The creator always appears in the members list, so flipping a goal to
    // private later never locks its owner out.
    let mut members = payload.members;
    if !members.contains(&auth.user_id) {
        members.insert(0, auth.user_id);
    }

    sqlx::query(
        "INSERT INTO goals (id, workspace_id, owner_id, title, description, status, progress, \
         is_private, members, timeframe, timeframe_year, start_date, due_date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(goal_id.to_string())
    .bind(workspace_id.to_string())
    .bind(auth.user_id.to_string())
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(status_str(status))
    .bind(payload.progress.unwrap_or(0))
    .bind(payload.is_private)
    .bind(encode_goal_members(&members)?)
    .bind(timeframe_str(timeframe))
    .bind(payload.timeframe_year)
    .bind(payload.start_date)
    .bind(payload.due_date)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let goal = fetch_goal(&state.pool, goal_id).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

#[utoipa::path(
    get,
    path = "/goals/{id}",
    tag = "Goals",
    params(("id" = Uuid, Path, description = "Goal id")),
    responses((status = 200, description = "Goal detail", body = Goal))
)]
pub async fn get_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Goal>> {
    let (goal, _) = load_goal_with_access(&state.pool, auth.user_id, id).await?;
    Ok(Json(goal))
}

#[utoipa::path(
    put,
    path = "/goals/{id}",
    tag = "Goals",
    params(("id" = Uuid, Path, description = "Goal id")),
    request_body = GoalUpdateRequest,
    responses((status = 200, description = "Goal updated", body = Goal))
)]
pub async fn update_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<GoalUpdateRequest>,
) -> AppResult<Json<Goal>> {
    let (mut goal, _) = load_goal_with_access(&state.pool, auth.user_id, id).await?;

    if let Some(title) = payload.title {
        goal.title = title;
    }
    if let Some(description) = payload.description {
        goal.description = Some(description);
    }
    if let Some(status) = payload.status {
        goal.status = status;
    }
    if let Some(progress) = payload.progress {
        goal.progress = progress;
    }
    if let Some(is_private) = payload.is_private {
        goal.is_private = is_private;
    }
    if let Some(members) = payload.members {
        goal.members = members;
        // Same invariant as creation: the owner stays listed.
        if !goal.members.contains(&goal.owner_id) {
            goal.members.insert(0, goal.owner_id);
        }
    }
    if let Some(timeframe) = payload.timeframe {
        goal.timeframe = timeframe;
    }
    if payload.timeframe_year.is_some() {
        goal.timeframe_year = payload.timeframe_year;
    }
    if payload.start_date.is_some() {
        goal.start_date = payload.start_date;
    }
    if payload.due_date.is_some() {
        goal.due_date = payload.due_date;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE goals SET title = ?, description = ?, status = ?, progress = ?, is_private = ?, \
         members = ?, timeframe = ?, timeframe_year = ?, start_date = ?, due_date = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&goal.title)
    .bind(&goal.description)
    .bind(status_str(goal.status))
    .bind(goal.progress)
    .bind(goal.is_private)
    .bind(encode_goal_members(&goal.members)?)
    .bind(timeframe_str(goal.timeframe))
    .bind(goal.timeframe_year)
    .bind(goal.start_date)
    .bind(goal.due_date)
    .bind(now)
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    goal.updated_at = now;
    Ok(Json(goal))
}

#[utoipa::path(
    delete,
    path = "/goals/{id}",
    tag = "Goals",
    params(("id" = Uuid, Path, description = "Goal id")),
    responses((status = 204, description = "Goal deleted"))
)]
pub async fn delete_goal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (goal, workspace_role) = load_goal_with_access(&state.pool, auth.user_id, id).await?;

    // Deletion is reserved for the goal owner and workspace owner/admin.
    let privileged = matches!(
        workspace_role,
        Some(WorkspaceRole::Owner) | Some(WorkspaceRole::Admin)
    );
    if goal.owner_id != auth.user_id && !privileged {
        return Err(AppError::forbidden("only the goal owner or a workspace admin can delete a goal"));
    }

    sqlx::query("DELETE FROM goals WHERE id = ?")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a goal and run the visibility gate. Returns the goal and the
/// caller's workspace role.
async fn load_goal_with_access(
    pool: &SqlitePool,
    user_id: Uuid,
    goal_id: Uuid,
) -> AppResult<(Goal, Option<WorkspaceRole>)> {
    let goal = fetch_goal(pool, goal_id).await?;
    let workspace = fetch_workspace(pool, goal.workspace_id).await?;
    let workspace_role = resolve_workspace_role(&workspace, user_id);

    if !authorize_goal_access(&goal, workspace_role, user_id) {
        return Err(AppError::forbidden("no access to this goal"));
    }

    Ok((goal, workspace_role))
}

async fn fetch_goal(pool: &SqlitePool, id: Uuid) -> AppResult<Goal> {
    let sql = format!("{SELECT_GOAL} WHERE id = ?");
    let row = sqlx::query_as::<_, DbGoal>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("goal not found"))?;

    row.try_into()
}

fn status_str(status: GoalStatus) -> &'static str {
    match status {
        GoalStatus::OnTrack => "on-track",
        GoalStatus::AtRisk => "at-risk",
        GoalStatus::OffTrack => "off-track",
        GoalStatus::Achieved => "achieved",
        GoalStatus::NoStatus => "no-status",
    }
}

fn timeframe_str(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::Q1 => "Q1",
        Timeframe::Q2 => "Q2",
        Timeframe::Q3 => "Q3",
        Timeframe::Q4 => "Q4",
        Timeframe::H1 => "H1",
        Timeframe::H2 => "H2",
        Timeframe::FY => "FY",
        Timeframe::Custom => "custom",
    }
}
