use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    authorize_project_access, require, resolve_workspace_role, ProjectRole, WorkspaceAction,
};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::project::{
    encode_roles, AddProjectMemberRequest, DbProject, Project, ProjectCreateRequest,
    ProjectStatus, ProjectUpdateRequest, ProjectVisibility,
};
use crate::routes::workspaces::fetch_workspace;
use crate::utils::utc_now;

const DEFAULT_COLOR: &str = "#3498db";

#[utoipa::path(
    get,
    path = "/workspaces/{workspace_id}/projects",
    tag = "Projects",
    params(("workspace_id" = Uuid, Path, description = "Workspace id")),
    responses((status = 200, description = "Projects visible to the caller", body = [Project]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
) -> AppResult<Json<Vec<Project>>> {
    let workspace = fetch_workspace(&state.pool, workspace_id).await?;
    let workspace_role = resolve_workspace_role(&workspace, auth.user_id);
    if workspace_role.is_none() {
        return Err(AppError::forbidden("no access to this workspace"));
    }

    let rows = sqlx::query_as::<_, DbProject>(
        "SELECT id, workspace_id, name, description, color, status, visibility, roles, created_at, updated_at \
         FROM projects WHERE workspace_id = ? ORDER BY created_at DESC",
    )
    .bind(workspace_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    // Visibility-filtered without applying lazy enrollment; enrollment only
    // happens when a single project is actually opened.
    let mut projects = Vec::new();
    for row in rows {
        let project: Project = row.try_into()?;
        let direct = project.role_of(auth.user_id);
        if authorize_project_access(project.visibility, workspace_role, direct).allowed {
            projects.push(project);
        }
    }

    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/workspaces/{workspace_id}/projects",
    tag = "Projects",
    params(("workspace_id" = Uuid, Path, description = "Workspace id")),
    request_body = ProjectCreateRequest,
    responses((status = 201, description = "Project created", body = Project))
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let workspace = fetch_workspace(&state.pool, workspace_id).await?;
    let workspace_role = resolve_workspace_role(&workspace, auth.user_id);
    require(workspace_role, WorkspaceAction::CreateProject, None)?;

    let now = utc_now();
    let project_id = Uuid::new_v4();
    let color = payload.color.unwrap_or_else(|| DEFAULT_COLOR.to_string());
    let status = payload.status.unwrap_or(ProjectStatus::OnTrack);
    let visibility = payload.visibility.unwrap_or(ProjectVisibility::Public);
    // The creator is enrolled as project Owner at creation time.
    let roles = encode_roles(&[crate::models::project::ProjectMember {
        user_id: auth.user_id,
        role: ProjectRole::Owner,
    }])?;

    sqlx::query(
        "INSERT INTO projects (id, workspace_id, name, description, color, status, visibility, roles, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id.to_string())
    .bind(workspace_id.to_string())
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&color)
    .bind(status_str(status))
    .bind(visibility_str(visibility))
    .bind(roles)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let project = fetch_project(&state.pool, project_id).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Project detail", body = Project))
)]
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    let (project, _) = load_project_with_access(&state.pool, auth.user_id, id).await?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses((status = 200, description = "Project updated", body = Project))
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<Project>> {
    let (mut project, effective) = load_project_with_access(&state.pool, auth.user_id, id).await?;
    ensure_project_admin(effective)?;

    if let Some(name) = payload.name {
        project.name = name;
    }
    if payload.description.is_some() {
        project.description = payload.description;
    }
    if let Some(color) = payload.color {
        project.color = color;
    }
    if let Some(status) = payload.status {
        project.status = status;
    }
    if let Some(visibility) = payload.visibility {
        project.visibility = visibility;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE projects SET name = ?, description = ?, color = ?, status = ?, visibility = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(&project.color)
    .bind(status_str(project.status))
    .bind(visibility_str(project.visibility))
    .bind(now)
    .bind(id.to_string())
    .execute(&state.pool)
    .await?;

    project.updated_at = now;
    Ok(Json(project))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/members",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = AddProjectMemberRequest,
    responses((status = 200, description = "Member enrolled (idempotent)", body = Project))
)]
pub async fn add_project_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddProjectMemberRequest>,
) -> AppResult<Json<Project>> {
    let (project, effective) = load_project_with_access(&state.pool, auth.user_id, id).await?;
    ensure_project_admin(effective)?;

    let workspace = fetch_workspace(&state.pool, project.workspace_id).await?;
    if resolve_workspace_role(&workspace, payload.user_id).is_none() {
        return Err(AppError::bad_request(
            "user must join the workspace before being added to a project",
        ));
    }

    let role = payload.role.unwrap_or(ProjectRole::Member);

    let mut tx = state.pool.begin().await?;
    let mut project = fetch_project_tx(&mut tx, id).await?;
    if project.enroll(payload.user_id, role) {
        save_roles(&mut *tx, &mut project).await?;
    }
    tx.commit().await?;

    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 204, description = "Project deleted with its tasks"))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (_, effective) = load_project_with_access(&state.pool, auth.user_id, id).await?;
    if effective != Some(ProjectRole::Owner) {
        return Err(AppError::forbidden("only a project owner may delete it"));
    }

    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM tasks WHERE project_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

fn ensure_project_admin(effective: Option<ProjectRole>) -> AppResult<()> {
    match effective {
        Some(ProjectRole::Owner) | Some(ProjectRole::Admin) => Ok(()),
        _ => Err(AppError::forbidden("project admin rights required")),
    }
}

/// Fetch a project, run the visibility gate and persist lazy enrollment when
/// granted. Returns the project and the caller's effective project role.
pub(crate) async fn load_project_with_access(
    pool: &SqlitePool,
    user_id: Uuid,
    project_id: Uuid,
) -> AppResult<(Project, Option<ProjectRole>)> {
    let project = fetch_project(pool, project_id).await?;
    let workspace = fetch_workspace(pool, project.workspace_id).await?;
    let workspace_role = resolve_workspace_role(&workspace, user_id);

    let direct = project.role_of(user_id);
    let decision = authorize_project_access(project.visibility, workspace_role, direct);
    if !decision.allowed {
        return Err(AppError::forbidden("no access to this project"));
    }

    if let Some(granted) = decision.granted_role {
        // Lazy enrollment: re-read inside a transaction so the check-then-push
        // cannot race another writer of the roles column.
        let mut tx = pool.begin().await?;
        let mut fresh = fetch_project_tx(&mut tx, project_id).await?;
        if fresh.enroll(user_id, granted) {
            save_roles(&mut *tx, &mut fresh).await?;
        }
        tx.commit().await?;
        let effective = fresh.role_of(user_id);
        return Ok((fresh, effective));
    }

    Ok((project, direct))
}

pub(crate) async fn fetch_project(pool: &SqlitePool, id: Uuid) -> AppResult<Project> {
    let row = sqlx::query_as::<_, DbProject>(
        "SELECT id, workspace_id, name, description, color, status, visibility, roles, created_at, updated_at \
         FROM projects WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("project not found"))?;

    row.try_into()
}

async fn fetch_project_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: Uuid,
) -> AppResult<Project> {
    let row = sqlx::query_as::<_, DbProject>(
        "SELECT id, workspace_id, name, description, color, status, visibility, roles, created_at, updated_at \
         FROM projects WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::not_found("project not found"))?;

    row.try_into()
}

pub(crate) async fn save_roles<'e, E>(executor: E, project: &mut Project) -> AppResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = utc_now();
    sqlx::query("UPDATE projects SET roles = ?, updated_at = ? WHERE id = ?")
        .bind(encode_roles(&project.roles)?)
        .bind(now)
        .bind(project.id.to_string())
        .execute(executor)
        .await?;

    project.updated_at = now;
    Ok(())
}

fn status_str(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::OnTrack => "on-track",
        ProjectStatus::AtRisk => "at-risk",
        ProjectStatus::OffTrack => "off-track",
        ProjectStatus::Completed => "completed",
    }
}

fn visibility_str(visibility: ProjectVisibility) -> &'static str {
    match visibility {
        ProjectVisibility::Public => "public",
        ProjectVisibility::InviteOnly => "invite-only",
    }
}
