use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    repair_owner_membership, require, resolve_workspace_role, WorkspaceAction, WorkspaceRole,
};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::workspace::{
    encode_members, AddMemberRequest, DbWorkspace, UpdateMemberRoleRequest, Workspace,
    WorkspaceCreateRequest, WorkspaceUpdateRequest,
};
use crate::routes::auth::fetch_user_by_id;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/workspaces",
    tag = "Workspaces",
    responses((status = 200, description = "Workspaces the caller belongs to", body = [Workspace]))
)]
pub async fn list_workspaces(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Workspace>>> {
    // Membership is stored as JSON; json_each handles both the object form
    // and legacy bare-id entries.
    let rows = sqlx::query_as::<_, DbWorkspace>(
        "SELECT id, name, owner_id, members, created_at, updated_at FROM workspaces \
         WHERE owner_id = ?1 OR EXISTS ( \
             SELECT 1 FROM json_each(workspaces.members) AS je \
             WHERE je.value = ?1 OR json_extract(je.value, '$.userId') = ?1 \
         ) ORDER BY created_at DESC",
    )
    .bind(auth.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let workspaces: Vec<Workspace> = rows
        .into_iter()
        .map(Workspace::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(workspaces))
}

#[utoipa::path(
    post,
    path = "/workspaces",
    tag = "Workspaces",
    request_body = WorkspaceCreateRequest,
    responses((status = 201, description = "Workspace created", body = Workspace))
)]
pub async fn create_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<WorkspaceCreateRequest>,
) -> AppResult<(StatusCode, Json<Workspace>)> {
    let now = utc_now();
    let workspace_id = Uuid::new_v4();
    let members = encode_members(&[crate::models::workspace::Member {
        user_id: auth.user_id,
        role: WorkspaceRole::Owner,
    }])?;

    sqlx::query(
        "INSERT INTO workspaces (id, name, owner_id, members, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(workspace_id.to_string())
    .bind(&payload.name)
    .bind(auth.user_id.to_string())
    .bind(members)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let workspace = fetch_workspace(&state.pool, workspace_id).await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

#[utoipa::path(
    get,
    path = "/workspaces/{id}",
    tag = "Workspaces",
    params(("id" = Uuid, Path, description = "Workspace id")),
    responses((status = 200, description = "Workspace detail", body = Workspace))
)]
pub async fn get_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Workspace>> {
    let workspace = fetch_workspace(&state.pool, id).await?;

    if resolve_workspace_role(&workspace, auth.user_id).is_none() {
        return Err(AppError::forbidden("no access to this workspace"));
    }

    Ok(Json(workspace))
}

#[utoipa::path(
    put,
    path = "/workspaces/{id}",
    tag = "Workspaces",
    params(("id" = Uuid, Path, description = "Workspace id")),
    request_body = WorkspaceUpdateRequest,
    responses((status = 200, description = "Workspace updated", body = Workspace))
)]
pub async fn update_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<WorkspaceUpdateRequest>,
) -> AppResult<Json<Workspace>> {
    let mut workspace = fetch_workspace(&state.pool, id).await?;

    let role = resolve_workspace_role(&workspace, auth.user_id);
    require(role, WorkspaceAction::UpdateWorkspace, None)?;

    if let Some(name) = payload.name {
        workspace.name = name;
    }

    let now = utc_now();
    sqlx::query("UPDATE workspaces SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&workspace.name)
        .bind(now)
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    workspace.updated_at = now;
    Ok(Json(workspace))
}

#[utoipa::path(
    delete,
    path = "/workspaces/{id}",
    tag = "Workspaces",
    params(("id" = Uuid, Path, description = "Workspace id")),
    responses((status = 204, description = "Workspace deleted with its projects and tasks"))
)]
pub async fn delete_workspace(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let workspace = fetch_workspace(&state.pool, id).await?;

    let role = resolve_workspace_role(&workspace, auth.user_id);
    require(role, WorkspaceAction::DeleteWorkspace, None)?;

    let mut tx = state.pool.begin().await?;

    sqlx::query("DELETE FROM tasks WHERE project_id IN (SELECT id FROM projects WHERE workspace_id = ?)")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM projects WHERE workspace_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM invites WHERE workspace_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM goals WHERE workspace_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM portfolios WHERE workspace_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM workspaces WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/workspaces/{id}/members",
    tag = "Workspaces",
    params(("id" = Uuid, Path, description = "Workspace id")),
    request_body = AddMemberRequest,
    responses((status = 200, description = "Member added (idempotent)", body = Workspace))
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMemberRequest>,
) -> AppResult<Json<Workspace>> {
    // Existence check outside the transaction; membership mutation inside it
    // so the check-then-push is atomic against concurrent writers.
    fetch_user_by_id(&state.pool, payload.user_id).await?;

    let mut tx = state.pool.begin().await?;
    let mut workspace = fetch_workspace(&mut *tx, id).await?;

    let role = resolve_workspace_role(&workspace, auth.user_id);
    require(role, WorkspaceAction::AddMemberDirect, Some(payload.role))?;

    if workspace.owner_id == payload.user_id {
        return Err(AppError::invariant_violation(
            "the workspace owner is always a member; their entry cannot be re-added",
        ));
    }

    let mut changed = repair_owner_membership(&mut workspace);
    if workspace.member_role(payload.user_id).is_none() {
        changed |= workspace.upsert_member(payload.user_id, payload.role);
    }

    if changed {
        save_members(&mut *tx, &mut workspace).await?;
    }
    tx.commit().await?;

    Ok(Json(workspace))
}

#[utoipa::path(
    put,
    path = "/workspaces/{id}/members/{user_id}",
    tag = "Workspaces",
    params(
        ("id" = Uuid, Path, description = "Workspace id"),
        ("user_id" = Uuid, Path, description = "Member to update")
    ),
    request_body = UpdateMemberRoleRequest,
    responses((status = 200, description = "Member role updated", body = Workspace))
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateMemberRoleRequest>,
) -> AppResult<Json<Workspace>> {
    let mut tx = state.pool.begin().await?;
    let mut workspace = fetch_workspace(&mut *tx, id).await?;

    let role = resolve_workspace_role(&workspace, auth.user_id);
    require(role, WorkspaceAction::PromoteToAdmin, Some(payload.role))?;

    if workspace.owner_id == member_id {
        return Err(AppError::invariant_violation(
            "the workspace owner's role cannot be changed",
        ));
    }

    if workspace.member_role(member_id).is_none() {
        return Err(AppError::not_found("member not found in workspace"));
    }

    let mut changed = repair_owner_membership(&mut workspace);
    changed |= workspace.upsert_member(member_id, payload.role);

    if changed {
        save_members(&mut *tx, &mut workspace).await?;
    }
    tx.commit().await?;

    Ok(Json(workspace))
}

#[utoipa::path(
    delete,
    path = "/workspaces/{id}/members/{user_id}",
    tag = "Workspaces",
    params(
        ("id" = Uuid, Path, description = "Workspace id"),
        ("user_id" = Uuid, Path, description = "Member to remove")
    ),
    responses((status = 200, description = "Member removed (idempotent)", body = Workspace))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Workspace>> {
    let mut tx = state.pool.begin().await?;
    let mut workspace = fetch_workspace(&mut *tx, id).await?;

    let actor_role = resolve_workspace_role(&workspace, auth.user_id);
    // The effective role of the target decides whether an admin may remove
    // them; a target resolving to owner is rejected by the evaluator.
    let target_role = resolve_workspace_role(&workspace, member_id).unwrap_or(WorkspaceRole::Member);
    require(actor_role, WorkspaceAction::RemoveMember, Some(target_role))?;

    let mut changed = repair_owner_membership(&mut workspace);
    changed |= workspace.remove_member(member_id).is_some();

    if changed {
        save_members(&mut *tx, &mut workspace).await?;
    }
    tx.commit().await?;

    Ok(Json(workspace))
}

pub(crate) async fn fetch_workspace<'e, E>(executor: E, id: Uuid) -> AppResult<Workspace>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row = sqlx::query_as::<_, DbWorkspace>(
        "SELECT id, name, owner_id, members, created_at, updated_at FROM workspaces WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::not_found("workspace not found"))?;

    row.try_into()
}

/// Persist the membership collection in canonical form and bump `updated_at`.
pub(crate) async fn save_members<'e, E>(executor: E, workspace: &mut Workspace) -> AppResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = utc_now();
    sqlx::query("UPDATE workspaces SET members = ?, updated_at = ? WHERE id = ?")
        .bind(encode_members(&workspace.members)?)
        .bind(now)
        .bind(workspace.id.to_string())
        .execute(executor)
        .await?;

    workspace.updated_at = now;
    Ok(())
}
