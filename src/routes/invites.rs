use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Duration;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    repair_owner_membership, require, resolve_workspace_role, ProjectRole, WorkspaceAction,
    WorkspaceRole,
};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::invite::{
    AcceptInviteRequest, DbInvite, Invite, InviteCreateRequest, InviteStatus, RevokeReason,
    TokenValidation,
};
use crate::notify;
use crate::routes::auth::fetch_user_by_id;
use crate::routes::projects::save_roles;
use crate::routes::workspaces::{fetch_workspace, save_members};
use crate::utils::{generate_invite_token, utc_now};

const INVITE_TTL_HOURS: i64 = 24;

const SELECT_INVITE: &str = "SELECT id, inviter_id, invitee_id, workspace_id, selected_projects, \
     role, status, revoked_reason, invite_token, invite_time, expiration_time FROM invites";

#[derive(Debug, Deserialize)]
pub struct InviteListQuery {
    /// `sent` or `received` (default).
    pub r#type: Option<String>,
}

#[utoipa::path(
    post,
    path = "/invites",
    tag = "Invites",
    request_body = InviteCreateRequest,
    responses(
        (status = 201, description = "Invite created", body = Invite),
        (status = 409, description = "Invitee already a member or already invited")
    )
)]
pub async fn create_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<InviteCreateRequest>,
) -> AppResult<(StatusCode, Json<Invite>)> {
    let workspace = fetch_workspace(&state.pool, payload.workspace_id).await?;
    let actor_role = resolve_workspace_role(&workspace, auth.user_id);
    require(actor_role, WorkspaceAction::InviteMember, None)?;

    fetch_user_by_id(&state.pool, payload.invitee_id).await?;

    if workspace.is_member(payload.invitee_id) {
        return Err(AppError::conflict("user is already a member of this workspace"));
    }

    let role = payload.role.unwrap_or(WorkspaceRole::Member);
    if role == WorkspaceRole::Owner {
        return Err(AppError::invariant_violation(
            "an invite cannot grant the owner role",
        ));
    }

    let now = utc_now();

    // Reading the pending set counts as a read of those invites: flip any
    // overdue ones before the duplicate check so a stale invite does not
    // block a re-invite forever.
    sqlx::query(
        "UPDATE invites SET status = 'expired' WHERE workspace_id = ? AND invitee_id = ? \
         AND status = 'pending' AND expiration_time < ?",
    )
    .bind(payload.workspace_id.to_string())
    .bind(payload.invitee_id.to_string())
    .bind(now)
    .execute(&state.pool)
    .await?;

    let pending = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(1) FROM invites WHERE workspace_id = ? AND invitee_id = ? AND status = 'pending'",
    )
    .bind(payload.workspace_id.to_string())
    .bind(payload.invitee_id.to_string())
    .fetch_one(&state.pool)
    .await?;

    if pending > 0 {
        return Err(AppError::conflict("an invitation is already pending for this user"));
    }

    // Every listed project must belong to the workspace being invited into,
    // otherwise accepting the invite would enroll the invitee into a project
    // the inviter has no standing over.
    for project_id in &payload.selected_projects {
        let project = crate::routes::projects::fetch_project(&state.pool, *project_id).await?;
        if project.workspace_id != payload.workspace_id {
            return Err(AppError::bad_request(format!(
                "project {project_id} does not belong to this workspace"
            )));
        }
    }

    let invite_id = Uuid::new_v4();
    let token = generate_invite_token();
    let expiration = now + Duration::hours(INVITE_TTL_HOURS);
    let selected: Vec<String> = payload
        .selected_projects
        .iter()
        .map(Uuid::to_string)
        .collect();

    sqlx::query(
        "INSERT INTO invites (id, inviter_id, invitee_id, workspace_id, selected_projects, role, \
         status, invite_token, invite_time, expiration_time) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
    )
    .bind(invite_id.to_string())
    .bind(auth.user_id.to_string())
    .bind(payload.invitee_id.to_string())
    .bind(payload.workspace_id.to_string())
    .bind(serde_json::to_string(&selected)?)
    .bind(role.as_str())
    .bind(&token)
    .bind(now)
    .bind(expiration)
    .execute(&state.pool)
    .await?;

    notify::record(
        &state.pool,
        payload.invitee_id,
        "invite_received",
        format!("You have been invited to workspace {}", workspace.name),
    )
    .await;

    let invite = fetch_invite_by_id(&state.pool, invite_id).await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

#[utoipa::path(
    get,
    path = "/invites",
    tag = "Invites",
    responses((status = 200, description = "Invites sent or received by the caller", body = [Invite]))
)]
pub async fn list_invites(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InviteListQuery>,
) -> AppResult<Json<Vec<Invite>>> {
    let sent = matches!(query.r#type.as_deref(), Some("sent"));
    let sql = if sent {
        format!("{SELECT_INVITE} WHERE inviter_id = ? ORDER BY invite_time DESC")
    } else {
        format!("{SELECT_INVITE} WHERE invitee_id = ? ORDER BY invite_time DESC")
    };

    let rows = sqlx::query_as::<_, DbInvite>(&sql)
        .bind(auth.user_id.to_string())
        .fetch_all(&state.pool)
        .await?;

    let mut invites = Vec::with_capacity(rows.len());
    for row in rows {
        let mut invite: Invite = row.try_into()?;
        expire_if_overdue(&state.pool, &mut invite).await?;
        invites.push(invite);
    }

    Ok(Json(invites))
}

#[utoipa::path(
    get,
    path = "/invites/{id}",
    tag = "Invites",
    params(("id" = Uuid, Path, description = "Invite id")),
    responses((status = 200, description = "Invite detail", body = Invite))
)]
pub async fn get_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invite>> {
    let mut invite = fetch_invite_by_id(&state.pool, id).await?;

    if invite.inviter_id != auth.user_id && invite.invitee_id != auth.user_id {
        return Err(AppError::unauthorized("not a party to this invite"));
    }

    expire_if_overdue(&state.pool, &mut invite).await?;
    Ok(Json(invite))
}

#[utoipa::path(
    post,
    path = "/invites/accept",
    tag = "Invites",
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Invite accepted", body = Invite),
        (status = 400, description = "Invite expired or no longer pending")
    )
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AcceptInviteRequest>,
) -> AppResult<Json<Invite>> {
    let mut invite = fetch_invite_by_token(&state.pool, &payload.invite_token)
        .await?
        .ok_or_else(|| AppError::not_found("invitation not found"))?;

    if invite.invitee_id != auth.user_id {
        return Err(AppError::unauthorized("this invitation is not for you"));
    }

    if invite.status == InviteStatus::Pending && invite.is_expired(utc_now()) {
        set_status(&state.pool, invite.id, InviteStatus::Expired, None).await?;
        return Err(AppError::bad_request("this invitation has expired"));
    }

    if invite.status != InviteStatus::Pending {
        return Err(AppError::bad_request(format!(
            "this invitation is already {}",
            invite.status.as_str()
        )));
    }

    // Workspace membership grant is atomic; project enrollments afterwards
    // are best-effort per project.
    let mut tx = state.pool.begin().await?;
    let mut workspace = fetch_workspace(&mut *tx, invite.workspace_id).await?;
    let mut changed = repair_owner_membership(&mut workspace);
    changed |= workspace.upsert_member(invite.invitee_id, invite.role);
    if changed {
        save_members(&mut *tx, &mut workspace).await?;
    }
    tx.commit().await?;

    for project_id in &invite.selected_projects {
        if let Err(err) =
            enroll_in_project(&state.pool, *project_id, invite.workspace_id, invite.invitee_id)
                .await
        {
            tracing::warn!(
                project_id = %project_id,
                invitee = %invite.invitee_id,
                %err,
                "failed to enroll invitee in selected project, continuing"
            );
        }
    }

    set_status(&state.pool, invite.id, InviteStatus::Accepted, None).await?;
    invite.status = InviteStatus::Accepted;

    notify::record(
        &state.pool,
        invite.inviter_id,
        "invite_accepted",
        format!("Your invitation to workspace {} was accepted", workspace.name),
    )
    .await;

    Ok(Json(invite))
}

#[utoipa::path(
    post,
    path = "/invites/{id}/cancel",
    tag = "Invites",
    params(("id" = Uuid, Path, description = "Invite id")),
    responses((status = 200, description = "Invite revoked by the inviter", body = Invite))
)]
pub async fn cancel_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invite>> {
    let mut invite = fetch_invite_by_id(&state.pool, id).await?;

    if invite.inviter_id != auth.user_id {
        return Err(AppError::unauthorized("only the inviter can cancel an invitation"));
    }

    terminate_pending(&state.pool, &mut invite, RevokeReason::Cancelled).await?;

    notify::record(
        &state.pool,
        invite.invitee_id,
        "invite_cancelled",
        "An invitation addressed to you was cancelled".to_string(),
    )
    .await;

    Ok(Json(invite))
}

#[utoipa::path(
    post,
    path = "/invites/{id}/reject",
    tag = "Invites",
    params(("id" = Uuid, Path, description = "Invite id")),
    responses((status = 200, description = "Invite revoked by the invitee", body = Invite))
)]
pub async fn reject_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invite>> {
    let mut invite = fetch_invite_by_id(&state.pool, id).await?;

    if invite.invitee_id != auth.user_id {
        return Err(AppError::unauthorized("only the invitee can reject an invitation"));
    }

    terminate_pending(&state.pool, &mut invite, RevokeReason::Rejected).await?;

    notify::record(
        &state.pool,
        invite.inviter_id,
        "invite_rejected",
        "Your invitation was rejected".to_string(),
    )
    .await;

    Ok(Json(invite))
}

#[utoipa::path(
    get,
    path = "/invites/validate/{token}",
    tag = "Invites",
    params(("token" = String, Path, description = "Invite token")),
    responses((status = 200, description = "Token validity", body = TokenValidation))
)]
pub async fn validate_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<TokenValidation>> {
    let invalid = TokenValidation {
        is_valid: false,
        workspace_id: None,
        inviter_id: None,
    };

    let Some(mut invite) = fetch_invite_by_token(&state.pool, &token).await? else {
        return Ok(Json(invalid));
    };

    expire_if_overdue(&state.pool, &mut invite).await?;

    if invite.status != InviteStatus::Pending {
        return Ok(Json(invalid));
    }

    Ok(Json(TokenValidation {
        is_valid: true,
        workspace_id: Some(invite.workspace_id),
        inviter_id: Some(invite.inviter_id),
    }))
}

/// Lazy expiry: a pending invite past its deadline flips to `expired` as a
/// side effect of being read. Expiry is never actively swept.
async fn expire_if_overdue(pool: &SqlitePool, invite: &mut Invite) -> AppResult<()> {
    if invite.status == InviteStatus::Pending && invite.is_expired(utc_now()) {
        set_status(pool, invite.id, InviteStatus::Expired, None).await?;
        invite.status = InviteStatus::Expired;
    }
    Ok(())
}

async fn terminate_pending(
    pool: &SqlitePool,
    invite: &mut Invite,
    reason: RevokeReason,
) -> AppResult<()> {
    expire_if_overdue(pool, invite).await?;

    if invite.status != InviteStatus::Pending {
        return Err(AppError::bad_request(format!(
            "cannot revoke an invitation that is already {}",
            invite.status.as_str()
        )));
    }

    set_status(pool, invite.id, InviteStatus::Revoked, Some(reason)).await?;
    invite.status = InviteStatus::Revoked;
    invite.revoked_reason = Some(reason);
    Ok(())
}

async fn set_status(
    pool: &SqlitePool,
    invite_id: Uuid,
    status: InviteStatus,
    reason: Option<RevokeReason>,
) -> AppResult<()> {
    sqlx::query("UPDATE invites SET status = ?, revoked_reason = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(reason.map(|r| r.as_str()))
        .bind(invite_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

async fn enroll_in_project(
    pool: &SqlitePool,
    project_id: Uuid,
    workspace_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, crate::models::project::DbProject>(
        "SELECT id, workspace_id, name, description, color, status, visibility, roles, created_at, updated_at \
         FROM projects WHERE id = ?",
    )
    .bind(project_id.to_string())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("project not found"))?;

    let mut project: crate::models::project::Project = row.try_into()?;
    if project.workspace_id != workspace_id {
        return Err(AppError::bad_request(
            "project does not belong to the invited workspace",
        ));
    }
    if project.enroll(user_id, ProjectRole::Member) {
        save_roles(&mut *tx, &mut project).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn fetch_invite_by_id(pool: &SqlitePool, id: Uuid) -> AppResult<Invite> {
    let sql = format!("{SELECT_INVITE} WHERE id = ?");
    let row = sqlx::query_as::<_, DbInvite>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("invite not found"))?;

    row.try_into()
}

async fn fetch_invite_by_token(pool: &SqlitePool, token: &str) -> AppResult<Option<Invite>> {
    let sql = format!("{SELECT_INVITE} WHERE invite_token = ?");
    let row = sqlx::query_as::<_, DbInvite>(&sql)
        .bind(token)
        .fetch_optional(pool)
        .await?;

    row.map(Invite::try_from).transpose()
}
