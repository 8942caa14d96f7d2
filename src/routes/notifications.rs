use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::notification::{DbNotification, Notification};

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "Notifications",
    responses((status = 200, description = "Caller's notifications, newest first", body = [Notification]))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Notification>>> {
    let rows = sqlx::query_as::<_, DbNotification>(
        "SELECT id, user_id, kind, message, read, created_at FROM notifications \
         WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(auth.user_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let notifications: Vec<Notification> = rows
        .into_iter()
        .map(Notification::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(notifications))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses((status = 200, description = "Notification marked read", body = Notification))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    let affected = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(auth.user_id.to_string())
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("notification not found"));
    }

    let row = sqlx::query_as::<_, DbNotification>(
        "SELECT id, user_id, kind, message, read, created_at FROM notifications WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(row.try_into()?))
}
