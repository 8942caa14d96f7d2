use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::task::{DbTask, Task, TaskCreateRequest, TaskUpdateRequest};
use crate::routes::projects::load_project_with_access;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/projects/{project_id}/tasks",
    tag = "Tasks",
    params(("project_id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "List tasks", body = [Task]))
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<Task>>> {
    load_project_with_access(&state.pool, auth.user_id, project_id).await?;

    let rows = sqlx::query_as::<_, DbTask>(
        "SELECT id, project_id, title, status, assignee_id, due_date, created_at, updated_at \
         FROM tasks WHERE project_id = ? ORDER BY created_at DESC",
    )
    .bind(project_id.to_string())
    .fetch_all(&state.pool)
    .await?;

    let tasks: Vec<Task> = rows.into_iter().map(Task::try_from).collect::<Result<_, _>>()?;
    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/projects/{project_id}/tasks",
    tag = "Tasks",
    params(("project_id" = Uuid, Path, description = "Project id")),
    request_body = TaskCreateRequest,
    responses((status = 201, description = "Task created", body = Task))
)]
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    load_project_with_access(&state.pool, auth.user_id, project_id).await?;

    let now = utc_now();
    let task_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO tasks (id, project_id, title, status, assignee_id, due_date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id.to_string())
    .bind(project_id.to_string())
    .bind(&payload.title)
    .bind(payload.status.as_deref().unwrap_or("pending"))
    .bind(payload.assignee_id.map(|id| id.to_string()))
    .bind(payload.due_date)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let task = fetch_task(&state.pool, project_id, task_id).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/projects/{project_id}/tasks/{id}",
    tag = "Tasks",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Task id")
    ),
    request_body = TaskUpdateRequest,
    responses((status = 200, description = "Task updated", body = Task))
)]
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    load_project_with_access(&state.pool, auth.user_id, project_id).await?;
    let mut task = fetch_task(&state.pool, project_id, id).await?;

    if let Some(title) = payload.title {
        task.title = title;
    }
    if let Some(status) = payload.status {
        task.status = status;
    }
    // An absent field keeps the stored value, an explicit null clears it.
    if let Some(assignee_id) = payload.assignee_id {
        task.assignee_id = assignee_id;
    }
    if let Some(due_date) = payload.due_date {
        task.due_date = due_date;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE tasks SET title = ?, status = ?, assignee_id = ?, due_date = ?, updated_at = ? \
         WHERE id = ? AND project_id = ?",
    )
    .bind(&task.title)
    .bind(&task.status)
    .bind(task.assignee_id.map(|a| a.to_string()))
    .bind(task.due_date)
    .bind(now)
    .bind(id.to_string())
    .bind(project_id.to_string())
    .execute(&state.pool)
    .await?;

    task.updated_at = now;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/projects/{project_id}/tasks/{id}",
    tag = "Tasks",
    params(
        ("project_id" = Uuid, Path, description = "Project id"),
        ("id" = Uuid, Path, description = "Task id")
    ),
    responses((status = 204, description = "Task deleted"))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    load_project_with_access(&state.pool, auth.user_id, project_id).await?;

    let affected = sqlx::query("DELETE FROM tasks WHERE id = ? AND project_id = ?")
        .bind(id.to_string())
        .bind(project_id.to_string())
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("task not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_task(pool: &sqlx::SqlitePool, project_id: Uuid, task_id: Uuid) -> AppResult<Task> {
    let row = sqlx::query_as::<_, DbTask>(
        "SELECT id, project_id, title, status, assignee_id, due_date, created_at, updated_at \
         FROM tasks WHERE id = ? AND project_id = ?",
    )
    .bind(task_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("task not found"))?;

    row.try_into()
}
