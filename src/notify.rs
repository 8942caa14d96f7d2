//! Best-effort notification writes.
//!
//! Notifications are a side channel: a failed insert is logged and swallowed
//! so it never turns an otherwise successful operation into an error. Access
//! control failures are NOT handled here; those always propagate.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::utils::utc_now;

pub async fn record(pool: &SqlitePool, user_id: Uuid, kind: &str, message: String) {
    let result = sqlx::query(
        "INSERT INTO notifications (id, user_id, kind, message, read, created_at) VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id.to_string())
    .bind(kind)
    .bind(&message)
    .bind(utc_now())
    .execute(pool)
    .await;

    if let Err(err) = result {
        tracing::warn!(user_id = %user_id, kind, %err, "failed to store notification");
    }
}
