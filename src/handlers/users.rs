// src/handlers/users.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        document::DocumentStatus,
        user::{USER_COLUMNS, User},
        verification_log::ActivityLogEntry,
    },
    utils::jwt::AuthUser,
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// `?page=&limit=` for paginated listings.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Returns `(page, limit, offset)` with out-of-range values pulled back into bounds.
    fn window(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, i64::MAX / MAX_LIMIT);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        (page, limit, (page - 1).saturating_mul(limit))
    }
}

fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

/// Per-status document counts shown on the profile page.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct DocumentStats {
    pub total: i64,
    pub verified: i64,
    pub pending: i64,
    pub rejected: i64,
    pub processing: i64,
}

impl DocumentStats {
    fn from_counts(counts: &[(String, i64)]) -> Self {
        let mut stats = DocumentStats::default();
        for (status, count) in counts {
            stats.total += count;
            match status.as_str() {
                s if s == DocumentStatus::Verified.as_str() => stats.verified += count,
                s if s == DocumentStatus::Processing.as_str() => stats.processing += count,
                s if s == DocumentStatus::Uploaded.as_str()
                    || s == DocumentStatus::PendingReview.as_str() =>
                {
                    stats.pending += count
                }
                s if s == DocumentStatus::Rejected.as_str()
                    || s == DocumentStatus::Failed.as_str() =>
                {
                    stats.rejected += count
                }
                _ => {}
            }
        }
        stats
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: Option<String>,
}

/// Returns the caller together with their document statistics.
pub async fn get_profile(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&pool, auth.id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let counts: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM documents WHERE user_id = ? GROUP BY status",
    )
    .bind(auth.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to count documents: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(json!({
        "user": user,
        "stats": DocumentStats::from_counts(&counts),
    })))
}

pub async fn update_profile(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.name = payload.name.map(|name| name.trim().to_string());
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(name) = payload.name {
        sqlx::query("UPDATE users SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(auth.id)
            .execute(&pool)
            .await?;
    }

    let user = User::find_by_id(&pool, auth.id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Lists the caller's verification log, newest first.
pub async fn activity_logs(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.window();

    let logs = sqlx::query_as::<_, ActivityLogEntry>(
        r#"
        SELECT
            l.id, l.document_id,
            d.original_name AS document_name,
            d.document_type AS document_type,
            l.action, l.status, l.details, l.error_message,
            l.processing_time_ms, l.created_at
        FROM verification_logs l
        LEFT JOIN documents d ON d.id = l.document_id
        WHERE l.user_id = ?
        ORDER BY l.created_at DESC, l.id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(auth.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load activity logs: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verification_logs WHERE user_id = ?")
        .bind(auth.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(json!({
        "logs": logs,
        "pagination": {
            "currentPage": page,
            "totalPages": total_pages(total, limit),
            "totalLogs": total,
        }
    })))
}

/// Lists all users, newest first.
/// Admin only.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, offset) = params.window();

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await?;

    Ok(Json(json!({
        "users": users,
        "pagination": {
            "currentPage": page,
            "totalPages": total_pages(total, limit),
            "totalUsers": total,
        }
    })))
}

/// Activates or deactivates an account.
/// Admin only.
pub async fn toggle_user_status(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == auth.id {
        return Err(AppError::BadRequest(
            "You cannot change the status of your own account".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = NOT is_active, updated_at = ? WHERE id = ? RETURNING {}",
        USER_COLUMNS
    ))
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to toggle user status: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound(format!("User with id {} not found", id)))?;

    tracing::info!(
        "User {} {} by admin {}",
        user.id,
        if user.is_active { "activated" } else { "deactivated" },
        auth.id
    );

    Ok(Json(user))
}
