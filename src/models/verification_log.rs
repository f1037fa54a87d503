// src/models/verification_log.rs

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool, types::Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    Upload,
    Verify,
    Approve,
    Reject,
    Reprocess,
}

impl LogAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LogAction::Upload => "upload",
            LogAction::Verify => "verify",
            LogAction::Approve => "approve",
            LogAction::Reject => "reject",
            LogAction::Reprocess => "reprocess",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Success,
    Failure,
    Pending,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failure => "failure",
            LogStatus::Pending => "pending",
        }
    }
}

/// A row of the caller's activity feed, joined with the document it refers to.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub document_id: i64,
    pub document_name: Option<String>,
    pub document_type: Option<String>,
    pub action: String,
    pub status: String,
    pub details: Json<serde_json::Value>,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Where a request came from, recorded alongside user-triggered actions.
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Reads the client address from proxy headers; never rejects.
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let ip_address = header_value("x-forwarded-for")
            .and_then(|chain| chain.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header_value("x-real-ip"));

        Ok(RequestOrigin {
            ip_address,
            user_agent: header_value(header::USER_AGENT.as_str()),
        })
    }
}

/// Audit record to append to `verification_logs`.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub document_id: i64,
    pub user_id: i64,
    pub action: LogAction,
    pub status: LogStatus,
    pub details: serde_json::Value,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub origin: RequestOrigin,
}

impl NewLogEntry {
    pub fn new(document_id: i64, user_id: i64, action: LogAction, status: LogStatus) -> Self {
        Self {
            document_id,
            user_id,
            action,
            status,
            details: serde_json::json!({}),
            error_message: None,
            processing_time_ms: None,
            origin: RequestOrigin::default(),
        }
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn processing_time_ms(mut self, millis: i64) -> Self {
        self.processing_time_ms = Some(millis);
        self
    }

    pub fn origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub async fn insert(self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO verification_logs
            (document_id, user_id, action, status, details, error_message,
             processing_time_ms, ip_address, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.document_id)
        .bind(self.user_id)
        .bind(self.action.as_str())
        .bind(self.status.as_str())
        .bind(Json(self.details))
        .bind(self.error_message)
        .bind(self.processing_time_ms)
        .bind(self.origin.ip_address)
        .bind(self.origin.user_agent)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }
}
