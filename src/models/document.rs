// src/models/document.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use validator::Validate;

use crate::{
    services::ai_ml::{AnalysisReport, FormatReport},
    utils::jwt::AuthUser,
};

/// Lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Verified,
    PendingReview,
    Rejected,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Verified => "verified",
            DocumentStatus::PendingReview => "pending_review",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authenticity {
    Authentic,
    Suspicious,
    Fake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMethod {
    AiMl,
    Manual,
    Hybrid,
}

/// Represents the 'documents' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: i64,
    pub user_id: i64,
    pub original_name: String,
    pub file_name: String,

    /// Location on disk. Omitted from list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    pub file_size: i64,
    pub mime_type: String,
    pub document_type: String,

    /// One of the `DocumentStatus` values.
    pub status: String,
    pub verification_result: Option<Json<VerificationResult>>,
    pub error: Option<String>,
    pub notes: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Document>, sqlx::Error> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Documents are visible to their owner and to admins.
    pub fn is_visible_to(&self, user: &AuthUser) -> bool {
        self.user_id == user.id || user.is_admin()
    }
}

/// Column list matching `Document`, including the file path.
pub const DOCUMENT_COLUMNS: &str = "id, user_id, original_name, file_name, file_path, file_size, \
    mime_type, document_type, status, verification_result, error, notes, processed_at, \
    verified_at, verified_by, created_at, updated_at";

/// Same as `DOCUMENT_COLUMNS` but with the path nulled out for listings.
pub const DOCUMENT_LIST_COLUMNS: &str = "id, user_id, original_name, file_name, \
    NULL AS file_path, file_size, mime_type, document_type, status, verification_result, error, \
    notes, processed_at, verified_at, verified_by, created_at, updated_at";

/// Outcome of automatic and/or manual review, stored as JSON on the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Authenticity score as an integer percentage.
    pub confidence: u8,
    pub authenticity: Authenticity,
    pub verification_method: VerificationMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_details: Option<AnalysisDetails>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub ai_analysis: AnalysisReport,
    pub format_validation: FormatReport,
    pub ocr_result: OcrSummary,
    pub signature_detection: SignatureSummary,
    pub quality_score: f64,
    pub anomalies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSummary {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub detected: bool,
    pub confidence: f64,
}

/// Query parameters for listing the caller's documents.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListParams {
    pub status: Option<String>,
    pub document_type: Option<String>,
}

/// DTO for an admin's manual decision.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDocumentRequest {
    pub is_valid: bool,

    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

/// Columns needed to insert a freshly stored upload.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: i64,
    pub original_name: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub document_type: String,
}

impl NewDocument {
    pub async fn insert(self, pool: &SqlitePool) -> Result<Document, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Document>(&format!(
            r#"
            INSERT INTO documents
            (user_id, original_name, file_name, file_path, file_size, mime_type,
             document_type, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(self.user_id)
        .bind(self.original_name)
        .bind(self.file_name)
        .bind(self.file_path)
        .bind(self.file_size)
        .bind(self.mime_type)
        .bind(self.document_type)
        .bind(DocumentStatus::Uploaded.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }
}
