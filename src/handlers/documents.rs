// src/handlers/documents.rs

use std::path::PathBuf;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        document::{
            Authenticity, DOCUMENT_COLUMNS, DOCUMENT_LIST_COLUMNS, Document, DocumentListParams, DocumentStatus,
            NewDocument, VerificationMethod, VerificationResult, VerifyDocumentRequest,
        },
        document_types,
        verification_log::{LogAction, LogStatus, NewLogEntry, RequestOrigin},
    },
    services::{
        processor::{self, ProcessingJob},
        storage,
    },
    state::AppState,
    utils::{
        jwt::AuthUser,
        sanitize::{clean_text, sanitize_filename},
    },
};

/// Multipart field carrying the file.
const FILE_FIELD: &str = "document";
const TYPE_FIELD: &str = "documentType";

struct IncomingFile {
    original_name: String,
    mime_type: String,
    bytes: Bytes,
}

/// Accepts a single document upload and queues it for AI verification.
///
/// Expects multipart fields `document` (the file) and `documentType`.
/// Responds 201 with the stored record; processing continues in the background.
pub async fn upload_document(
    State(state): State<AppState>,
    auth: AuthUser,
    origin: RequestOrigin,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut incoming: Option<IncomingFile> = None;
    let mut document_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                if incoming.is_some() {
                    return Err(AppError::BadRequest(
                        "Too many files. Only one file is allowed.".to_string(),
                    ));
                }
                let original_name = field
                    .file_name()
                    .map(sanitize_filename)
                    .unwrap_or_else(|| "document".to_string());
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                incoming = Some(IncomingFile {
                    original_name,
                    mime_type,
                    bytes,
                });
            }
            Some(TYPE_FIELD) => {
                document_type = Some(field.text().await?.trim().to_string());
            }
            _ if field.file_name().is_some() => {
                return Err(AppError::BadRequest(
                    "Unexpected file field. Use \"document\" as the field name.".to_string(),
                ));
            }
            // Other text fields are ignored.
            _ => {}
        }
    }

    let file = incoming.ok_or(AppError::BadRequest("No file uploaded".to_string()))?;

    if file.bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    let max = state.config.max_upload_bytes;
    if file.bytes.len() > max {
        return Err(AppError::BadRequest(format!(
            "File too large. Maximum size is {}MB.",
            max.div_ceil(1024 * 1024)
        )));
    }

    if !storage::is_allowed_upload(&file.original_name, &file.mime_type) {
        return Err(AppError::BadRequest(format!(
            "Invalid file type \"{}\". Allowed types: Images (JPEG, PNG, GIF, WebP, TIFF, BMP) and PDF files.",
            file.mime_type
        )));
    }

    let document_type = document_type.unwrap_or_default();
    if !document_types::is_supported(&document_type) {
        return Err(AppError::BadRequest(format!(
            "Invalid document type \"{}\".",
            document_type
        )));
    }

    let file_name = storage::stored_file_name(&file.original_name);
    let path = storage::save_upload(&state.config.upload_dir, &file_name, &file.bytes).await?;

    let new_document = NewDocument {
        user_id: auth.id,
        original_name: file.original_name,
        file_name,
        file_path: path.to_string_lossy().into_owned(),
        file_size: file.bytes.len() as i64,
        mime_type: file.mime_type,
        document_type,
    };

    let document = match new_document.insert(&state.pool).await {
        Ok(document) => document,
        Err(e) => {
            tracing::error!("Failed to save document record: {:?}", e);
            storage::remove_upload(&path).await?;
            return Err(e.into());
        }
    };

    tracing::info!(
        "Document {} uploaded by user {} ({} bytes, {})",
        document.id,
        auth.id,
        document.file_size,
        document.document_type
    );

    NewLogEntry::new(document.id, auth.id, LogAction::Upload, LogStatus::Success)
        .details(json!({
            "originalName": document.original_name,
            "documentType": document.document_type,
            "fileSize": document.file_size,
        }))
        .origin(origin)
        .insert(&state.pool)
        .await?;

    processor::spawn(
        state.pool.clone(),
        state.analyzer.clone(),
        ProcessingJob {
            document_id: document.id,
            user_id: auth.id,
            file_path: path,
            document_type: document.document_type.clone(),
            original_name: document.original_name.clone(),
            action: LogAction::Verify,
        },
    );

    Ok((StatusCode::CREATED, Json(document)))
}

/// Lists the caller's documents, newest first, without storage paths.
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<DocumentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM documents WHERE user_id = ",
        DOCUMENT_LIST_COLUMNS
    ));
    builder.push_bind(auth.id);

    if let Some(status) = params.status.filter(|s| !s.is_empty()) {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }

    if let Some(document_type) = params.document_type.filter(|t| !t.is_empty()) {
        builder.push(" AND document_type = ");
        builder.push_bind(document_type);
    }

    builder.push(" ORDER BY created_at DESC, id DESC");

    let documents = builder
        .build_query_as::<Document>()
        .fetch_all(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list documents: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(documents))
}

/// Fetches a single document visible to the caller.
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let document = find_visible(&state, &auth, id).await?;
    Ok(Json(document))
}

/// Records an admin's manual decision on a document.
/// Admin only.
pub async fn verify_document(
    State(state): State<AppState>,
    auth: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<i64>,
    Json(payload): Json<VerifyDocumentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let document = Document::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound("Document not found".to_string()))?;

    let now = Utc::now();
    let notes = payload
        .notes
        .as_deref()
        .map(clean_text)
        .unwrap_or_default();
    let (status, action) = if payload.is_valid {
        (DocumentStatus::Verified, LogAction::Approve)
    } else {
        (DocumentStatus::Rejected, LogAction::Reject)
    };

    let result = manual_decision(
        document.verification_result.map(|r| r.0),
        payload.is_valid,
        &notes,
        auth.id,
        now,
    );

    let updated = sqlx::query_as::<_, Document>(&format!(
        r#"
        UPDATE documents
        SET status = ?, verification_result = ?, notes = ?, verified_by = ?,
            verified_at = ?, updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        DOCUMENT_COLUMNS
    ))
    .bind(status.as_str())
    .bind(SqlJson(result))
    .bind(&notes)
    .bind(auth.id)
    .bind(now)
    .bind(now)
    .bind(id)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to verify document: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound("Document not found".to_string()))?;

    NewLogEntry::new(id, updated.user_id, action, LogStatus::Success)
        .details(json!({ "reviewedBy": auth.id, "notes": notes }))
        .origin(origin)
        .insert(&state.pool)
        .await?;

    tracing::info!("Document {} marked {} by admin {}", id, status.as_str(), auth.id);

    Ok(Json(updated))
}

/// Deletes one of the caller's documents together with its stored file.
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let document = find_owned(&state, &auth, id).await?;

    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete document: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Document not found".to_string()));
    }

    if let Some(path) = document.file_path {
        storage::remove_upload(&PathBuf::from(path)).await?;
    }

    Ok(Json(json!({ "message": "Document deleted successfully" })))
}

/// Runs the AI pipeline again for one of the caller's documents.
pub async fn reprocess_document(
    State(state): State<AppState>,
    auth: AuthUser,
    origin: RequestOrigin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let document = find_owned(&state, &auth, id).await?;

    if document.status == DocumentStatus::Processing.as_str()
        || document.status == DocumentStatus::Uploaded.as_str()
    {
        return Err(AppError::Conflict(
            "Document is already being processed".to_string(),
        ));
    }

    let file_path = document
        .file_path
        .clone()
        .map(PathBuf::from)
        .ok_or(AppError::InternalServerError("Document has no stored file".to_string()))?;

    // Claim the document so a concurrent request cannot start a second job.
    // `uploaded` rows already have their upload job queued.
    let claimed = sqlx::query(
        "UPDATE documents SET status = ?, updated_at = ? WHERE id = ? AND status NOT IN (?, ?)",
    )
    .bind(DocumentStatus::Processing.as_str())
    .bind(Utc::now())
    .bind(id)
    .bind(DocumentStatus::Processing.as_str())
    .bind(DocumentStatus::Uploaded.as_str())
    .execute(&state.pool)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Document is already being processed".to_string(),
        ));
    }

    NewLogEntry::new(id, auth.id, LogAction::Reprocess, LogStatus::Pending)
        .origin(origin)
        .insert(&state.pool)
        .await?;

    processor::spawn(
        state.pool.clone(),
        state.analyzer.clone(),
        ProcessingJob {
            document_id: id,
            user_id: auth.id,
            file_path,
            document_type: document.document_type.clone(),
            original_name: document.original_name.clone(),
            action: LogAction::Reprocess,
        },
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Document queued for reprocessing", "id": id })),
    ))
}

/// Merges an admin decision into whatever the AI pipeline produced.
fn manual_decision(
    previous: Option<VerificationResult>,
    is_valid: bool,
    notes: &str,
    reviewer: i64,
    at: chrono::DateTime<Utc>,
) -> VerificationResult {
    let authenticity = if is_valid {
        Authenticity::Authentic
    } else {
        Authenticity::Fake
    };

    match previous {
        Some(previous) => VerificationResult {
            authenticity,
            verification_method: VerificationMethod::Hybrid,
            is_valid: Some(is_valid),
            notes: Some(notes.to_string()),
            verified_by: Some(reviewer),
            verified_at: Some(at),
            ..previous
        },
        None => VerificationResult {
            confidence: if is_valid { 100 } else { 0 },
            authenticity,
            verification_method: VerificationMethod::Manual,
            analysis_details: None,
            is_valid: Some(is_valid),
            notes: Some(notes.to_string()),
            verified_by: Some(reviewer),
            verified_at: Some(at),
        },
    }
}

async fn find_visible(state: &AppState, auth: &AuthUser, id: i64) -> Result<Document, AppError> {
    Document::find_by_id(&state.pool, id)
        .await?
        .filter(|document| document.is_visible_to(auth))
        .ok_or(AppError::NotFound("Document not found".to_string()))
}

async fn find_owned(state: &AppState, auth: &AuthUser, id: i64) -> Result<Document, AppError> {
    Document::find_by_id(&state.pool, id)
        .await?
        .filter(|document| document.user_id == auth.id)
        .ok_or(AppError::NotFound("Document not found".to_string()))
}
