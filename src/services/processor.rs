// src/services/processor.rs

//! Background verification of a stored document.
//!
//! Each upload (or reprocess request) spawns one detached task. Tasks are
//! fire-and-forget with no retries and no ordering between tasks. Any error
//! leaves the document in the `failed` state.
//!
//! A job only writes while the document is still `processing`. If an admin
//! decides the document in the meantime, that decision stands and the job's
//! result is dropped.

use std::{path::PathBuf, sync::Arc, time::Instant};

use chrono::Utc;
use serde_json::json;
use sqlx::{SqlitePool, types::Json};

use crate::{
    models::{
        document::{
            AnalysisDetails, DocumentStatus, OcrSummary, SignatureSummary, VerificationMethod,
            VerificationResult,
        },
        document_types::ai_category,
        verification_log::{LogAction, LogStatus, NewLogEntry},
    },
    services::{
        ai_ml::DocumentAnalyzer,
        scoring::{as_percent, authenticity_score, classify},
    },
};

pub const SERVICE_UNAVAILABLE: &str = "AI/ML service unavailable";
pub const SUPERSEDED: &str = "Document was reviewed while processing";

/// Everything the processor needs to know about one document.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub document_id: i64,
    pub user_id: i64,
    pub file_path: PathBuf,
    pub document_type: String,
    /// Name the file was uploaded under.
    pub original_name: String,
    /// Recorded in the activity log once the job finishes.
    pub action: LogAction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingOutcome {
    Scored { status: DocumentStatus, score: f64 },
    ServiceUnavailable,
    /// The document was deleted while the job was running.
    DocumentGone,
    /// The document left `processing` before the job could store a result.
    Superseded,
}

/// Detaches a processing task onto the runtime.
pub fn spawn(pool: SqlitePool, analyzer: Arc<dyn DocumentAnalyzer>, job: ProcessingJob) {
    tokio::spawn(async move {
        run(&pool, analyzer.as_ref(), job).await;
    });
}

/// Processes one document and records the outcome in the activity log.
pub async fn run(pool: &SqlitePool, analyzer: &dyn DocumentAnalyzer, job: ProcessingJob) {
    let started = Instant::now();
    let result = process(pool, analyzer, &job).await;
    let elapsed_ms = started.elapsed().as_millis() as i64;

    let entry = match result {
        Ok(ProcessingOutcome::Scored { status, score }) => {
            tracing::info!(
                "Document {} processed: status={}, score={:.3}",
                job.document_id,
                status.as_str(),
                score
            );
            NewLogEntry::new(job.document_id, job.user_id, job.action, LogStatus::Success)
                .details(json!({ "status": status.as_str(), "score": score }))
        }
        Ok(ProcessingOutcome::ServiceUnavailable) => {
            tracing::warn!("Document {} not processed: {}", job.document_id, SERVICE_UNAVAILABLE);
            NewLogEntry::new(job.document_id, job.user_id, job.action, LogStatus::Failure)
                .error(SERVICE_UNAVAILABLE)
        }
        Ok(ProcessingOutcome::Superseded) => {
            tracing::info!("Document {} was decided while processing; result dropped", job.document_id);
            NewLogEntry::new(job.document_id, job.user_id, job.action, LogStatus::Failure)
                .error(SUPERSEDED)
        }
        Ok(ProcessingOutcome::DocumentGone) => {
            tracing::info!("Document {} was deleted during processing", job.document_id);
            return;
        }
        Err(e) => {
            tracing::error!("Processing document {} failed: {:?}", job.document_id, e);
            if let Err(mark_err) = mark_failed(pool, job.document_id, &e.to_string()).await {
                tracing::error!(
                    "Could not mark document {} as failed: {:?}",
                    job.document_id,
                    mark_err
                );
            }
            NewLogEntry::new(job.document_id, job.user_id, job.action, LogStatus::Failure)
                .error(e.to_string())
        }
    };

    if let Err(e) = entry.processing_time_ms(elapsed_ms).insert(pool).await {
        tracing::warn!("Failed to record processing log for {}: {:?}", job.document_id, e);
    }
}

/// Runs the analyses, scores them and stores the verification result.
pub async fn process(
    pool: &SqlitePool,
    analyzer: &dyn DocumentAnalyzer,
    job: &ProcessingJob,
) -> Result<ProcessingOutcome, sqlx::Error> {
    let now = Utc::now();
    // Fresh uploads are `uploaded`; reprocess requests claim the row before spawning
    let claimed = sqlx::query(
        "UPDATE documents SET status = ?, error = NULL, updated_at = ? WHERE id = ? AND status IN (?, ?)",
    )
    .bind(DocumentStatus::Processing.as_str())
    .bind(now)
    .bind(job.document_id)
    .bind(DocumentStatus::Uploaded.as_str())
    .bind(DocumentStatus::Processing.as_str())
    .execute(pool)
    .await?;
    if claimed.rows_affected() == 0 {
        return lost_claim(pool, job.document_id).await;
    }

    if !analyzer.is_healthy().await {
        if !mark_failed(pool, job.document_id, SERVICE_UNAVAILABLE).await? {
            return lost_claim(pool, job.document_id).await;
        }
        return Ok(ProcessingOutcome::ServiceUnavailable);
    }

    let category = ai_category(&job.document_type);
    let path = job.file_path.as_path();
    let (analysis, format, ocr, signature) = tokio::join!(
        analyzer.analyze(path, &job.original_name, category),
        analyzer.validate_format(path, category),
        analyzer.perform_ocr(path),
        analyzer.detect_signature(path),
    );

    let score = authenticity_score(&analysis, &format, &ocr, &signature);
    let (status, authenticity) = classify(score);

    let result = VerificationResult {
        confidence: as_percent(score),
        authenticity,
        verification_method: VerificationMethod::AiMl,
        analysis_details: Some(AnalysisDetails {
            quality_score: analysis.quality_score,
            anomalies: analysis.anomalies.clone(),
            ocr_result: OcrSummary {
                text: ocr.text,
                confidence: ocr.confidence,
            },
            signature_detection: SignatureSummary {
                detected: signature.signature_detected,
                confidence: signature.confidence.unwrap_or(0.0),
            },
            ai_analysis: analysis,
            format_validation: format,
        }),
        is_valid: None,
        notes: None,
        verified_by: None,
        verified_at: None,
    };

    let now = Utc::now();
    let verified_at = (status == DocumentStatus::Verified).then_some(now);

    let updated = sqlx::query(
        r#"
        UPDATE documents
        SET status = ?, verification_result = ?, error = NULL,
            processed_at = ?, verified_at = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(status.as_str())
    .bind(Json(result))
    .bind(now)
    .bind(verified_at)
    .bind(now)
    .bind(job.document_id)
    .bind(DocumentStatus::Processing.as_str())
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return lost_claim(pool, job.document_id).await;
    }

    Ok(ProcessingOutcome::Scored { status, score })
}

/// Tells a deleted document apart from one that moved on without this job.
async fn lost_claim(pool: &SqlitePool, document_id: i64) -> Result<ProcessingOutcome, sqlx::Error> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM documents WHERE id = ?")
        .bind(document_id)
        .fetch_optional(pool)
        .await?;

    Ok(match exists {
        Some(_) => ProcessingOutcome::Superseded,
        None => ProcessingOutcome::DocumentGone,
    })
}

/// Returns `false` when the document was no longer `processing`.
async fn mark_failed(pool: &SqlitePool, document_id: i64, reason: &str) -> Result<bool, sqlx::Error> {
    let marked = sqlx::query(
        "UPDATE documents SET status = ?, error = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(DocumentStatus::Failed.as_str())
    .bind(reason)
    .bind(Utc::now())
    .bind(document_id)
    .bind(DocumentStatus::Processing.as_str())
    .execute(pool)
    .await?;
    Ok(marked.rows_affected() > 0)
}
