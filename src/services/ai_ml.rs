// src/services/ai_ml.rs

//! Client for the external AI/ML analysis service.
//!
//! The service is an opaque collaborator: every call degrades to a
//! conservative fallback report instead of failing, so the processor only
//! ever sees numbers to score. PDFs are never sent over the wire; they are
//! assessed locally from the file header and size.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use tokio::io::AsyncReadExt;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SUSPICIOUS_FILENAME_WORDS: [&str; 6] = ["fake", "fraud", "sample", "test", "dummy", "specimen"];

/// Treats an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Result of `POST /api/v1/analyze`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisReport {
    #[serde(deserialize_with = "nullable")]
    pub is_valid: bool,
    #[serde(deserialize_with = "nullable")]
    pub confidence_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub detected_text: String,
    pub extracted_data: serde_json::Value,
    #[serde(deserialize_with = "nullable")]
    pub anomalies: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub quality_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub ocr_accuracy: f64,
    #[serde(deserialize_with = "nullable")]
    pub signature_detected: bool,
    #[serde(deserialize_with = "nullable")]
    pub processing_time: f64,
    #[serde(deserialize_with = "nullable")]
    pub rejection_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `POST /api/v1/validate-format`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatReport {
    #[serde(alias = "is_valid_format", deserialize_with = "nullable")]
    pub is_valid: bool,
    #[serde(deserialize_with = "nullable")]
    pub format_supported: bool,
    #[serde(deserialize_with = "nullable")]
    pub file_type: String,
    #[serde(deserialize_with = "nullable")]
    pub format_score: f64,
    #[serde(deserialize_with = "nullable")]
    pub message: String,
}

/// Result of `POST /api/v1/ocr`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrReport {
    #[serde(deserialize_with = "nullable")]
    pub text: String,
    #[serde(deserialize_with = "nullable")]
    pub confidence: f64,
    #[serde(deserialize_with = "nullable")]
    pub word_count: u64,
    #[serde(deserialize_with = "nullable")]
    pub processing_method: String,
}

/// Result of `POST /api/v1/detect-signature`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureReport {
    #[serde(deserialize_with = "nullable")]
    pub signature_detected: bool,
    #[serde(deserialize_with = "nullable")]
    pub signature_count: u64,
    pub confidence: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub method: String,
}

/// The four analyses the processor runs for every document.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn is_healthy(&self) -> bool;
    /// `original_name` is the name the user uploaded the file under.
    async fn analyze(&self, file: &Path, original_name: &str, document_type: &str) -> AnalysisReport;
    async fn validate_format(&self, file: &Path, document_type: &str) -> FormatReport;
    async fn perform_ocr(&self, file: &Path) -> OcrReport;
    async fn detect_signature(&self, file: &Path) -> SignatureReport;
}

#[derive(Debug, Error)]
pub enum AiMlError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
    #[error("AI/ML service request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP implementation of `DocumentAnalyzer`.
#[derive(Debug, Clone)]
pub struct AiMlClient {
    http: reqwest::Client,
    base_url: String,
}

impl AiMlClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AiMlError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Uploads the file as multipart field `file` (plus `document_type` when
    /// given) and decodes the JSON reply.
    async fn post_file<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        file: &Path,
        document_type: Option<&str>,
        timeout: Duration,
    ) -> Result<T, AiMlError> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        if let Some(document_type) = document_type {
            form = form.text("document_type", document_type.to_string());
        }

        let report = self
            .http
            .post(format!("{}{}", self.base_url, endpoint))
            .multipart(form)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;

        Ok(report)
    }
}

#[async_trait]
impl DocumentAnalyzer for AiMlClient {
    async fn is_healthy(&self) -> bool {
        match self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::warn!("AI/ML service health check failed: {}", e);
                false
            }
        }
    }

    async fn analyze(&self, file: &Path, original_name: &str, document_type: &str) -> AnalysisReport {
        if is_pdf(file) {
            tracing::debug!("Analysing PDF locally: {}", file.display());
            return analyze_pdf(file, original_name, document_type).await;
        }

        match self
            .post_file("/api/v1/analyze", file, Some(document_type), ANALYZE_TIMEOUT)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("AI/ML analyze failed for {}: {}", file.display(), e);
                fallback_analysis(document_type, &e.to_string())
            }
        }
    }

    async fn validate_format(&self, file: &Path, document_type: &str) -> FormatReport {
        if is_pdf(file) {
            return FormatReport {
                is_valid: true,
                format_supported: true,
                file_type: "pdf".to_string(),
                format_score: 0.7,
                message: "PDF format validation completed".to_string(),
            };
        }

        match self
            .post_file("/api/v1/validate-format", file, Some(document_type), DEFAULT_TIMEOUT)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Format validation failed for {}: {}", file.display(), e);
                FormatReport {
                    is_valid: false,
                    format_supported: false,
                    file_type: "unknown".to_string(),
                    format_score: 0.1,
                    message: "Format validation service unavailable".to_string(),
                }
            }
        }
    }

    async fn perform_ocr(&self, file: &Path) -> OcrReport {
        if is_pdf(file) {
            return OcrReport {
                text: "PDF text extraction completed".to_string(),
                confidence: 0.6,
                word_count: 0,
                processing_method: "pdf_text_extraction".to_string(),
            };
        }

        match self.post_file("/api/v1/ocr", file, None, DEFAULT_TIMEOUT).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("OCR failed for {}: {}", file.display(), e);
                OcrReport {
                    text: "OCR service unavailable".to_string(),
                    confidence: 0.1,
                    word_count: 0,
                    processing_method: "ocr_service_failed".to_string(),
                }
            }
        }
    }

    async fn detect_signature(&self, file: &Path) -> SignatureReport {
        if is_pdf(file) {
            return SignatureReport {
                signature_detected: false,
                signature_count: 0,
                confidence: Some(0.5),
                method: "pdf_signature_analysis".to_string(),
            };
        }

        match self
            .post_file("/api/v1/detect-signature", file, None, DEFAULT_TIMEOUT)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Signature detection failed for {}: {}", file.display(), e);
                SignatureReport {
                    signature_detected: false,
                    signature_count: 0,
                    confidence: Some(0.1),
                    method: "signature_service_failed".to_string(),
                }
            }
        }
    }
}

pub fn is_pdf(file: &Path) -> bool {
    file.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn fallback_analysis(document_type: &str, error: &str) -> AnalysisReport {
    AnalysisReport {
        is_valid: false,
        confidence_score: 0.1,
        detected_text: "Analysis failed - AI service error".to_string(),
        extracted_data: json!({
            "documentType": document_type,
            "processed": false,
            "serviceError": true,
        }),
        anomalies: vec![
            "AI service error during analysis".to_string(),
            error.to_string(),
        ],
        quality_score: 0.1,
        ocr_accuracy: 0.1,
        error: Some(error.to_string()),
        ..AnalysisReport::default()
    }
}

/// Reads the PDF header and size from disk and scores them with `assess_pdf`.
/// The filename check runs against `original_name`, not the stored name.
pub async fn analyze_pdf(file: &Path, original_name: &str, document_type: &str) -> AnalysisReport {
    let read_header = async {
        let size = tokio::fs::metadata(file).await?.len();
        let mut header = Vec::with_capacity(8);
        tokio::fs::File::open(file)
            .await?
            .take(8)
            .read_to_end(&mut header)
            .await?;
        Ok::<_, std::io::Error>((header, size))
    };

    match read_header.await {
        Ok((header, size)) => assess_pdf(&header, size, original_name, document_type),
        Err(e) => {
            tracing::error!("PDF analysis failed for {}: {}", file.display(), e);
            AnalysisReport {
                detected_text: "PDF analysis failed".to_string(),
                extracted_data: json!({
                    "documentType": document_type,
                    "processed": false,
                    "serviceError": true,
                }),
                anomalies: vec!["PDF analysis processing error".to_string(), e.to_string()],
                error: Some(e.to_string()),
                ..AnalysisReport::default()
            }
        }
    }
}

/// Heuristic PDF assessment from the first bytes of the file, its size and its name.
pub fn assess_pdf(header: &[u8], size: u64, file_name: &str, document_type: &str) -> AnalysisReport {
    let signature = String::from_utf8_lossy(&header[..header.len().min(4)]).into_owned();
    let mut anomalies = Vec::new();
    let mut confidence: f64;
    let mut quality: f64;
    let is_valid;

    if signature == "%PDF" {
        confidence = 0.6;
        quality = 0.6;

        if size < 1000 {
            anomalies.push("PDF file size too small".to_string());
        } else {
            quality += 0.1;
        }
        if size > 10_000 {
            confidence += 0.1;
        }
        if size > 50_000 {
            confidence += 0.1;
            quality += 0.1;
        }

        let lowered = file_name.to_lowercase();
        if SUSPICIOUS_FILENAME_WORDS.iter().any(|word| lowered.contains(word)) {
            anomalies.push("Suspicious filename detected".to_string());
        }

        if anomalies.is_empty() {
            confidence += 0.1;
        } else {
            quality -= 0.1 * anomalies.len() as f64;
        }
        confidence -= 0.2 * anomalies.len() as f64;
        is_valid = confidence >= 0.5 && anomalies.is_empty();
    } else {
        anomalies.push("Invalid PDF signature".to_string());
        confidence = 0.1;
        quality = 0.3;
        is_valid = false;
    }

    let pdf_version = if is_valid && header.len() >= 8 {
        String::from_utf8_lossy(&header[5..8]).into_owned()
    } else {
        "N/A".to_string()
    };

    AnalysisReport {
        is_valid,
        confidence_score: confidence.clamp(0.0, 1.0),
        detected_text: format!("PDF (Signature: {}, Size: {} bytes)", signature, size),
        extracted_data: json!({
            "documentType": document_type,
            "processed": true,
            "fileFormat": "PDF",
            "fileSize": size,
            "pdfVersion": pdf_version,
        }),
        anomalies,
        quality_score: quality.clamp(0.0, 1.0),
        ocr_accuracy: 0.5,
        ..AnalysisReport::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[u8] = b"%PDF-1.7";

    #[test]
    fn healthy_large_pdf_is_valid() {
        let report = assess_pdf(HEADER, 80_000, "passport_scan.pdf", "passport");

        assert!(report.is_valid);
        assert!(report.anomalies.is_empty());
        // 0.6 base + 0.1 (>10k) + 0.1 (>50k) + 0.1 (clean)
        assert!((report.confidence_score - 0.9).abs() < 1e-9);
        // 0.6 base + 0.1 (>=1000) + 0.1 (>50k)
        assert!((report.quality_score - 0.8).abs() < 1e-9);
        assert_eq!(report.extracted_data["pdfVersion"], "1.7");
    }

    #[test]
    fn tiny_pdf_is_flagged() {
        let report = assess_pdf(HEADER, 500, "scan.pdf", "passport");

        assert!(!report.is_valid);
        assert_eq!(report.anomalies, vec!["PDF file size too small".to_string()]);
        // 0.6 - 0.2
        assert!((report.confidence_score - 0.4).abs() < 1e-9);
        assert_eq!(report.extracted_data["pdfVersion"], "N/A");
    }

    #[test]
    fn suspicious_names_are_flagged() {
        let report = assess_pdf(HEADER, 20_000, "SAMPLE-certificate.pdf", "certificate");

        assert!(!report.is_valid);
        assert!(report.anomalies.contains(&"Suspicious filename detected".to_string()));
    }

    #[test]
    fn missing_signature_is_invalid() {
        let report = assess_pdf(b"\x89PNG\r\n\x1a\n", 20_000, "scan.pdf", "other");

        assert!(!report.is_valid);
        assert_eq!(report.anomalies, vec!["Invalid PDF signature".to_string()]);
        assert!((report.confidence_score - 0.1).abs() < 1e-9);
        assert!((report.quality_score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn short_files_do_not_panic() {
        let report = assess_pdf(b"%P", 2, "x.pdf", "other");
        assert!(!report.is_valid);
    }

    #[test]
    fn pdf_detection_uses_the_extension() {
        assert!(is_pdf(Path::new("uploads/a.PDF")));
        assert!(!is_pdf(Path::new("uploads/a.png")));
        assert!(!is_pdf(Path::new("uploads/pdf")));
    }

    #[test]
    fn nulls_decode_as_defaults() {
        let report: AnalysisReport = serde_json::from_value(json!({
            "is_valid": true,
            "confidence_score": null,
            "anomalies": null,
            "quality_score": 0.7,
            "unexpected": "ignored"
        }))
        .unwrap();

        assert!(report.is_valid);
        assert_eq!(report.confidence_score, 0.0);
        assert!(report.anomalies.is_empty());
        assert_eq!(report.quality_score, 0.7);
    }

    #[test]
    fn format_report_accepts_service_field_names() {
        let report: FormatReport = serde_json::from_value(json!({
            "success": true,
            "is_valid_format": true,
            "format_score": 0.85
        }))
        .unwrap();

        assert!(report.is_valid);
        assert_eq!(report.format_score, 0.85);
    }

    #[tokio::test]
    async fn pdf_on_disk_is_read_from_its_header() {
        let path = std::env::temp_dir().join(format!("docverify-{}.pdf", uuid::Uuid::new_v4()));
        let mut bytes = HEADER.to_vec();
        bytes.resize(20_000, b' ');
        tokio::fs::write(&path, &bytes).await.unwrap();

        let report = analyze_pdf(&path, "transcript.pdf", "certificate").await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(report.is_valid);
        assert_eq!(report.extracted_data["fileSize"], 20_000);
    }

    #[tokio::test]
    async fn uploaded_name_drives_the_filename_check() {
        // Stored under a random name, uploaded as something suspicious
        let path = std::env::temp_dir().join(format!("{}.pdf", uuid::Uuid::new_v4()));
        let mut bytes = HEADER.to_vec();
        bytes.resize(20_000, b' ');
        tokio::fs::write(&path, &bytes).await.unwrap();

        let report = analyze_pdf(&path, "fake-diploma.pdf", "certificate").await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(
            report
                .anomalies
                .iter()
                .any(|a| a.contains("Suspicious filename"))
        );
    }

    #[tokio::test]
    async fn missing_pdf_falls_back() {
        let report = analyze_pdf(Path::new("/definitely/not/here.pdf"), "here.pdf", "other").await;

        assert!(!report.is_valid);
        assert_eq!(report.confidence_score, 0.0);
        assert!(report.error.is_some());
    }
}
