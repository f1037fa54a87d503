// tests/ai_ml_client_tests.rs

use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::Multipart,
    routing::{get, post},
};
use docverify::services::ai_ml::{AiMlClient, DocumentAnalyzer};
use serde_json::{Value, json};

/// Lists the multipart field names the client sent.
async fn field_names(mut multipart: Multipart) -> Vec<String> {
    let mut names = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if let Some(name) = field.name() {
            names.push(name.to_string());
        }
    }
    names
}

/// Spawns a fake AI/ML service on a random port and returns its base URL.
async fn spawn_mock_service() -> String {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/v1/analyze",
            post(|multipart: Multipart| async move {
                let fields = field_names(multipart).await;
                Json(json!({
                    "is_valid": true,
                    "confidence_score": 0.82,
                    "detected_text": "SPECIMEN",
                    "extracted_data": { "fields": fields },
                    "anomalies": null,
                    "quality_score": 0.74,
                }))
            }),
        )
        .route(
            "/api/v1/validate-format",
            post(|| async { Json(json!({ "is_valid_format": true, "format_score": 0.85 })) }),
        )
        .route(
            "/api/v1/ocr",
            post(|| async { Json(json!({ "text": "hello world", "confidence": 0.77, "word_count": 2 })) }),
        )
        .route(
            "/api/v1/detect-signature",
            post(|| async { Json(json!({ "signature_detected": true, "confidence": null })) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}/", port)
}

fn temp_file(extension: &str, bytes: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("ai-ml-{}.{}", uuid::Uuid::new_v4(), extension));
    std::fs::write(&path, bytes).unwrap();
    path
}

#[tokio::test]
async fn client_decodes_service_reports() {
    let base_url = spawn_mock_service().await;
    let client = AiMlClient::new(base_url).unwrap();
    let image = temp_file("png", b"\x89PNG\r\n\x1a\nimage");

    assert!(client.is_healthy().await);

    let analysis = client.analyze(&image, "passport.png", "passport").await;
    assert!(analysis.is_valid);
    assert_eq!(analysis.confidence_score, 0.82);
    assert_eq!(analysis.quality_score, 0.74);
    assert!(analysis.anomalies.is_empty());
    let fields: Vec<Value> = analysis.extracted_data["fields"].as_array().unwrap().clone();
    assert!(fields.contains(&json!("file")));
    assert!(fields.contains(&json!("document_type")));

    let format = client.validate_format(&image, "passport").await;
    assert!(format.is_valid);
    assert_eq!(format.format_score, 0.85);

    let ocr = client.perform_ocr(&image).await;
    assert_eq!(ocr.text, "hello world");
    assert_eq!(ocr.word_count, 2);

    let signature = client.detect_signature(&image).await;
    assert!(signature.signature_detected);
    assert_eq!(signature.confidence, None);

    std::fs::remove_file(image).unwrap();
}

#[tokio::test]
async fn unreachable_service_degrades_to_fallbacks() {
    // Port 9 (discard) is not listening on test machines
    let client = AiMlClient::new("http://127.0.0.1:9").unwrap();
    let image = temp_file("jpg", b"\xff\xd8\xffjpeg");

    assert!(!client.is_healthy().await);

    let analysis = client.analyze(&image, "id.jpg", "id-card").await;
    assert!(!analysis.is_valid);
    assert_eq!(analysis.confidence_score, 0.1);
    assert!(analysis.error.is_some());
    assert_eq!(analysis.anomalies[0], "AI service error during analysis");

    let format = client.validate_format(&image, "id-card").await;
    assert!(!format.is_valid);
    assert_eq!(format.format_score, 0.1);

    let ocr = client.perform_ocr(&image).await;
    assert_eq!(ocr.confidence, 0.1);

    let signature = client.detect_signature(&image).await;
    assert!(!signature.signature_detected);
    assert_eq!(signature.confidence, Some(0.1));

    std::fs::remove_file(image).unwrap();
}

#[tokio::test]
async fn pdfs_are_assessed_locally() {
    // Nothing listens here, so any network call would fall back
    let client = AiMlClient::new("http://127.0.0.1:9").unwrap();
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(20_000, b' ');
    let pdf = temp_file("pdf", &bytes);

    let analysis = client.analyze(&pdf, "diploma.pdf", "certificate").await;
    assert!(analysis.error.is_none());
    assert!(analysis.anomalies.is_empty());
    assert!(analysis.is_valid);

    let format = client.validate_format(&pdf, "certificate").await;
    assert_eq!(format.format_score, 0.7);
    assert_eq!(client.perform_ocr(&pdf).await.confidence, 0.6);
    assert_eq!(client.detect_signature(&pdf).await.confidence, Some(0.5));

    std::fs::remove_file(pdf).unwrap();
}

#[tokio::test]
async fn pdf_filename_check_uses_the_uploaded_name() {
    let client = AiMlClient::new("http://127.0.0.1:9").unwrap();
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(20_000, b' ');
    let pdf = temp_file("pdf", &bytes);

    let analysis = client.analyze(&pdf, "fake-diploma.pdf", "certificate").await;
    assert!(!analysis.is_valid);
    assert!(analysis.anomalies.contains(&"Suspicious filename detected".to_string()));

    std::fs::remove_file(pdf).unwrap();
}
