// tests/common/mod.rs

#![allow(dead_code)]

use std::{path::Path, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use docverify::{
    config::Config,
    db, routes,
    services::ai_ml::{
        AnalysisReport, DocumentAnalyzer, FormatReport, OcrReport, SignatureReport,
    },
    state::AppState,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;

pub const ADMIN_EMAIL: &str = "admin@docverify.test";
pub const ADMIN_PASSWORD: &str = "AdminPass1";
pub const USER_PASSWORD: &str = "Secret123";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub upload_dir: PathBuf,
    pub client: reqwest::Client,
}

/// Stand-in for the AI/ML service with fixed scores.
///
/// Every report except the main analysis contributes 0.9, so the weighted
/// score is `0.5 * confidence + 0.45` minus the anomaly penalty.
pub struct StubAnalyzer {
    pub healthy: bool,
    pub confidence: f64,
    pub anomalies: usize,
    /// How long `analyze` takes to answer.
    pub delay: Duration,
}

impl StubAnalyzer {
    /// Scores high enough to be verified automatically.
    pub fn confident() -> Self {
        Self::scoring(1.0, 0)
    }

    pub fn unavailable() -> Self {
        Self { healthy: false, ..Self::scoring(0.0, 0) }
    }

    pub fn scoring(confidence: f64, anomalies: usize) -> Self {
        Self {
            healthy: true,
            confidence,
            anomalies,
            delay: Duration::ZERO,
        }
    }

    /// Confident, but holds the document in `processing` for `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::confident() }
    }
}

#[async_trait]
impl DocumentAnalyzer for StubAnalyzer {
    async fn is_healthy(&self) -> bool {
        self.healthy
    }

    async fn analyze(&self, _file: &Path, _original_name: &str, _document_type: &str) -> AnalysisReport {
        tokio::time::sleep(self.delay).await;
        AnalysisReport {
            is_valid: self.anomalies == 0,
            confidence_score: self.confidence,
            quality_score: 0.9,
            anomalies: (1..=self.anomalies).map(|n| format!("anomaly {}", n)).collect(),
            ..Default::default()
        }
    }

    async fn validate_format(&self, _file: &Path, _document_type: &str) -> FormatReport {
        FormatReport {
            is_valid: true,
            format_supported: true,
            format_score: 0.9,
            ..Default::default()
        }
    }

    async fn perform_ocr(&self, _file: &Path) -> OcrReport {
        OcrReport {
            text: "REPUBLIC OF TESTING".to_string(),
            confidence: 0.9,
            ..Default::default()
        }
    }

    async fn detect_signature(&self, _file: &Path) -> SignatureReport {
        SignatureReport {
            signature_detected: true,
            signature_count: 1,
            confidence: Some(0.9),
            ..Default::default()
        }
    }
}

/// Spawns the app on a random port with its own SQLite file and upload directory.
pub async fn spawn_app(analyzer: impl DocumentAnalyzer + 'static) -> TestApp {
    let root = std::env::temp_dir().join(format!("docverify-test-{}", uuid::Uuid::new_v4()));
    let upload_dir = root.join("uploads");
    std::fs::create_dir_all(&upload_dir).expect("Failed to create test directory");

    let database_url = format!("sqlite://{}", root.join("test.db").display());

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        ai_ml_service_url: "http://127.0.0.1:9".to_string(),
        upload_dir: upload_dir.clone(),
        max_upload_bytes: 64 * 1024,
        port: 0,
        cors_origin: None,
    };

    let pool = db::connect(&database_url, 5)
        .await
        .expect("Failed to open test database");
    db::migrate(&pool).await.expect("Failed to migrate database");
    db::seed_admin_user(&pool, &config)
        .await
        .expect("Failed to seed admin user");

    let state = AppState::new(pool.clone(), config, Arc::new(analyzer));
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        upload_dir,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers a fresh user and returns `(token, user id)`.
    pub async fn register_user(&self) -> (String, i64) {
        let email = format!("user_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "name": "Test User",
                "email": email,
                "password": USER_PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn admin_token(&self) -> String {
        let response = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Uploads `bytes` as a PNG via the multipart endpoint.
    pub async fn upload(
        &self,
        token: &str,
        file_name: &str,
        bytes: Vec<u8>,
        document_type: &str,
    ) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .unwrap();
        let form = reqwest::multipart::Form::new()
            .part("document", part)
            .text("documentType", document_type.to_string());

        self.client
            .post(self.url("/api/documents/upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Polls the document until background processing leaves `processing`/`uploaded`.
    pub async fn wait_for_processing(&self, token: &str, id: i64) -> Value {
        for _ in 0..50 {
            let document: Value = self
                .client
                .get(self.url(&format!("/api/documents/{}", id)))
                .bearer_auth(token)
                .send()
                .await
                .expect("Failed to execute request")
                .json()
                .await
                .unwrap();

            let status = document["status"].as_str().unwrap_or_default();
            if status != "uploaded" && status != "processing" {
                return document;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Document {} was not processed in time", id);
    }
}

/// A few bytes that pass as a PNG upload.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend(std::iter::repeat_n(0u8, 256));
    bytes
}
