use std::{sync::Arc, time::Instant};

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{config::Config, services::ai_ml::DocumentAnalyzer};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    /// Client for the external AI/ML service. Tests substitute a stub.
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        Self {
            pool,
            config,
            analyzer,
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
