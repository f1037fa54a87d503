// src/db.rs

use std::{path::Path, str::FromStr, time::Duration};

use chrono::Utc;
use sqlx::{
    SqlitePool,
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
    config::Config,
    error::AppError,
    models::user::{ROLE_ADMIN, normalize_email},
    utils::crypto::hash_password,
};

const CONNECT_ATTEMPTS: u32 = 5;

/// Opens the SQLite pool, creating the database file if needed.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
}

/// Creates the directory holding a file-backed SQLite database.
pub async fn ensure_database_dir(database_url: &str) -> std::io::Result<()> {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }

    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

/// Same as `connect`, retrying a few times with a short pause in between.
pub async fn connect_with_retry(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let mut attempt = 0;
    loop {
        match connect(database_url, 5).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                attempt += 1;
                if attempt >= CONNECT_ATTEMPTS {
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", attempt);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Creates the admin account named in the configuration if it does not exist yet.
pub async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = normalize_email(email);

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    if exists.is_none() {
        tracing::info!("Seeding admin user: {}", email);
        let hashed_password = hash_password(password)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (name, email, password, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind("Administrator")
        .bind(&email)
        .bind(hashed_password)
        .bind(ROLE_ADMIN)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        tracing::info!("Admin user created successfully.");
    }
    Ok(())
}
