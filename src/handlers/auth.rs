// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::user::{
        AuthResponse, ChangePasswordRequest, LoginRequest, ROLE_GENERAL, RegisterRequest,
        USER_COLUMNS, UpdateAccountRequest, User, normalize_email,
    },
    utils::{
        crypto::{generate_api_key, hash_password, verify_password},
        jwt::{AuthUser, sign_jwt},
    },
};

const BAD_CREDENTIALS: &str = "The email or password you entered is incorrect. Please try again.";

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with a token so the client is signed in straight away.
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Length rules apply to the name as stored
    payload.name = payload.name.trim().to_string();
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let email = normalize_email(&payload.email);
    let hashed_password = hash_password(&payload.password)?;
    let role = payload.role.unwrap_or_else(|| ROLE_GENERAL.to_string());
    let now = Utc::now();

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users
        (name, email, password, role, mobile_number, college_name, country,
         referral_code, terms_accepted, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&payload.name)
    .bind(&email)
    .bind(hashed_password)
    .bind(role)
    .bind(payload.mobile_number)
    .bind(payload.college_name)
    .bind(payload.country)
    .bind(payload.referral_code)
    .bind(payload.terms_accepted.unwrap_or(true))
    .bind(now)
    .bind(now)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(
                "An account with this email already exists. Please try logging in or use a different email."
                    .to_string(),
            )
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!("User registered: id={}", user.id);

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            token_type: "Bearer",
            user,
        }),
    ))
}

/// Authenticates a user and returns a JWT token.
///
/// Unknown email and wrong password share one message so the endpoint
/// does not reveal which accounts exist.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let email = normalize_email(&payload.email);
    let user = User::find_by_email(&pool, &email)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::AuthError(BAD_CREDENTIALS.to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError(BAD_CREDENTIALS.to_string()));
    }

    if !user.is_active {
        return Err(AppError::Forbidden(
            "This account has been deactivated. Please contact an administrator.".to_string(),
        ));
    }

    let now = Utc::now();
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(user.id)
        .execute(&pool)
        .await?;

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(AuthResponse {
        token,
        token_type: "Bearer",
        user: User {
            last_login: Some(now),
            ..user
        },
    }))
}

/// Returns the authenticated user.
pub async fn me(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&pool, auth.id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Tokens are stateless; the client simply forgets its copy.
pub async fn logout() -> impl IntoResponse {
    Json(json!({ "message": "Logout successful" }))
}

/// Connectivity probe used by the frontend.
pub async fn connection_test(State(config): State<Config>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Backend connection successful",
        "timestamp": Utc::now(),
        "port": config.port,
    }))
}

/// Updates the account settings of the authenticated user.
pub async fn update_account(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
    Json(mut payload): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.name = payload.name.map(|name| name.trim().to_string());
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET updated_at = ");
    builder.push_bind(Utc::now());

    if let Some(name) = payload.name {
        builder.push(", name = ");
        builder.push_bind(name);
    }

    if let Some(mobile_number) = payload.mobile_number {
        builder.push(", mobile_number = ");
        builder.push_bind(mobile_number);
    }

    if let Some(college_name) = payload.college_name {
        builder.push(", college_name = ");
        builder.push_bind(college_name);
    }

    if let Some(country) = payload.country {
        builder.push(", country = ");
        builder.push_bind(country);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(auth.id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update account: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let user = User::find_by_id(&pool, auth.id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Changes the password after re-checking the current one.
pub async fn change_password(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = User::find_by_id(&pool, auth.id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&payload.current_password, &user.password)? {
        return Err(AppError::AuthError("Current password is incorrect".to_string()));
    }

    let hashed = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = ?, updated_at = ? WHERE id = ?")
        .bind(hashed)
        .bind(Utc::now())
        .bind(auth.id)
        .execute(&pool)
        .await?;

    tracing::info!("Password changed for user {}", auth.id);

    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// Issues a fresh personal API key, replacing any previous one.
pub async fn create_api_key(
    State(pool): State<SqlitePool>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let api_key = generate_api_key();

    let result = sqlx::query("UPDATE users SET api_key = ?, updated_at = ? WHERE id = ?")
        .bind(&api_key)
        .bind(Utc::now())
        .bind(auth.id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok((StatusCode::CREATED, Json(json!({ "apiKey": api_key }))))
}
