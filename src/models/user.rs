// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use validator::{Validate, ValidationError};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_GENERAL: &str = "general";

/// Every role a user row may carry.
pub const ROLES: [&str; 4] = ["student", "general", "admin", "user"];

static MOBILE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").unwrap());

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,

    /// Unique, stored lowercase.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub role: String,
    pub mobile_number: Option<String>,
    pub college_name: Option<String>,
    pub country: Option<String>,
    pub referral_code: Option<String>,
    pub terms_accepted: bool,

    #[serde(skip)]
    pub api_key: Option<String>,

    pub is_active: bool,
    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Column list matching `User`, shared by every query that loads a full row.
pub const USER_COLUMNS: &str = "id, name, email, password, role, mobile_number, college_name, \
    country, referral_code, terms_accepted, api_key, is_active, last_login, created_at, updated_at";

impl User {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// `email` must already be normalized.
    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(custom(function = validate_password_strength))]
    pub password: String,

    #[validate(custom(function = validate_self_service_role))]
    pub role: Option<String>,

    #[validate(custom(function = validate_mobile_number))]
    pub mobile_number: Option<String>,

    #[validate(length(max = 120))]
    pub college_name: Option<String>,

    #[validate(length(max = 80))]
    pub country: Option<String>,

    #[validate(length(max = 50))]
    pub referral_code: Option<String>,

    pub terms_accepted: Option<bool>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// DTO for the account settings form.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = validate_mobile_number))]
    pub mobile_number: Option<String>,

    #[validate(length(max = 120))]
    pub college_name: Option<String>,

    #[validate(length(max = 80))]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(custom(function = validate_password_strength))]
    pub new_password: String,
}

/// Token response shared by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub user: User,
}

/// At least six characters with a lowercase letter, an uppercase letter and a digit.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 6 {
        return Err(rule(
            "password_too_short",
            "Password must be at least 6 characters long",
        ));
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !(has_lower && has_upper && has_digit) {
        return Err(rule(
            "password_too_weak",
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        ));
    }
    Ok(())
}

pub fn validate_mobile_number(number: &str) -> Result<(), ValidationError> {
    if !MOBILE_NUMBER.is_match(number) {
        return Err(rule("invalid_mobile_number", "Please provide a valid mobile number"));
    }
    Ok(())
}

/// Registration may pick any role except `admin`.
fn validate_self_service_role(role: &str) -> Result<(), ValidationError> {
    if !ROLES.contains(&role) || role == ROLE_ADMIN {
        return Err(rule("invalid_role", "Invalid role selected"));
    }
    Ok(())
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Emails are compared case-insensitively, so they are stored lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
