// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{auth, documents, health, users},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Multipart framing and the text fields ride on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, documents, users, uploads, health).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, AI client).
pub fn create_router(state: AppState) -> Router {
    let mut origins = vec![
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];
    if let Some(origin) = state
        .config
        .cors_origin
        .as_deref()
        .and_then(|o| o.parse::<HeaderValue>().ok())
    {
        origins.push(origin);
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let require_auth = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/test", get(auth::connection_test))
        // Protected account routes
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .route("/profile", put(auth::update_account))
                .route("/change-password", put(auth::change_password))
                .route("/generate-api-key", post(auth::create_api_key))
                .layer(require_auth()),
        );

    let document_routes = Router::new()
        .route(
            "/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(
                state.config.max_upload_bytes + MULTIPART_OVERHEAD,
            )),
        )
        .route("/", get(documents::list_documents))
        .route(
            "/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/{id}/reprocess", post(documents::reprocess_document))
        // Auth first, then Admin check
        .merge(
            Router::new()
                .route("/{id}/verify", post(documents::verify_document))
                .layer(middleware::from_fn(admin_middleware)),
        )
        .layer(require_auth());

    let user_routes = Router::new()
        .route(
            "/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/activity-logs", get(users::activity_logs))
        .merge(
            Router::new()
                .route("/", get(users::list_users))
                .route("/{id}/toggle-status", patch(users::toggle_user_status))
                .layer(middleware::from_fn(admin_middleware)),
        )
        .layer(require_auth());

    let upload_files = Router::new()
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(require_auth());

    Router::new()
        .route("/health", get(health::health))
        .route("/api/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/documents", document_routes)
        .nest("/api/users", user_routes)
        .merge(upload_files)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
