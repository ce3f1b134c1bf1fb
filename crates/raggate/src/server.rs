//! HTTP API server.
//!
//! Exposes the chat backend as a JSON HTTP API with Basic authentication.
//! Credentials are checked on every request; there is no session state,
//! so logout is a client-side operation and the endpoint exists only to
//! confirm it.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/health` | none | Health check (returns version) |
//! | `POST` | `/register` | none | Create an account |
//! | `GET`  | `/login` | basic | Verify credentials, return the role |
//! | `GET`  | `/logout` | basic | Confirm logout (stateless) |
//! | `POST` | `/chat` | basic | Ask a question |
//! | `POST` | `/ingest` | admin | Re-ingest the document corpus |
//! | `GET`  | `/users` | admin | List accounts (minus the requester) |
//! | `POST` | `/users` | admin | Create an account |
//! | `PUT`  | `/users/{username}` | admin | Update password and/or role |
//! | `DELETE` | `/users/{username}` | admin | Remove an account |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_credentials", "message": "invalid username or password" } }
//! ```
//!
//! Error codes: `bad_request` (400), `invalid_credentials` (401),
//! `forbidden` (403), `internal` (500). Authentication failures are
//! uniform: an unknown username and a wrong password produce the same
//! response.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use raggate_core::embedding::Embedder;
use raggate_core::generate::{system_prompt, Generator};
use raggate_core::index::VectorIndex;
use raggate_core::memory::ConversationMemory;
use raggate_core::models::ChatResponse;
use raggate_core::pipeline::{run_chat, ChatRequest};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::ingest::ingest_corpus;
use crate::migrate;
use crate::sqlite_index::SqliteIndex;
use crate::users::{authenticate, AuthUser, CredentialVerifier, PlaintextVerifier, UserStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    index: Arc<dyn VectorIndex>,
    users: Arc<UserStore>,
    verifier: Arc<dyn CredentialVerifier>,
    memory: Arc<ConversationMemory>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        index: Arc::new(SqliteIndex::new(pool.clone())),
        users: Arc::new(UserStore::new(pool)),
        verifier: Arc::new(PlaintextVerifier),
        memory: Arc::new(ConversationMemory::new(config.memory.max_turns)),
        embedder: create_embedder(&config.embedding)?,
        generator: create_generator(&config.generation)?,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    println!("raggate server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/register", post(handle_register))
        .route("/login", get(handle_login))
        .route("/logout", get(handle_logout))
        .route("/chat", post(handle_chat))
        .route("/ingest", post(handle_ingest))
        .route("/users", get(handle_list_users).post(handle_add_user))
        .route(
            "/users/{username}",
            put(handle_update_user).delete(handle_delete_user),
        )
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Basic"),
            );
        }
        response
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// 401 with a fixed message regardless of the failure reason, so the
/// response cannot be used to probe for accounts.
fn invalid_credentials() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "invalid_credentials".to_string(),
        message: "invalid username or password".to_string(),
    }
}

fn forbidden(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::FORBIDDEN,
        code: "forbidden".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ Authentication ============

/// Pull `username:password` out of an `Authorization: Basic` header.
fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

async fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let Some((username, password)) = parse_basic_auth(headers) else {
        return Err(invalid_credentials());
    };

    authenticate(&state.users, state.verifier.as_ref(), &username, &password)
        .await
        .map_err(internal)?
        .ok_or_else(invalid_credentials)
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let user = require_auth(state, headers).await?;
    if user.role != state.config.auth.admin_role {
        return Err(forbidden("admin role required"));
    }
    Ok(user)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /register ============

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
    role: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    // Self-registration must not mint privileged accounts. Admins are
    // created through POST /users or the CLI.
    if req.role == state.config.auth.admin_role {
        return Err(forbidden(format!(
            "role '{}' cannot be self-registered",
            req.role
        )));
    }

    state
        .users
        .add_user(&req.username, &req.password, &req.role)
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("user '{}' registered", req.username),
    }))
}

// ============ GET /login ============

#[derive(Serialize)]
struct LoginResponse {
    message: String,
    username: String,
    role: String,
}

async fn handle_login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, AppError> {
    let user = require_auth(&state, &headers).await?;
    Ok(Json(LoginResponse {
        message: "login successful".to_string(),
        username: user.username,
        role: user.role,
    }))
}

// ============ GET /logout ============

async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    require_auth(&state, &headers).await?;
    Ok(Json(MessageResponse {
        message: "logged out".to_string(),
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatBody {
    message: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, AppError> {
    let user = require_auth(&state, &headers).await?;

    let question = body.message.trim();
    if question.is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let prompt = system_prompt(&state.config.generation.org_name, &today);

    let req = ChatRequest {
        question,
        username: &user.username,
        role: &user.role,
        system_prompt: &prompt,
        top_k: state.config.retrieval.top_k,
    };

    let response = run_chat(
        &req,
        state.embedder.as_ref(),
        state.index.as_ref(),
        &state.memory,
        state.generator.as_ref(),
    )
    .await
    .map_err(internal)?;

    Ok(Json(response))
}

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    message: String,
    files_seen: usize,
    files_skipped: usize,
    chunks_embedded: usize,
    chunks_failed: usize,
}

async fn handle_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IngestResponse>, AppError> {
    require_admin(&state, &headers).await?;

    let report = ingest_corpus(&state.config, state.embedder.as_ref(), state.index.as_ref())
        .await
        .map_err(internal)?;

    Ok(Json(IngestResponse {
        message: report.message(),
        files_seen: report.files_seen,
        files_skipped: report.files_skipped,
        chunks_embedded: report.chunks_embedded,
        chunks_failed: report.chunks_failed,
    }))
}

// ============ User management ============

#[derive(Serialize)]
struct UserListResponse {
    users: Vec<crate::users::UserSummary>,
}

async fn handle_list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserListResponse>, AppError> {
    let requester = require_admin(&state, &headers).await?;

    let mut users = state.users.list_users().await.map_err(internal)?;
    users.retain(|u| u.username != requester.username);

    Ok(Json(UserListResponse { users }))
}

async fn handle_add_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    require_admin(&state, &headers).await?;

    state
        .users
        .add_user(&req.username, &req.password, &req.role)
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("user '{}' created", req.username),
    }))
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

async fn handle_update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    require_admin(&state, &headers).await?;

    if req.password.is_none() && req.role.is_none() {
        return Err(bad_request("nothing to update"));
    }

    state
        .users
        .update_user(&username, req.password.as_deref(), req.role.as_deref())
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("user '{}' updated", username),
    }))
}

async fn handle_delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let requester = require_admin(&state, &headers).await?;

    if requester.username == username {
        return Err(bad_request("cannot delete your own account"));
    }

    state
        .users
        .delete_user(&username)
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("user '{}' deleted", username),
    }))
}
