//! Purpose: HTTP/JSON backend for the quillpress platform.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based API server; stateless handlers delegating to the
//! document repository.
//! Invariants: Error bodies are `{ "message": … }` with statuses per the API
//! contract; backend messages are what clients surface verbatim.
//! Invariants: Loopback-only unless explicitly allowed.

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Path as AxumPath, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use quillpress::api::{Author, Error, ErrorKind, Post, PostDraft, PostPatch, Profile, UserInfo};
use quillpress::core::auth::{hash_password, mint_token, verify_token};
use quillpress::core::repo::{NewUser, PostRecord, Repo, UserRecord};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub secret: String,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

struct AppState {
    repo: Repo,
    secret: String,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let state = Arc::new(AppState {
        repo: Repo::open(config.data_dir)?,
        secret: config.secret,
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(profile))
        .route("/blog", get(list_posts).post(create_post))
        .route(
            "/blog/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.secret.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("token secret must not be empty")
            .with_hint("Pass --secret or set QUILLPRESS_SECRET."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

/// Resolve the bearer token to a user record. Missing, invalid and expired
/// tokens, as well as tokens for deleted users, are all 401s.
fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<UserRecord, Error> {
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(Error::new(ErrorKind::Permission).with_message("Not authorized, no token"));
    };
    let value = value.to_str().unwrap_or_default();
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(Error::new(ErrorKind::Permission).with_message("Not authorized, no token"));
    };
    let user_id = verify_token(token, &state.secret)?;
    state
        .repo
        .find_user_by_id(&user_id)?
        .ok_or_else(|| {
            Error::new(ErrorKind::Permission).with_message("Not authorized, user not found")
        })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterPayload {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    #[serde(default)]
    is_admin: bool,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostPayload {
    title: Option<String>,
    content: Option<String>,
    image_url: Option<String>,
    tags: Option<Vec<String>>,
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPayload>,
) -> Response {
    let (username, email, password) = match (
        non_empty(payload.username),
        non_empty(payload.email),
        non_empty(payload.password),
    ) {
        (Some(username), Some(email), Some(password)) => (username, email, password),
        _ => {
            return error_response(
                Error::new(ErrorKind::Usage).with_message("Invalid user data"),
            );
        }
    };

    let result = state.repo.create_user(NewUser {
        username,
        email,
        password,
        is_admin: payload.is_admin,
    });
    match result {
        Ok(user) => match session_json(&user, &state.secret) {
            Ok(body) => json_response_with_status(StatusCode::CREATED, body),
            Err(err) => error_response(err),
        },
        Err(err) => error_response(err),
    }
}

async fn login(State(state): State<Arc<AppState>>, Json(payload): Json<LoginPayload>) -> Response {
    let (Some(email), Some(password)) = (non_empty(payload.email), non_empty(payload.password))
    else {
        return error_response(invalid_credentials());
    };

    let user = match state.repo.find_user_by_email(&email) {
        Ok(Some(user)) => user,
        Ok(None) => return error_response(invalid_credentials()),
        Err(err) => return error_response(err),
    };
    if hash_password(&password, &user.salt) != user.password_hash {
        return error_response(invalid_credentials());
    }
    match session_json(&user, &state.secret) {
        Ok(body) => json_response(body),
        Err(err) => error_response(err),
    }
}

async fn profile(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let user = match authenticate(&headers, &state) {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    let profile = Profile {
        id: user.id,
        username: user.username,
        email: user.email,
        is_admin: user.is_admin,
    };
    match serde_json::to_value(&profile) {
        Ok(body) => json_response(body),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode profile")
                .with_source(err),
        ),
    }
}

async fn list_posts(State(state): State<Arc<AppState>>) -> Response {
    let records = match state.repo.list_posts() {
        Ok(records) => records,
        Err(err) => return error_response(err),
    };
    let mut posts = Vec::with_capacity(records.len());
    for record in records {
        match join_author(&state.repo, record) {
            Ok(post) => posts.push(post),
            Err(err) => return error_response(err),
        }
    }
    match serde_json::to_value(&posts) {
        Ok(body) => json_response(body),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode posts")
                .with_source(err),
        ),
    }
}

async fn get_post(State(state): State<Arc<AppState>>, AxumPath(id): AxumPath<String>) -> Response {
    let result = state
        .repo
        .get_post(&id)
        .and_then(|record| join_author(&state.repo, record));
    match result {
        Ok(post) => post_response(StatusCode::OK, &post),
        Err(err) => error_response(err),
    }
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreatePostPayload>,
) -> Response {
    let user = match authenticate(&headers, &state) {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    if !user.is_admin {
        return error_response_with_status(
            Error::new(ErrorKind::Permission).with_message("Not authorized as an admin"),
            StatusCode::FORBIDDEN,
        );
    }
    let (Some(title), Some(content)) = (non_empty(payload.title), non_empty(payload.content))
    else {
        return error_response(
            Error::new(ErrorKind::Usage).with_message("Title and content are required"),
        );
    };

    let draft = PostDraft {
        title,
        content,
        image_url: payload.image_url,
        tags: payload.tags.unwrap_or_default(),
    };
    let result = state
        .repo
        .create_post(&user.id, draft)
        .and_then(|record| join_author(&state.repo, record));
    match result {
        Ok(post) => post_response(StatusCode::CREATED, &post),
        Err(err) => error_response(err),
    }
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<PostPatch>,
) -> Response {
    let user = match authenticate(&headers, &state) {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    let existing = match state.repo.get_post(&id) {
        Ok(record) => record,
        Err(err) => return error_response(err),
    };
    if existing.author_id != user.id && !user.is_admin {
        return error_response_with_status(
            Error::new(ErrorKind::Permission).with_message("Not authorized to update this post"),
            StatusCode::FORBIDDEN,
        );
    }

    let result = state
        .repo
        .update_post(&id, patch)
        .and_then(|record| join_author(&state.repo, record));
    match result {
        Ok(post) => post_response(StatusCode::OK, &post),
        Err(err) => error_response(err),
    }
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let user = match authenticate(&headers, &state) {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    let existing = match state.repo.get_post(&id) {
        Ok(record) => record,
        Err(err) => return error_response(err),
    };
    if existing.author_id != user.id && !user.is_admin {
        return error_response_with_status(
            Error::new(ErrorKind::Permission).with_message("Not authorized to delete this post"),
            StatusCode::FORBIDDEN,
        );
    }

    match state.repo.delete_post(&id) {
        Ok(()) => json_response(json!({ "message": "Blog post removed" })),
        Err(err) => error_response(err),
    }
}

fn invalid_credentials() -> Error {
    Error::new(ErrorKind::Permission).with_message("Invalid email or password")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn session_json(user: &UserRecord, secret: &str) -> Result<serde_json::Value, Error> {
    let token = mint_token(&user.id, secret)?;
    let info = UserInfo {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
        token,
    };
    serde_json::to_value(&info).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode session")
            .with_source(err)
    })
}

/// Expand a stored post into the wire shape with the author embedded. A
/// record whose author row has vanished still renders, with a placeholder.
fn join_author(repo: &Repo, record: PostRecord) -> Result<Post, Error> {
    let author = match repo.find_user_by_id(&record.author_id)? {
        Some(user) => Author {
            id: user.id,
            username: user.username,
            email: user.email,
        },
        None => Author {
            id: record.author_id.clone(),
            username: "unknown".to_string(),
            email: String::new(),
        },
    };
    Ok(Post {
        id: record.id,
        title: record.title,
        content: record.content,
        image_url: record.image_url,
        author,
        published_at: record.published_at,
        tags: record.tags,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

fn post_response(status: StatusCode, post: &Post) -> Response {
    match serde_json::to_value(post) {
        Ok(body) => json_response_with_status(status, body),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode post")
                .with_source(err),
        ),
    }
}

fn json_response(payload: serde_json::Value) -> Response {
    json_response_with_status(StatusCode::OK, payload)
}

fn json_response_with_status(status: StatusCode, payload: serde_json::Value) -> Response {
    let mut response = (status, Json(payload)).into_response();
    response
        .headers_mut()
        .insert("quillpress-version", HeaderValue::from_static("0"));
    response
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        // Duplicate registration is a validation failure on this surface.
        ErrorKind::Usage | ErrorKind::AlreadyExists => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Corrupt | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response_with_status(err, status)
}

fn error_response_with_status(err: Error, status: StatusCode) -> Response {
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    let body = json!({ "message": err.display_message("error") });
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("quillpress-version", HeaderValue::from_static("0"));
    response
}
