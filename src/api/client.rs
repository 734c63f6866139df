//! Purpose: HTTP client for the quillpress backend API.
//! Exports: `BlogApi`, `ApiClient`.
//! Role: Pure transport adapter; one method per backend endpoint, no caching
//! or business logic.
//! Invariants: Every request attaches `Authorization: Bearer <token>` when a
//! session is currently persisted, and proceeds without it otherwise.
//! Invariants: Backend error messages are surfaced verbatim; transport
//! failures map to `Io` with no message so callers supply their fallback.

use crate::core::error::{Error, ErrorKind};
use crate::core::model::{Post, PostDraft, PostPatch, Profile, UserInfo};
use crate::core::session::SessionFile;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

pub type ApiResult<T> = Result<T, Error>;

/// Seam between the stores and the transport. `ApiClient` is the real
/// implementation; tests drive the stores with an in-memory backend.
pub trait BlogApi {
    fn login(&self, email: &str, password: &str) -> ApiResult<UserInfo>;
    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        is_admin: bool,
    ) -> ApiResult<UserInfo>;
    fn profile(&self) -> ApiResult<Profile>;
    fn list_posts(&self) -> ApiResult<Vec<Post>>;
    fn get_post(&self, id: &str) -> ApiResult<Post>;
    fn create_post(&self, draft: &PostDraft) -> ApiResult<Post>;
    fn update_post(&self, id: &str, patch: &PostPatch) -> ApiResult<Post>;
    fn delete_post(&self, id: &str) -> ApiResult<String>;
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: Url,
    agent: ureq::Agent,
    session: Option<SessionFile>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
    is_admin: bool,
}

#[derive(Deserialize)]
struct MessageEnvelope {
    message: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            inner: Arc::new(ApiClientInner {
                base_url,
                agent: ureq::AgentBuilder::new().build(),
                session: None,
            }),
        })
    }

    /// Read the bearer token from this session file on every request, so a
    /// login or logout elsewhere in the process is picked up immediately.
    pub fn with_session_file(self, session: SessionFile) -> Self {
        self.map_inner(|inner| ApiClientInner {
            session: Some(session),
            ..inner
        })
    }

    fn map_inner(mut self, replace: impl FnOnce(ApiClientInner) -> ApiClientInner) -> Self {
        let inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => ApiClientInner {
                base_url: shared.base_url.clone(),
                agent: shared.agent.clone(),
                session: shared.session.clone(),
            },
        };
        self.inner = Arc::new(replace(inner));
        self
    }

    fn bearer_token(&self) -> Option<String> {
        self.inner
            .session
            .as_ref()
            .and_then(|session| session.load())
            .map(|user| user.token)
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let mut request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        if let Some(token) = self.bearer_token() {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn get_json<R: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<R> {
        let url = build_url(&self.inner.base_url, segments)?;
        finish(self.request("GET", &url).call())
    }

    fn send_json<T: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        segments: &[&str],
        body: &T,
    ) -> ApiResult<R> {
        let url = build_url(&self.inner.base_url, segments)?;
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        finish(
            self.request(method, &url)
                .set("Content-Type", "application/json")
                .send_string(&payload),
        )
    }
}

impl BlogApi for ApiClient {
    fn login(&self, email: &str, password: &str) -> ApiResult<UserInfo> {
        self.send_json("POST", &["auth", "login"], &LoginRequest { email, password })
    }

    fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        is_admin: bool,
    ) -> ApiResult<UserInfo> {
        self.send_json(
            "POST",
            &["auth", "register"],
            &RegisterRequest {
                username,
                email,
                password,
                is_admin,
            },
        )
    }

    fn profile(&self) -> ApiResult<Profile> {
        self.get_json(&["auth", "profile"])
    }

    fn list_posts(&self) -> ApiResult<Vec<Post>> {
        self.get_json(&["blog"])
    }

    fn get_post(&self, id: &str) -> ApiResult<Post> {
        self.get_json(&["blog", id])
    }

    fn create_post(&self, draft: &PostDraft) -> ApiResult<Post> {
        self.send_json("POST", &["blog"], draft)
    }

    fn update_post(&self, id: &str, patch: &PostPatch) -> ApiResult<Post> {
        self.send_json("PUT", &["blog", id], patch)
    }

    fn delete_post(&self, id: &str) -> ApiResult<String> {
        let url = build_url(&self.inner.base_url, &["blog", id])?;
        let envelope: MessageEnvelope = finish(self.request("DELETE", &url).call())?;
        Ok(envelope.message)
    }
}

fn finish<R: DeserializeOwned>(response: Result<ureq::Response, ureq::Error>) -> ApiResult<R> {
    match response {
        Ok(resp) => read_json_response(resp),
        Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
        Err(ureq::Error::Transport(err)) => {
            Err(Error::new(ErrorKind::Io).with_source(err))
        }
    }
}

fn read_json_response<R: DeserializeOwned>(response: ureq::Response) -> ApiResult<R> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    error_from_body(status, &body)
}

fn error_from_body(status: u16, body: &str) -> Error {
    let kind = error_kind_from_status(status);
    if let Ok(envelope) = serde_json::from_str::<MessageEnvelope>(body) {
        return Error::new(kind).with_message(envelope.message);
    }
    Error::new(kind).with_message(format!("server error status {status}"))
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 422 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid server base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("server base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("server base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("server base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}
