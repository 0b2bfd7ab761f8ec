// API module - the single point of outbound communication
//
// Wraps reqwest with:
// - Bearer token injection (read from the SessionContext per request)
// - Typed operations for auth and project CRUD
// - Status/body classification into ApiError
//
// Nothing here retries. A failed call is reported once and the caller
// (store, form, scheduler) decides what happens next.

pub mod error;
#[cfg(test)]
pub mod fake;
pub mod models;

pub use error::ApiError;
pub use models::{AuthResponse, Credentials, Project, ProjectDraft, ProjectId, ProjectStatus};

use crate::session::SessionContext;
use async_trait::async_trait;
use error::{classify, Endpoint};
use models::{ErrorBody, ProjectEnvelope, ProjectList};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Project operations the store depends on
///
/// Implemented by [`ApiClient`] over HTTP, and by a scripted double in tests.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    /// All of the caller's projects, in server order
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError>;

    async fn get_project(&self, id: &ProjectId) -> Result<Project, ApiError>;

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ApiError>;

    async fn update_project(&self, id: &ProjectId, draft: &ProjectDraft)
        -> Result<Project, ApiError>;

    /// Not idempotent: deleting twice fails the second time with NotFound
    async fn delete_project(&self, id: &ProjectId) -> Result<(), ApiError>;
}

/// HTTP client for the remote project API
pub struct ApiClient {
    http: reqwest::Client,
    /// Base URL including the `/api` prefix
    base: Url,
    session: Arc<SessionContext>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: Arc<SessionContext>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("awakener/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base = Url::parse(base_url.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::validation(format!("invalid API url '{}'", base_url)))?;

        Ok(Self {
            http,
            base,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let req = self.request(Method::POST, &["auth", "login"]).json(credentials);
        self.send_json(req, Endpoint::Auth).await
    }

    pub async fn signup(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let req = self.request(Method::POST, &["auth", "signup"]).json(credentials);
        self.send_json(req, Endpoint::Auth).await
    }

    /// Base URL plus `segments`, each percent-encoded as a single segment
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in new(): the base can hold a path
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Build a request, attaching the current bearer token if there is one
    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let req = self.http.request(method, self.url(segments));
        match self.session.bearer() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Ids are opaque: `?`, `#` or `/` in one must not reach another resource
    fn item_path(id: &ProjectId) -> [&str; 2] {
        ["projects", id.as_str()]
    }

    async fn execute(&self, req: RequestBuilder, endpoint: Endpoint) -> Result<Response, ApiError> {
        let response = req.send().await.map_err(|e| {
            tracing::debug!("Request failed before a response: {}", e);
            ApiError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Failed requests carry {error: "..."}; anything else means no message
        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty());

        let err = classify(status, message, endpoint);
        tracing::debug!("Request failed with {}: {}", status, err);
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        endpoint: Endpoint,
    ) -> Result<T, ApiError> {
        let response = self.execute(req, endpoint).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_project<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<&B>,
        endpoint: Endpoint,
    ) -> Result<Project, ApiError> {
        let mut req = self.request(method, path);
        if let Some(body) = body {
            req = req.json(body);
        }
        let envelope: ProjectEnvelope = self.send_json(req, endpoint).await?;
        Ok(envelope.into_project())
    }
}

#[async_trait]
impl ProjectApi for ApiClient {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let req = self.request(Method::GET, &["projects", "list"]);
        let list: ProjectList = self.send_json(req, Endpoint::Collection).await?;
        Ok(list.projects)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Project, ApiError> {
        self.send_project::<()>(Method::GET, &Self::item_path(id), None, Endpoint::Item)
            .await
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ApiError> {
        self.send_project(
            Method::POST,
            &["projects", "create"],
            Some(draft),
            Endpoint::Collection,
        )
        .await
    }

    async fn update_project(
        &self,
        id: &ProjectId,
        draft: &ProjectDraft,
    ) -> Result<Project, ApiError> {
        self.send_project(Method::PUT, &Self::item_path(id), Some(draft), Endpoint::Item)
            .await
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, &Self::item_path(id));
        self.execute(req, Endpoint::Item).await?;
        Ok(())
    }
}
