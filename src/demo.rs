// Demo mode: an in-memory stand-in for the remote project API
//
// Serves the same routes, status codes and `{error}` bodies as the hosted
// backend so the dashboard can be tried offline, and so the HTTP client can
// be tested against a real socket:
//
//   POST   /api/auth/signup        {name, email, password} -> {token, user}
//   POST   /api/auth/login         {email, password}       -> {token, user}
//   GET    /api/projects/list                              -> {projects}
//   POST   /api/projects/create    {name, url}             -> Project
//   GET    /api/projects/:id                               -> {project}
//   PUT    /api/projects/:id       {name, url}             -> Project
//   DELETE /api/projects/:id                               -> 204
//
// A background pinger marks projects UP with a made-up response time, or
// DOWN when the url contains "down".
//
// Run with: awakener demo

use crate::api::models::{AuthResponse, Credentials, ErrorBody, ProjectList, User};
use crate::api::{Project, ProjectDraft, ProjectId, ProjectStatus};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use reqwest::Url;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How often the demo pinger updates project status
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);

/// Account seeded by `awakener demo` so there is something to log into
pub const DEMO_EMAIL: &str = "demo@awakener.dev";
pub const DEMO_PASSWORD: &str = "demo";

// ─────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ─────────────────────────────────────────────────────────────────────────────

struct Account {
    name: String,
    password: String,
}

#[derive(Debug)]
struct OwnedProject {
    owner: String,
    project: Project,
}

#[derive(Default)]
struct Backend {
    /// Keyed by email
    accounts: HashMap<String, Account>,
    /// Token -> email
    tokens: HashMap<String, String>,
    /// Creation order, which is also list order
    projects: Vec<OwnedProject>,
    next_project_id: u64,
    next_token: u64,
    ping_round: u64,
}

impl Backend {
    fn issue_token(&mut self, email: &str) -> String {
        self.next_token += 1;
        let token = format!("demo-{}-{:x}", self.next_token, Utc::now().timestamp_micros());
        self.tokens.insert(token.clone(), email.to_string());
        token
    }

    fn auth_response(&mut self, email: &str) -> AuthResponse {
        let name = self
            .accounts
            .get(email)
            .map(|a| a.name.clone())
            .unwrap_or_default();
        AuthResponse {
            token: self.issue_token(email),
            user: User {
                name,
                email: Some(email.to_string()),
            },
        }
    }

    fn create_account(&mut self, name: &str, email: &str, password: &str) -> Result<(), Failure> {
        if self.accounts.contains_key(email) {
            return Err(Failure::new(StatusCode::CONFLICT, "User already exists"));
        }
        self.accounts.insert(
            email.to_string(),
            Account {
                name: name.to_string(),
                password: password.to_string(),
            },
        );
        Ok(())
    }

    fn insert_project(&mut self, owner: &str, draft: ProjectDraft) -> Project {
        self.next_project_id += 1;
        let project = Project {
            id: ProjectId::new(self.next_project_id.to_string()),
            name: draft.name,
            url: draft.url,
            last_status: ProjectStatus::Unknown,
            last_ping_at: None,
            last_response_time_ms: None,
        };
        self.projects.push(OwnedProject {
            owner: owner.to_string(),
            project: project.clone(),
        });
        project
    }

    /// 404 when missing, 403 when it belongs to someone else
    fn owned_mut(&mut self, owner: &str, id: &str) -> Result<&mut OwnedProject, Failure> {
        let entry = self
            .projects
            .iter_mut()
            .find(|p| p.project.id.as_str() == id)
            .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Project not found"))?;
        if entry.owner != owner {
            return Err(Failure::new(
                StatusCode::FORBIDDEN,
                "Not authorized to access this project",
            ));
        }
        Ok(entry)
    }

    fn ping_all(&mut self) {
        self.ping_round += 1;
        let round = self.ping_round;
        let now = Utc::now();
        for entry in &mut self.projects {
            let p = &mut entry.project;
            if p.url.contains("down") {
                p.last_status = ProjectStatus::Down;
                p.last_response_time_ms = None;
            } else {
                let seed = p.id.as_str().bytes().map(u64::from).sum::<u64>();
                p.last_status = ProjectStatus::Up;
                p.last_response_time_ms = Some(40 + (seed * 37 + round * 13) % 260);
            }
            p.last_ping_at = Some(now);
        }
    }
}

#[derive(Clone, Default)]
struct DemoState {
    backend: Arc<Mutex<Backend>>,
}

impl DemoState {
    fn lock(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the bearer token to an account email
    fn authorize(&self, headers: &HeaderMap) -> Result<String, Failure> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "No token provided"))?;

        self.lock()
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Invalid token"))
    }
}

/// Error response with a `{error}` body
#[derive(Debug)]
struct Failure {
    status: StatusCode,
    message: &'static str,
}

impl Failure {
    fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: Some(self.message.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

fn check_draft(draft: &ProjectDraft) -> Result<ProjectDraft, Failure> {
    let name = draft.name.trim();
    let url = draft.url.trim();
    if name.is_empty() || url.is_empty() {
        return Err(Failure::new(
            StatusCode::BAD_REQUEST,
            "Name and URL are required",
        ));
    }
    match Url::parse(url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(ProjectDraft {
            name: name.to_string(),
            url: url.to_string(),
        }),
        _ => Err(Failure::new(StatusCode::BAD_REQUEST, "Invalid URL")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn signup(
    State(state): State<DemoState>,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse, Failure> {
    let name = creds.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || creds.email.trim().is_empty() || creds.password.is_empty() {
        return Err(Failure::new(
            StatusCode::BAD_REQUEST,
            "Name, email and password are required",
        ));
    }

    let mut backend = state.lock();
    backend.create_account(name, creds.email.trim(), &creds.password)?;
    tracing::debug!("Demo signup: {}", creds.email.trim());
    Ok((
        StatusCode::CREATED,
        Json(backend.auth_response(creds.email.trim())),
    ))
}

async fn login(
    State(state): State<DemoState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<AuthResponse>, Failure> {
    let mut backend = state.lock();
    let email = creds.email.trim();
    match backend.accounts.get(email) {
        Some(account) if account.password == creds.password => {
            Ok(Json(backend.auth_response(email)))
        }
        _ => Err(Failure::new(StatusCode::UNAUTHORIZED, "Invalid credentials")),
    }
}

async fn list_projects(
    State(state): State<DemoState>,
    headers: HeaderMap,
) -> Result<Json<ProjectList>, Failure> {
    let owner = state.authorize(&headers)?;
    let projects = state
        .lock()
        .projects
        .iter()
        .filter(|p| p.owner == owner)
        .map(|p| p.project.clone())
        .collect();
    Ok(Json(ProjectList { projects }))
}

async fn create_project(
    State(state): State<DemoState>,
    headers: HeaderMap,
    Json(draft): Json<ProjectDraft>,
) -> Result<impl IntoResponse, Failure> {
    let owner = state.authorize(&headers)?;
    let draft = check_draft(&draft)?;
    let project = state.lock().insert_project(&owner, draft);
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<DemoState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Failure> {
    let owner = state.authorize(&headers)?;
    let mut backend = state.lock();
    let entry = backend.owned_mut(&owner, &id)?;
    Ok(Json(json!({ "project": entry.project })))
}

async fn update_project(
    State(state): State<DemoState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<ProjectDraft>,
) -> Result<Json<Project>, Failure> {
    let owner = state.authorize(&headers)?;
    let draft = check_draft(&draft)?;
    let mut backend = state.lock();
    let entry = backend.owned_mut(&owner, &id)?;
    entry.project.name = draft.name;
    entry.project.url = draft.url;
    Ok(Json(entry.project.clone()))
}

async fn delete_project(
    State(state): State<DemoState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    let owner = state.authorize(&headers)?;
    let mut backend = state.lock();
    backend.owned_mut(&owner, &id)?;
    backend.projects.retain(|p| p.project.id.as_str() != id);
    Ok(StatusCode::NO_CONTENT)
}

fn router(state: DemoState) -> Router {
    let api = Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/projects/list", get(list_projects))
        .route("/projects/create", post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        );

    Router::new().nest("/api", api).with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Server lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// A running demo backend
pub struct DemoServer {
    addr: SocketAddr,
    state: DemoState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<Result<()>>,
    pinger: JoinHandle<()>,
}

impl DemoServer {
    /// Bind and serve in the background (port 0 picks a free port)
    #[cfg(test)]
    pub async fn spawn(addr: SocketAddr) -> Result<Self> {
        Self::spawn_with(addr, DEFAULT_PING_INTERVAL).await
    }

    pub async fn spawn_with(addr: SocketAddr, ping_interval: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind demo backend to {}", addr))?;
        let addr = listener
            .local_addr()
            .context("Failed to read demo backend address")?;

        let state = DemoState::default();
        let app = router(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.await.ok();
                })
                .await
                .context("Demo backend error")
        });

        let pinger = tokio::spawn({
            let state = state.clone();
            async move {
                let start = tokio::time::Instant::now() + ping_interval;
                let mut ticker = tokio::time::interval_at(start, ping_interval);
                loop {
                    ticker.tick().await;
                    state.lock().ping_all();
                }
            }
        });

        tracing::info!("Demo backend listening on {}", addr);
        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            server,
            pinger,
        })
    }

    /// Base URL to point the client at (`.../api`)
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Create an account with a few projects, one of which reports DOWN
    pub fn seed_demo_account(&self) {
        let mut backend = self.state.lock();
        if backend
            .create_account("Demo", DEMO_EMAIL, DEMO_PASSWORD)
            .is_err()
        {
            return;
        }
        for (name, url) in [
            ("Portfolio", "https://portfolio.example.com"),
            ("Payments API", "https://api.example.com/health"),
            ("Legacy worker", "https://down.example.com"),
        ] {
            backend.insert_project(
                DEMO_EMAIL,
                ProjectDraft {
                    name: name.to_string(),
                    url: url.to_string(),
                },
            );
        }
    }

    /// Run one ping round now instead of waiting for the interval
    pub fn ping_now(&self) {
        self.state.lock().ping_all();
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) {
        self.pinger.abort();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match (&mut self.server).await {
            Ok(Ok(())) => tracing::info!("Demo backend shut down gracefully"),
            Ok(Err(e)) => tracing::error!("{:#}", e),
            Err(e) => tracing::error!("Demo backend task failed: {}", e),
        }
    }
}

/// `awakener demo`: serve until Ctrl+C
pub async fn run_demo(bind: SocketAddr, ping_interval: Duration) -> Result<()> {
    let server = DemoServer::spawn_with(bind, ping_interval).await?;
    server.seed_demo_account();
    // Seeded projects show a status before the first interval elapses
    server.ping_now();

    println!("Demo backend running at {}", server.api_url());
    println!("  Log in with {} / {}", DEMO_EMAIL, DEMO_PASSWORD);
    println!(
        "  Point the dashboard at it: AWAKENER_API_URL={} awakener",
        server.api_url()
    );
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    server.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, url: &str) -> ProjectDraft {
        ProjectDraft {
            name: name.into(),
            url: url.into(),
        }
    }

    #[test]
    fn test_pinger_marks_down_urls() {
        let mut backend = Backend::default();
        let up = backend.insert_project("a@x", draft("ok", "https://ok.dev"));
        let down = backend.insert_project("a@x", draft("bad", "https://down.dev"));
        backend.ping_all();

        let find = |id: &ProjectId| {
            backend
                .projects
                .iter()
                .find(|p| &p.project.id == id)
                .map(|p| p.project.clone())
                .unwrap()
        };
        let up = find(&up.id);
        let down = find(&down.id);
        assert_eq!(up.last_status, ProjectStatus::Up);
        assert!(up.last_response_time_ms.is_some());
        assert!(up.last_ping_at.is_some());
        assert_eq!(down.last_status, ProjectStatus::Down);
        assert_eq!(down.last_response_time_ms, None);
    }

    #[test]
    fn test_ids_increment_across_owners() {
        let mut backend = Backend::default();
        let a = backend.insert_project("a@x", draft("a", "https://a.dev"));
        let b = backend.insert_project("b@x", draft("b", "https://b.dev"));
        assert_eq!(a.id.as_str(), "1");
        assert_eq!(b.id.as_str(), "2");
    }

    #[test]
    fn test_owned_mut_distinguishes_missing_and_foreign() {
        let mut backend = Backend::default();
        let p = backend.insert_project("a@x", draft("a", "https://a.dev"));

        assert!(backend.owned_mut("a@x", p.id.as_str()).is_ok());
        let foreign = backend.owned_mut("b@x", p.id.as_str()).unwrap_err();
        assert_eq!(foreign.status, StatusCode::FORBIDDEN);
        let missing = backend.owned_mut("a@x", "99").unwrap_err();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_check_draft() {
        assert!(check_draft(&draft(" API ", "https://api.dev")).is_ok());
        assert_eq!(
            check_draft(&draft("", "https://api.dev")).unwrap_err().message,
            "Name and URL are required"
        );
        assert_eq!(
            check_draft(&draft("API", "api.dev")).unwrap_err().message,
            "Invalid URL"
        );
    }

    #[tokio::test]
    async fn test_seeded_account_can_log_in() {
        let server = DemoServer::spawn("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        server.seed_demo_account();
        server.ping_now();

        let client = reqwest::Client::new();
        let auth: AuthResponse = client
            .post(format!("{}/auth/login", server.api_url()))
            .json(&json!({ "email": DEMO_EMAIL, "password": DEMO_PASSWORD }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let list: ProjectList = client
            .get(format!("{}/projects/list", server.api_url()))
            .bearer_auth(&auth.token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list.projects.len(), 3);
        assert!(list
            .projects
            .iter()
            .any(|p| p.last_status == ProjectStatus::Down));

        server.shutdown().await;
    }
}
