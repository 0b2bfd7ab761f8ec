// Headless command handlers
//
// Each command wires up the same services the dashboard uses and goes
// through the store or the form controller, so the CLI and the TUI apply
// the same validation and session-expiry rules.

use crate::api::{ApiClient, ApiError, Credentials, Project, ProjectId};
use crate::cli::prompt_password;
use crate::config::Config;
use crate::events::MonitorEvent;
use crate::form::{FormError, ProjectForm};
use crate::scheduler::PollingScheduler;
use crate::session::{Session, SessionContext, TokenStore};
use crate::store::ProjectStore;
use crate::util::{format_clock, format_last_ping, truncate_to_width};
use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

const LOGIN_HINT: &str = "Run `awakener login --email <email>` to log in.";

/// Everything a command needs, wired from config
pub struct Services {
    pub session: Arc<SessionContext>,
    pub client: Arc<ApiClient>,
    pub store: Arc<ProjectStore>,
}

impl Services {
    pub fn connect(config: &Config) -> Result<Self> {
        let session = Arc::new(
            SessionContext::restore(TokenStore::new(&config.session_file))
                .context("Failed to restore session")?,
        );
        let client = Arc::new(
            ApiClient::new(&config.api_url, config.request_timeout, session.clone())
                .context("Failed to create HTTP client")?,
        );
        let store = Arc::new(ProjectStore::new(client.clone()));
        Ok(Self {
            session,
            client,
            store,
        })
    }

    /// Fail early, without a request, when nobody is logged in
    pub fn require_session(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            bail!("Not logged in. {}", LOGIN_HINT)
        }
    }

    /// Turn an API failure into a command error; an auth failure also
    /// forgets the stored token
    fn fail(&self, err: ApiError) -> anyhow::Error {
        if err.is_auth() {
            if let Err(e) = self.session.teardown() {
                tracing::error!("Failed to clear session: {:#}", e);
            }
            self.store.clear();
            return anyhow!("Session expired ({}). {}", err, LOGIN_HINT);
        }
        anyhow!(err)
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) if !p.is_empty() => Ok(p),
        _ => prompt_password(),
    }
}

// ─── Account ─────────────────────────────────────────────────────────────

pub async fn login(services: &Services, email: String, password: Option<String>) -> Result<()> {
    let credentials = Credentials {
        email,
        password: password_or_prompt(password)?,
        name: None,
    };
    let auth = services
        .client
        .login(&credentials)
        .await
        .map_err(|e| anyhow!("Login failed: {}", e))?;

    services
        .session
        .init(Session {
            token: auth.token,
            user: auth.user.clone(),
        })
        .context("Failed to save session")?;
    println!("Logged in as {}", display_name(&auth.user.name, &credentials.email));
    Ok(())
}

pub async fn signup(
    services: &Services,
    name: String,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let credentials = Credentials {
        email,
        password: password_or_prompt(password)?,
        name: Some(name),
    };
    let auth = services
        .client
        .signup(&credentials)
        .await
        .map_err(|e| anyhow!("Signup failed: {}", e))?;

    services
        .session
        .init(Session {
            token: auth.token,
            user: auth.user.clone(),
        })
        .context("Failed to save session")?;
    println!(
        "Account created. Logged in as {}",
        display_name(&auth.user.name, &credentials.email)
    );
    Ok(())
}

fn display_name<'a>(name: &'a str, email: &'a str) -> &'a str {
    if name.is_empty() {
        email
    } else {
        name
    }
}

pub fn logout(services: &Services) -> Result<()> {
    if !services.session.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }
    services.store.clear();
    services
        .session
        .teardown()
        .context("Failed to remove session file")?;
    println!("Logged out.");
    Ok(())
}

// ─── Projects ────────────────────────────────────────────────────────────

pub async fn list(services: &Services) -> Result<()> {
    services.require_session()?;
    services
        .store
        .refresh()
        .await
        .map_err(|e| services.fail(e))?;

    let projects = services.store.projects();
    if projects.is_empty() {
        println!("No projects yet. Add one with `awakener add --name <name> --url <url>`.");
        return Ok(());
    }

    println!(
        "{:<8} {:<6} {:<24} {:<40} {:<19} RESPONSE",
        "STATUS", "ID", "NAME", "URL", "LAST PING"
    );
    for project in &projects {
        println!("{}", format_row(project));
    }
    Ok(())
}

fn format_row(p: &Project) -> String {
    let response = p
        .last_response_time_ms
        .map(|ms| format!("{} ms", ms))
        .unwrap_or_default();
    format!(
        "{:<8} {:<6} {:<24} {:<40} {:<19} {}",
        p.last_status.as_str(),
        truncate_to_width(p.id.as_str(), 6),
        truncate_to_width(&p.name, 24),
        truncate_to_width(&p.url, 40),
        format_last_ping(p.last_ping_at),
        response
    )
    .trim_end()
    .to_string()
}

fn form_failure(services: &Services, form: &ProjectForm, err: FormError) -> anyhow::Error {
    match err {
        FormError::Api(api) if api.is_auth() => services.fail(api),
        other => match form.error() {
            Some(message) => anyhow!("{}", message),
            None => anyhow!(other),
        },
    }
}

pub async fn add(services: &Services, name: String, url: String) -> Result<()> {
    services.require_session()?;
    let mut form = ProjectForm::create();
    form.name = name;
    form.url = url;

    let project = form
        .submit_create(&services.store)
        .await
        .map_err(|e| form_failure(services, &form, e))?;
    println!("Created project {} ({})", project.name, project.id);
    Ok(())
}

pub async fn edit(
    services: &Services,
    id: String,
    name: Option<String>,
    url: Option<String>,
) -> Result<()> {
    services.require_session()?;
    if name.is_none() && url.is_none() {
        bail!("Nothing to change: pass --name and/or --url");
    }

    let id = ProjectId::new(id);
    let mut form = ProjectForm::edit(id.clone());
    form.load(&services.store)
        .await
        .map_err(|e| form_failure(services, &form, e))?;

    if let Some(name) = name {
        form.name = name;
    }
    if let Some(url) = url {
        form.url = url;
    }

    let project = form
        .submit_edit(&services.store, &id)
        .await
        .map_err(|e| form_failure(services, &form, e))?;
    println!("Updated project {} ({})", project.name, project.id);
    Ok(())
}

/// Delete several projects concurrently; reports each and fails if any failed
pub async fn delete(services: &Services, ids: Vec<String>) -> Result<()> {
    services.require_session()?;

    let ids: Vec<ProjectId> = ids.into_iter().map(ProjectId::new).collect();
    let results =
        futures::future::join_all(ids.iter().map(|id| services.store.remove(id))).await;

    let mut failed = 0;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(()) => println!("Deleted project {}", id),
            Err(err) if err.is_auth() => return Err(services.fail(err)),
            Err(err) => {
                failed += 1;
                eprintln!("Failed to delete project {}: {}", id, err);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} deletions failed", failed, ids.len());
    }
    Ok(())
}

// ─── Watch ───────────────────────────────────────────────────────────────

/// Headless polling until Ctrl+C or session expiry
pub async fn watch(services: &Services, config: &Config) -> Result<()> {
    services.require_session()?;

    let (tx, mut rx) = mpsc::channel(16);
    let mut scheduler = PollingScheduler::new(
        services.store.clone(),
        services.session.clone(),
        config.poll_interval,
    )
    .with_events(tx);
    scheduler.activate();
    println!(
        "Watching {} every {}s (Ctrl+C to stop)",
        services.client.base_url(),
        scheduler.interval().as_secs()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                scheduler.deactivate();
                return Ok(());
            }
            Some(event) = rx.recv() => {
                let clock = format_clock(event.timestamp());
                match event {
                    MonitorEvent::Refreshed { .. } => {
                        println!("{}", summary_line(&clock, &services.store.projects()));
                    }
                    MonitorEvent::RefreshFailed { message, .. } => {
                        eprintln!("[{}] refresh failed: {}", clock, message);
                    }
                    MonitorEvent::SessionEnded { reason, .. } => {
                        bail!("Session expired ({}). {}", reason, LOGIN_HINT);
                    }
                }
            }
        }
    }
}

fn summary_line(clock: &str, projects: &[Project]) -> String {
    use crate::api::ProjectStatus;

    let count = |status| projects.iter().filter(|p| p.last_status == status).count();
    let mut line = format!(
        "[{}] {} up, {} down, {} unknown",
        clock,
        count(ProjectStatus::Up),
        count(ProjectStatus::Down),
        count(ProjectStatus::Unknown)
    );

    let down: Vec<&str> = projects
        .iter()
        .filter(|p| p.last_status == ProjectStatus::Down)
        .map(|p| p.name.as_str())
        .collect();
    if !down.is_empty() {
        line.push_str(&format!(" (DOWN: {})", down.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ProjectStatus;
    use crate::demo::DemoServer;

    fn project(name: &str, status: ProjectStatus, ms: Option<u64>) -> Project {
        Project {
            id: ProjectId::new("12"),
            name: name.to_string(),
            url: "https://api.example.com".to_string(),
            last_status: status,
            last_ping_at: None,
            last_response_time_ms: ms,
        }
    }

    #[test]
    fn test_row_shows_never_and_omits_missing_response_time() {
        let row = format_row(&project("API", ProjectStatus::Unknown, None));
        assert!(row.starts_with("UNKNOWN"));
        assert!(row.ends_with("Never"));

        let row = format_row(&project("API", ProjectStatus::Up, Some(87)));
        assert!(row.ends_with("87 ms"));
    }

    #[test]
    fn test_summary_names_down_projects() {
        let projects = vec![
            project("web", ProjectStatus::Up, Some(10)),
            project("worker", ProjectStatus::Down, None),
        ];
        assert_eq!(
            summary_line("12:00:00", &projects),
            "[12:00:00] 1 up, 1 down, 0 unknown (DOWN: worker)"
        );
    }

    fn config_for(server: &DemoServer, dir: &tempfile::TempDir) -> Config {
        Config {
            api_url: server.api_url(),
            session_file: dir.path().join("session.json"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_commands_against_demo_backend() {
        let server = DemoServer::spawn("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, &dir);
        let services = Services::connect(&config).unwrap();

        assert!(list(&services).await.is_err());

        signup(
            &services,
            "Ada".into(),
            "ada@example.com".into(),
            Some("pw".into()),
        )
        .await
        .unwrap();
        assert!(config.session_file.exists());

        // A fresh process picks the session up from disk
        let services = Services::connect(&config).unwrap();
        add(&services, "API".into(), "https://api.example.com".into())
            .await
            .unwrap();
        let id = services.store.projects()[0].id.to_string();

        let err = add(&services, "Bad".into(), "not a url".into())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid url");

        edit(&services, id.clone(), Some("API v2".into()), None)
            .await
            .unwrap();
        assert_eq!(services.store.projects()[0].name, "API v2");

        delete(&services, vec![id.clone()]).await.unwrap();
        let err = delete(&services, vec![id]).await.unwrap_err();
        assert!(err.to_string().contains("1 of 1"));

        logout(&services).unwrap();
        assert!(!config.session_file.exists());
        assert!(list(&services).await.is_err());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_token_clears_session() {
        let server = DemoServer::spawn("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, &dir);
        let services = Services::connect(&config).unwrap();
        services
            .session
            .init(Session {
                token: "forged".into(),
                user: Default::default(),
            })
            .unwrap();

        let err = list(&services).await.unwrap_err();
        assert!(err.to_string().contains("Session expired"));
        assert!(!services.session.is_authenticated());
        assert!(!config.session_file.exists());

        server.shutdown().await;
    }
}
