// TUI application state
//
// The render loop never awaits the network. Key handlers spawn the call on a
// task, and the result comes back as a UiMessage on the app's channel, where
// handle_message() applies it. Results for a form that has since been closed
// or replaced are recognized by their sequence number and dropped.

use super::clipboard;
use super::toast::Toast;
use crate::api::{ApiError, Project, ProjectStatus};
use crate::events::MonitorEvent;
use crate::form::{FormPhase, ProjectForm, SubmitTarget};
use crate::logging::LogBuffer;
use crate::scheduler::PollingScheduler;
use crate::store::{ProjectStore, RefreshOutcome, StoreSnapshot};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Results of background work, delivered to the event loop
#[derive(Debug)]
pub enum UiMessage {
    Refreshed(Result<RefreshOutcome, ApiError>),
    Deleted {
        name: String,
        result: Result<(), ApiError>,
    },
    FormLoaded {
        seq: u64,
        result: Result<Project, ApiError>,
    },
    Submitted {
        seq: u64,
        target: SubmitTarget,
        result: Result<Project, ApiError>,
    },
}

/// Field with keyboard focus on the form screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Url,
}

/// The add/edit screen
pub struct FormScreen {
    pub form: ProjectForm,
    pub focus: FormField,
    seq: u64,
}

impl FormScreen {
    pub fn title(&self) -> &'static str {
        match self.form.target() {
            SubmitTarget::Create => "Add project",
            SubmitTarget::Edit(_) => "Edit project",
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Name => &mut self.form.name,
            FormField::Url => &mut self.form.url,
        }
    }
}

/// Why the dashboard closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    LoggedOut,
    /// The server rejected the token
    SessionExpired(String),
}

/// Main application state for the TUI
pub struct App {
    store: Arc<ProjectStore>,
    scheduler: PollingScheduler,
    tx: mpsc::Sender<UiMessage>,

    /// Log buffer for the log strip
    pub log_buffer: LogBuffer,

    /// Display name of the logged-in user
    pub user_name: String,

    /// Store contents as of the last sync()
    pub snapshot: StoreSnapshot,

    /// Index of the selected row
    pub selected: usize,

    pub form: Option<FormScreen>,

    /// Project awaiting y/n delete confirmation
    pub confirm_delete: Option<Project>,

    pub toast: Option<Toast>,

    /// A manual refresh is in flight
    pub refreshing: bool,

    /// Set when the event loop should stop
    pub exit: Option<ExitReason>,

    next_seq: u64,
}

impl App {
    pub fn new(
        store: Arc<ProjectStore>,
        scheduler: PollingScheduler,
        user_name: String,
        log_buffer: LogBuffer,
    ) -> (Self, mpsc::Receiver<UiMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let app = Self {
            store,
            scheduler,
            tx,
            log_buffer,
            user_name,
            snapshot: StoreSnapshot::default(),
            selected: 0,
            form: None,
            confirm_delete: None,
            toast: None,
            refreshing: false,
            exit: None,
            next_seq: 0,
        };
        (app, rx)
    }

    /// Start background polling
    pub fn start(&mut self) {
        self.scheduler.activate();
    }

    /// Pull the latest store state; called once per frame
    pub fn sync(&mut self) {
        self.snapshot = self.store.snapshot();
        self.selected = self
            .selected
            .min(self.snapshot.projects.len().saturating_sub(1));
        if self.toast.as_ref().is_some_and(Toast::is_expired) {
            self.toast = None;
        }
    }

    pub fn selected_project(&self) -> Option<&Project> {
        self.snapshot.projects.get(self.selected)
    }

    /// (up, down, unknown)
    pub fn status_counts(&self) -> (usize, usize, usize) {
        self.snapshot
            .projects
            .iter()
            .fold((0, 0, 0), |(up, down, unknown), p| match p.last_status {
                ProjectStatus::Up => (up + 1, down, unknown),
                ProjectStatus::Down => (up, down + 1, unknown),
                ProjectStatus::Unknown => (up, down, unknown + 1),
            })
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast::new(message));
    }

    /// Run `work` on a task and deliver its result to the event loop
    fn spawn<F>(&self, work: F)
    where
        F: Future<Output = UiMessage> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(work.await).await;
        });
    }

    fn end_session(&mut self, reason: String) {
        tracing::warn!("Session ended: {}", reason);
        self.scheduler.end_session();
        self.exit = Some(ExitReason::SessionExpired(reason));
    }

    // ─── Input ───────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.exit = Some(ExitReason::Quit);
            return;
        }

        if self.form.is_some() {
            self.handle_form_key(key);
        } else if self.confirm_delete.is_some() {
            self.handle_confirm_key(key);
        } else {
            self.handle_dashboard_key(key);
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.exit = Some(ExitReason::Quit),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.snapshot.projects.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Char('r') => self.refresh_now(),
            KeyCode::Char('a') => self.open_create_form(),
            KeyCode::Char('e') => self.open_edit_form(),
            KeyCode::Char('d') => {
                self.confirm_delete = self.selected_project().cloned();
            }
            KeyCode::Char('y') => {
                if let Some(toast) = self.selected_project().map(clipboard::copy_url) {
                    self.toast = Some(toast);
                }
            }
            KeyCode::Char('L') => {
                tracing::info!("Logging out");
                self.scheduler.end_session();
                self.exit = Some(ExitReason::LoggedOut);
            }
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(project) = self.confirm_delete.take() {
                    let store = self.store.clone();
                    self.spawn(async move {
                        let result = store.remove(&project.id).await;
                        UiMessage::Deleted {
                            name: project.name,
                            result,
                        }
                    });
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm_delete = None;
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(screen) = self.form.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Esc => self.form = None,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                screen.focus = match screen.focus {
                    FormField::Name => FormField::Url,
                    FormField::Url => FormField::Name,
                };
            }
            KeyCode::Enter => {
                let target = screen.form.target();
                let seq = screen.seq;
                // Validation errors land on the form itself
                if let Ok(submission) = screen.form.begin_submit(target) {
                    let store = self.store.clone();
                    self.spawn(async move {
                        let result = submission.execute(&store).await;
                        UiMessage::Submitted {
                            seq,
                            target: submission.target,
                            result,
                        }
                    });
                }
            }
            KeyCode::Backspace if editable(&screen.form) => {
                screen.focused_mut().pop();
            }
            KeyCode::Char(c)
                if editable(&screen.form) && !key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                screen.focused_mut().push(c);
            }
            _ => {}
        }
    }

    fn refresh_now(&mut self) {
        if self.refreshing {
            return;
        }
        self.refreshing = true;
        let store = self.store.clone();
        self.spawn(async move { UiMessage::Refreshed(store.refresh().await) });
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn open_create_form(&mut self) {
        let seq = self.next_seq();
        self.form = Some(FormScreen {
            form: ProjectForm::create(),
            focus: FormField::Name,
            seq,
        });
    }

    fn open_edit_form(&mut self) {
        let Some(project) = self.selected_project().cloned() else {
            return;
        };
        let seq = self.next_seq();
        self.form = Some(FormScreen {
            form: ProjectForm::edit(project.id.clone()),
            focus: FormField::Name,
            seq,
        });

        // Always fetch the current version rather than trusting the cache
        let store = self.store.clone();
        self.spawn(async move {
            let result = store.fetch(&project.id).await;
            UiMessage::FormLoaded { seq, result }
        });
    }

    // ─── Background results ──────────────────────────────────────────────

    pub fn handle_message(&mut self, message: UiMessage) {
        match message {
            UiMessage::Refreshed(result) => {
                self.refreshing = false;
                match result {
                    Ok(RefreshOutcome::Applied(count)) => {
                        self.notify(format!("Refreshed {} project(s)", count))
                    }
                    Ok(RefreshOutcome::Discarded) => {}
                    Err(err) if err.is_auth() => self.end_session(err.to_string()),
                    // The store records the error for the alert line
                    Err(_) => {}
                }
            }

            UiMessage::Deleted { name, result } => match result {
                Ok(()) => self.notify(format!("Deleted {}", name)),
                Err(err) if err.is_auth() => self.end_session(err.to_string()),
                Err(err) => self.toast = Some(Toast::failure(format!("Delete failed: {}", err))),
            },

            UiMessage::FormLoaded { seq, result } => match result {
                Err(err) if err.is_auth() => self.end_session(err.to_string()),
                result => {
                    if let Some(screen) = self.form.as_mut().filter(|s| s.seq == seq) {
                        // The fetched record is newer than the cached row
                        if let Ok(project) = &result {
                            self.store.upsert(project.clone());
                        }
                        let _ = screen.form.apply_loaded(result);
                    }
                }
            },

            UiMessage::Submitted {
                seq,
                target,
                result,
            } => {
                if let Err(err) = &result {
                    if err.is_auth() {
                        self.end_session(err.to_string());
                        return;
                    }
                }
                let Some(screen) = self.form.as_mut().filter(|s| s.seq == seq) else {
                    // Form was closed; the store already has the outcome
                    return;
                };
                if let Some(project) = screen.form.finish(&target, result) {
                    let verb = match target {
                        SubmitTarget::Create => "Created",
                        SubmitTarget::Edit(_) => "Updated",
                    };
                    self.form = None;
                    self.notify(format!("{} {}", verb, project.name));
                    self.sync();
                    if let Some(idx) = self.snapshot.projects.iter().position(|p| p.id == project.id)
                    {
                        self.selected = idx;
                    }
                }
            }
        }
    }

    pub fn handle_monitor_event(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::SessionEnded { reason, .. } => {
                // The poller already cleared the store and the token
                self.exit = Some(ExitReason::SessionExpired(reason));
            }
            MonitorEvent::RefreshFailed { message, .. } => {
                tracing::warn!("Refresh failed: {}", message);
            }
            MonitorEvent::Refreshed { count, .. } => {
                tracing::debug!("Refreshed {} projects", count);
            }
        }
    }
}

fn editable(form: &ProjectForm) -> bool {
    form.phase() == FormPhase::Ready && !form.is_submitting()
}
