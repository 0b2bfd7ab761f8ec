// Project store - the local cache behind the monitoring view
//
// The store is the only thing allowed to mutate the project list. Everyone
// else reads cloned snapshots.
//
// Ordering between overlapping operations is handled with a logical clock:
//
//   refresh issued ──── ticket = tick()
//   delete confirmed ── tombstone[id] = tick()
//   refresh applied ─── drop ids whose tombstone > ticket
//
// So a list response that was produced before a delete was confirmed
// can never bring the deleted project back. The lock is only held while
// applying a result, never across a network call.

use crate::api::{ApiError, Project, ProjectApi, ProjectDraft, ProjectId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Read-only copy of the store for rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Projects in server order
    pub projects: Vec<Project>,
    /// Most recent failure, cleared by the next successful refresh
    pub last_error: Option<String>,
    /// Whether a refresh has ever succeeded for this session
    pub loaded: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// What happened to a refresh result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache replaced with this many projects
    Applied(usize),
    /// Result arrived after the session was cleared, the poller stopped,
    /// or a newer refresh had already been applied
    Discarded,
}

#[derive(Default)]
struct StoreState {
    projects: Vec<Project>,
    last_error: Option<String>,
    loaded: bool,
    last_refreshed_at: Option<DateTime<Utc>>,

    /// Logical clock shared by refresh tickets and delete confirmations
    clock: u64,
    /// Ticket of the newest refresh applied so far
    applied_ticket: u64,
    /// Confirmed deletes that an older in-flight refresh might still list
    tombstones: HashMap<ProjectId, u64>,
    /// Bumped by clear() so results from a previous session are dropped
    epoch: u64,
}

impl StoreState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn apply_refresh(&mut self, ticket: u64, fetched: Vec<Project>) -> usize {
        let mut projects: Vec<Project> = Vec::with_capacity(fetched.len());
        for project in fetched {
            if self
                .tombstones
                .get(&project.id)
                .is_some_and(|&deleted_at| deleted_at > ticket)
            {
                tracing::debug!("Refresh skipped {}: deleted after it was issued", project.id);
                continue;
            }
            // Duplicate ids collapse onto the first position, last copy wins
            match projects.iter_mut().find(|p| p.id == project.id) {
                Some(existing) => *existing = project,
                None => projects.push(project),
            }
        }

        // Every refresh still allowed to apply was issued after this one
        self.tombstones.retain(|_, &mut deleted_at| deleted_at > ticket);

        self.projects = projects;
        self.applied_ticket = ticket;
        self.loaded = true;
        self.last_error = None;
        self.last_refreshed_at = Some(Utc::now());
        self.projects.len()
    }

    fn upsert(&mut self, project: Project) {
        if self.tombstones.contains_key(&project.id) {
            tracing::debug!("Ignoring upsert of deleted project {}", project.id);
            return;
        }
        match self.projects.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project,
            None => self.projects.push(project),
        }
    }
}

/// In-memory cache of the user's projects, synchronized with the server
pub struct ProjectStore {
    api: Arc<dyn ProjectApi>,
    state: Mutex<StoreState>,
}

impl ProjectStore {
    pub fn new(api: Arc<dyn ProjectApi>) -> Self {
        Self {
            api,
            state: Mutex::new(StoreState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the cache with the server's current list
    ///
    /// On failure the cache is left untouched and the error is recorded
    /// for display as well as returned.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ApiError> {
        self.refresh_inner(None).await
    }

    /// Refresh that is discarded if `live` has been cleared by the time
    /// the response arrives (used by the poller)
    pub async fn refresh_while(&self, live: &AtomicBool) -> Result<RefreshOutcome, ApiError> {
        self.refresh_inner(Some(live)).await
    }

    async fn refresh_inner(&self, live: Option<&AtomicBool>) -> Result<RefreshOutcome, ApiError> {
        let (ticket, epoch) = {
            let mut state = self.lock();
            (state.tick(), state.epoch)
        };

        let result = self.api.list_projects().await;

        let mut state = self.lock();
        let stale_session = state.epoch != epoch;
        let stopped = live.is_some_and(|l| !l.load(Ordering::SeqCst));
        if stale_session || stopped {
            tracing::debug!("Discarding refresh result (session cleared or poller stopped)");
            return Ok(RefreshOutcome::Discarded);
        }

        match result {
            Ok(_) if ticket < state.applied_ticket => {
                tracing::debug!("Discarding refresh superseded by a newer one");
                Ok(RefreshOutcome::Discarded)
            }
            Ok(projects) => {
                let count = state.apply_refresh(ticket, projects);
                tracing::debug!("Refreshed {} project(s)", count);
                Ok(RefreshOutcome::Applied(count))
            }
            Err(err) => {
                tracing::warn!("Failed to refresh projects: {}", err);
                // A newer refresh already succeeded; the cache is current
                if ticket > state.applied_ticket {
                    state.last_error = Some(format!("Failed to fetch projects: {}", err));
                }
                Err(err)
            }
        }
    }

    /// Delete a project on the server, then drop it from the cache
    ///
    /// The cache only changes after the server confirms. A NotFound means
    /// our view is out of date, so the store also refreshes to reconcile.
    pub async fn remove(&self, id: &ProjectId) -> Result<(), ApiError> {
        let epoch = self.lock().epoch;
        match self.api.delete_project(id).await {
            Ok(()) => {
                let mut state = self.lock();
                if state.epoch == epoch {
                    let confirmed_at = state.tick();
                    state.tombstones.insert(id.clone(), confirmed_at);
                    state.projects.retain(|p| &p.id != id);
                    state.last_error = None;
                }
                tracing::info!("Deleted project {}", id);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Failed to delete project {}: {}", id, err);
                let err = self.reconcile(err).await;
                // Recorded after the reconcile so a successful refresh can't clear it
                let mut state = self.lock();
                if state.epoch == epoch {
                    state.last_error = Some(format!("Failed to delete project: {}", err));
                }
                Err(err)
            }
        }
    }

    /// After a NotFound, refresh so the cache matches the server again
    ///
    /// An auth failure during that refresh is returned in place of the
    /// original error so the caller ends the session.
    async fn reconcile(&self, err: ApiError) -> ApiError {
        if !err.is_not_found() {
            return err;
        }
        match self.refresh().await {
            Err(refresh_err) if refresh_err.is_auth() => refresh_err,
            _ => err,
        }
    }

    /// Insert or replace the cached copy with the server's canonical record
    pub fn upsert(&self, project: Project) {
        self.lock().upsert(project);
    }

    /// Upsert unless the session was cleared since `epoch` was read
    fn upsert_in(&self, epoch: u64, project: Project) {
        let mut state = self.lock();
        if state.epoch == epoch {
            state.upsert(project);
        } else {
            tracing::debug!("Discarding {} from a previous session", project.id);
        }
    }

    /// Create on the server and cache the returned record
    pub async fn create(&self, draft: &ProjectDraft) -> Result<Project, ApiError> {
        let epoch = self.lock().epoch;
        let project = self.api.create_project(draft).await?;
        tracing::info!("Created project {} ({})", project.name, project.id);
        self.upsert_in(epoch, project.clone());
        Ok(project)
    }

    /// Update on the server and cache the returned record
    pub async fn update(&self, id: &ProjectId, draft: &ProjectDraft) -> Result<Project, ApiError> {
        let epoch = self.lock().epoch;
        match self.api.update_project(id, draft).await {
            Ok(project) => {
                tracing::info!("Updated project {}", project.id);
                self.upsert_in(epoch, project.clone());
                Ok(project)
            }
            Err(err) => Err(self.reconcile(err).await),
        }
    }

    /// Fetch one project from the server without touching the cache
    pub async fn fetch(&self, id: &ProjectId) -> Result<Project, ApiError> {
        match self.api.get_project(id).await {
            Ok(project) => Ok(project),
            Err(err) => Err(self.reconcile(err).await),
        }
    }

    /// Drop everything (logout / expired session)
    ///
    /// Results of requests still in flight are discarded when they land.
    pub fn clear(&self) {
        let mut state = self.lock();
        let epoch = state.epoch + 1;
        *state = StoreState {
            epoch,
            ..StoreState::default()
        };
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            projects: state.projects.clone(),
            last_error: state.last_error.clone(),
            loaded: state.loaded,
            last_refreshed_at: state.last_refreshed_at,
        }
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        self.lock().projects.iter().find(|p| &p.id == id).cloned()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }
}
