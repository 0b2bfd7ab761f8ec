//! Scripted in-memory ProjectApi for store, scheduler and form tests
//!
//! Lists snapshot the server state when the request arrives and can be held
//! at a gate before responding, which is how tests line up overlapping
//! refreshes and deletes deterministically.

use super::{ApiError, Project, ProjectApi, ProjectDraft, ProjectId, ProjectStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Default)]
struct FakeState {
    projects: Vec<Project>,
    next_id: u64,
    list_failures: VecDeque<ApiError>,
    delete_failures: VecDeque<ApiError>,
    write_failures: VecDeque<ApiError>,
    list_delay: Option<Duration>,
    list_gate: Option<Arc<Semaphore>>,
    get_gate: Option<Arc<Semaphore>>,
    write_gate: Option<Arc<Semaphore>>,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    write_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a project directly on the "server"
    pub fn seed(&self, name: &str, url: &str) -> Project {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let project = Project {
            id: ProjectId::new(state.next_id.to_string()),
            name: name.to_string(),
            url: url.to_string(),
            last_status: ProjectStatus::Unknown,
            last_ping_at: None,
            last_response_time_ms: None,
        };
        state.projects.push(project.clone());
        project
    }

    /// Simulate a server-side ping result
    pub fn record_ping(&self, id: &ProjectId, status: ProjectStatus, response_ms: Option<u64>) {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.projects.iter_mut().find(|p| &p.id == id) {
            p.last_status = status;
            p.last_ping_at = Some(Utc::now());
            p.last_response_time_ms = response_ms;
        }
    }

    /// Put a project (back) on the server with its existing id
    pub fn put_on_server(&self, project: Project) {
        self.state.lock().unwrap().projects.push(project);
    }

    /// Delete behind the client's back
    pub fn remove_on_server(&self, id: &ProjectId) {
        self.state.lock().unwrap().projects.retain(|p| &p.id != id);
    }

    pub fn fail_next_list(&self, err: ApiError) {
        self.state.lock().unwrap().list_failures.push_back(err);
    }

    pub fn fail_next_delete(&self, err: ApiError) {
        self.state.lock().unwrap().delete_failures.push_back(err);
    }

    pub fn fail_next_write(&self, err: ApiError) {
        self.state.lock().unwrap().write_failures.push_back(err);
    }

    /// Make every list take this long (tokio time, so pausable)
    pub fn set_list_delay(&self, delay: Duration) {
        self.state.lock().unwrap().list_delay = Some(delay);
    }

    /// Hold list responses issued from now on until the returned gate gets a permit
    pub fn hold_lists(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().unwrap().list_gate = Some(gate.clone());
        gate
    }

    /// Hold get responses until the returned gate gets a permit
    pub fn hold_gets(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().unwrap().get_gate = Some(gate.clone());
        gate
    }

    /// Hold create and update responses until the returned gate gets a permit
    pub fn hold_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().unwrap().write_gate = Some(gate.clone());
        gate
    }

    /// Wait until `n` list requests in total have been answered by the
    /// server (their responses may still be held)
    pub async fn wait_for_lists(&self, n: usize) {
        while self.list_calls() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Same as [`FakeApi::wait_for_lists`] for get requests
    pub async fn wait_for_gets(&self, n: usize) {
        while self.get_calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    /// Same as [`FakeApi::wait_for_lists`] for creates and updates
    pub async fn wait_for_writes(&self, n: usize) {
        while self.write_calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_lists(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn server_projects(&self) -> Vec<Project> {
        self.state.lock().unwrap().projects.clone()
    }

    fn find(&self, id: &ProjectId) -> Result<Project, ApiError> {
        self.state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or(ApiError::NotFound(Some("Project not found".into())))
    }

    async fn pass_write_gate(&self) {
        let gate = self.state.lock().unwrap().write_gate.clone();
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl ProjectApi for FakeApi {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Server handles the request now; the response may be delayed below
        let (snapshot, delay, gate) = {
            let mut state = self.state.lock().unwrap();
            let snapshot = match state.list_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(state.projects.clone()),
            };
            (snapshot, state.list_delay, state.list_gate.clone())
        };
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        snapshot
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Project, ApiError> {
        let gate = self.state.lock().unwrap().get_gate.clone();
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.find(id)
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ApiError> {
        self.pass_write_gate().await;
        if let Some(err) = self.state.lock().unwrap().write_failures.pop_front() {
            return Err(err);
        }
        Ok(self.seed(&draft.name, &draft.url))
    }

    async fn update_project(
        &self,
        id: &ProjectId,
        draft: &ProjectDraft,
    ) -> Result<Project, ApiError> {
        self.pass_write_gate().await;
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.write_failures.pop_front() {
            return Err(err);
        }
        let project = state
            .projects
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or(ApiError::NotFound(Some("Project not found".into())))?;
        project.name = draft.name.clone();
        project.url = draft.url.clone();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.delete_failures.pop_front() {
            return Err(err);
        }
        let before = state.projects.len();
        state.projects.retain(|p| &p.id != id);
        if state.projects.len() == before {
            return Err(ApiError::NotFound(Some("Project not found".into())));
        }
        Ok(())
    }
}
