// Project form controller - shared by the "add" and "edit" flows
//
// A submission is split in three steps so the UI can run the network call
// on a separate task without holding the form:
//
//   begin_submit()  validate, set `submitting`, hand out a Submission
//   execute()       the create/update call through the store
//   finish()        reset `submitting`, record the error or report success
//
// submit_create()/submit_edit() chain the three for headless callers.

use crate::api::{ApiError, Project, ProjectDraft, ProjectId};
use crate::store::ProjectStore;
use reqwest::Url;
use thiserror::Error;

const MISSING_FIELDS: &str = "missing fields";
const INVALID_URL: &str = "invalid url";

/// Why a form action was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// A submission is already in flight
    #[error("a submission is already in progress")]
    Busy,

    /// Edit form whose project never loaded
    #[error("project is not available for editing")]
    Unavailable,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Load state of the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    /// Edit form waiting for `load()`
    Loading,
    /// Usable
    Ready,
    /// The project couldn't be fetched; the form stays unusable
    Unavailable,
}

/// Where a submission goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTarget {
    Create,
    Edit(ProjectId),
}

impl SubmitTarget {
    fn fallback_error(&self) -> &'static str {
        match self {
            Self::Create => "Failed to create project",
            Self::Edit(_) => "Failed to update project",
        }
    }
}

/// A validated request, ready to send
#[derive(Debug, Clone)]
pub struct Submission {
    pub target: SubmitTarget,
    pub draft: ProjectDraft,
}

impl Submission {
    /// Send the create/update; the store upserts the server's record
    pub async fn execute(&self, store: &ProjectStore) -> Result<Project, ApiError> {
        match &self.target {
            SubmitTarget::Create => store.create(&self.draft).await,
            SubmitTarget::Edit(id) => store.update(id, &self.draft).await,
        }
    }
}

/// Form state for creating or editing a project
#[derive(Debug, Clone)]
pub struct ProjectForm {
    pub name: String,
    pub url: String,
    editing: Option<ProjectId>,
    phase: FormPhase,
    submitting: bool,
    error: Option<String>,
}

impl ProjectForm {
    /// Empty form for a new project
    pub fn create() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            editing: None,
            phase: FormPhase::Ready,
            submitting: false,
            error: None,
        }
    }

    /// Edit form; call `load()` before use
    pub fn edit(id: ProjectId) -> Self {
        Self {
            editing: Some(id),
            phase: FormPhase::Loading,
            ..Self::create()
        }
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn editing(&self) -> Option<&ProjectId> {
        self.editing.as_ref()
    }

    /// Submission target implied by how the form was opened
    pub fn target(&self) -> SubmitTarget {
        match &self.editing {
            Some(id) => SubmitTarget::Edit(id.clone()),
            None => SubmitTarget::Create,
        }
    }

    /// Check fields locally, before any network call
    pub fn validate(&self) -> Result<ProjectDraft, ApiError> {
        let name = self.name.trim();
        let url = self.url.trim();
        if name.is_empty() || url.is_empty() {
            return Err(ApiError::validation(MISSING_FIELDS));
        }

        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
            _ => return Err(ApiError::validation(INVALID_URL)),
        }

        Ok(ProjectDraft {
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    /// Populate an edit form from the server, once
    pub async fn load(&mut self, store: &ProjectStore) -> Result<(), FormError> {
        let Some(id) = self.editing.clone() else {
            return Ok(());
        };
        if self.phase != FormPhase::Loading {
            return Ok(());
        }
        let result = store.fetch(&id).await;
        self.apply_loaded(result)
    }

    /// Apply the result of fetching the project being edited
    pub fn apply_loaded(&mut self, result: Result<Project, ApiError>) -> Result<(), FormError> {
        match result {
            Ok(project) => {
                self.name = project.name;
                self.url = project.url;
                self.phase = FormPhase::Ready;
                self.error = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Failed to load project for editing: {}", err);
                self.error = Some(
                    err.server_message()
                        .unwrap_or("Failed to fetch project")
                        .to_string(),
                );
                self.phase = FormPhase::Unavailable;
                Err(err.into())
            }
        }
    }

    /// Validate and mark the form as submitting
    pub fn begin_submit(&mut self, target: SubmitTarget) -> Result<Submission, FormError> {
        if self.submitting {
            return Err(FormError::Busy);
        }
        if self.phase != FormPhase::Ready {
            return Err(FormError::Unavailable);
        }

        self.error = None;
        let draft = match self.validate() {
            Ok(draft) => draft,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(err.into());
            }
        };

        self.submitting = true;
        Ok(Submission { target, draft })
    }

    /// Record the outcome; `Some(project)` means navigate back to the dashboard
    pub fn finish(
        &mut self,
        target: &SubmitTarget,
        result: Result<Project, ApiError>,
    ) -> Option<Project> {
        self.submitting = false;
        match result {
            Ok(project) => Some(project),
            Err(err) => {
                tracing::warn!("Project submission failed: {}", err);
                self.error = Some(
                    err.server_message()
                        .unwrap_or(target.fallback_error())
                        .to_string(),
                );
                None
            }
        }
    }

    pub async fn submit_create(&mut self, store: &ProjectStore) -> Result<Project, FormError> {
        self.submit_to(store, SubmitTarget::Create).await
    }

    pub async fn submit_edit(
        &mut self,
        store: &ProjectStore,
        id: &ProjectId,
    ) -> Result<Project, FormError> {
        self.submit_to(store, SubmitTarget::Edit(id.clone())).await
    }

    async fn submit_to(
        &mut self,
        store: &ProjectStore,
        target: SubmitTarget,
    ) -> Result<Project, FormError> {
        let submission = self.begin_submit(target)?;
        match submission.execute(store).await {
            Ok(project) => {
                self.finish(&submission.target, Ok(project.clone()));
                Ok(project)
            }
            Err(err) => {
                self.finish(&submission.target, Err(err.clone()));
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::api::ProjectStatus;
    use std::sync::Arc;

    fn form(name: &str, url: &str) -> ProjectForm {
        let mut f = ProjectForm::create();
        f.name = name.into();
        f.url = url.into();
        f
    }

    #[test]
    fn test_validate_requires_both_fields() {
        assert_eq!(
            form("", "https://x").validate(),
            Err(ApiError::validation("missing fields"))
        );
        assert_eq!(
            form("x", "").validate(),
            Err(ApiError::validation("missing fields"))
        );
        assert_eq!(
            form("   ", "https://x").validate(),
            Err(ApiError::validation("missing fields"))
        );
        assert!(form("x", "https://x").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_urls() {
        for url in ["api.example.com", "ftp://files.example.com", "not a url"] {
            assert_eq!(
                form("x", url).validate(),
                Err(ApiError::validation("invalid url")),
                "{url}"
            );
        }
    }

    #[test]
    fn test_second_submission_is_rejected_while_submitting() {
        let mut f = form("API", "https://api.example.com");
        let first = f.begin_submit(SubmitTarget::Create).unwrap();
        assert!(f.is_submitting());
        assert_eq!(f.begin_submit(SubmitTarget::Create).unwrap_err(), FormError::Busy);

        f.finish(&first.target, Err(ApiError::Network("timeout".into())));
        assert!(!f.is_submitting());
        assert!(f.begin_submit(SubmitTarget::Create).is_ok());
    }

    #[test]
    fn test_validation_failure_sets_error_without_submitting() {
        let mut f = form("", "https://x");
        assert!(f.begin_submit(SubmitTarget::Create).is_err());
        assert_eq!(f.error(), Some("missing fields"));
        assert!(!f.is_submitting());
    }

    #[tokio::test]
    async fn test_create_success_lands_in_store() {
        let api = FakeApi::new();
        let store = ProjectStore::new(api.clone());
        let mut f = form("API", "https://api.example.com");

        let project = f.submit_create(&store).await.unwrap();
        assert_eq!(project.last_status, ProjectStatus::Unknown);
        assert_eq!(store.projects(), vec![project]);
        assert!(!f.is_submitting());
        assert!(f.error().is_none());
    }

    #[tokio::test]
    async fn test_failure_prefers_server_message() {
        let api = FakeApi::new();
        let store = ProjectStore::new(api.clone());
        let mut f = form("API", "https://api.example.com");

        api.fail_next_write(ApiError::Validation(Some("URL already monitored".into())));
        assert!(f.submit_create(&store).await.is_err());
        assert_eq!(f.error(), Some("URL already monitored"));

        api.fail_next_write(ApiError::Network("connection reset".into()));
        assert!(f.submit_create(&store).await.is_err());
        assert_eq!(f.error(), Some("Failed to create project"));
        assert!(!f.is_submitting());
        assert!(store.projects().is_empty());
    }

    #[tokio::test]
    async fn test_edit_flow() {
        let api = FakeApi::new();
        let store = ProjectStore::new(api.clone());
        let existing = api.seed("API", "https://api.example.com");
        store.refresh().await.unwrap();

        let mut f = ProjectForm::edit(existing.id.clone());
        assert_eq!(f.phase(), FormPhase::Loading);
        assert_eq!(f.begin_submit(f.target()).unwrap_err(), FormError::Unavailable);

        f.load(&store).await.unwrap();
        assert_eq!(f.phase(), FormPhase::Ready);
        assert_eq!(f.name, "API");
        assert_eq!(f.url, "https://api.example.com");

        f.name = "API (prod)".into();
        let updated = f.submit_edit(&store, &existing.id).await.unwrap();
        assert_eq!(updated.id, existing.id);
        assert_eq!(store.get(&existing.id).unwrap().name, "API (prod)");
    }

    #[tokio::test]
    async fn test_edit_failure_uses_update_fallback() {
        let api = FakeApi::new();
        let store = ProjectStore::new(api.clone());
        let existing = api.seed("API", "https://api.example.com");

        let mut f = ProjectForm::edit(existing.id.clone());
        f.load(&store).await.unwrap();
        api.fail_next_write(ApiError::Server {
            status: 500,
            message: None,
        });
        assert!(f.submit_edit(&store, &existing.id).await.is_err());
        assert_eq!(f.error(), Some("Failed to update project"));
    }

    #[tokio::test]
    async fn test_load_of_project_deleted_mid_fetch_is_not_found() {
        let api = FakeApi::new();
        let store = Arc::new(ProjectStore::new(api.clone()));
        let doomed = api.seed("API", "https://api.example.com");
        store.refresh().await.unwrap();

        // Edit screen starts fetching, the project is deleted meanwhile
        let gate = api.hold_gets();
        let loading = tokio::spawn({
            let store = store.clone();
            let id = doomed.id.clone();
            async move {
                let mut f = ProjectForm::edit(id);
                let result = f.load(&store).await;
                (f, result)
            }
        });
        api.wait_for_gets(1).await;
        store.remove(&doomed.id).await.unwrap();
        gate.add_permits(1);

        let (f, result) = loading.await.unwrap();
        assert!(matches!(result, Err(FormError::Api(ApiError::NotFound(_)))));
        assert_eq!(f.phase(), FormPhase::Unavailable);
        assert!(f.name.is_empty() && f.url.is_empty());
        assert!(f.error().is_some());
    }
}
