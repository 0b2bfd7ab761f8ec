// Session module - the authenticated user and their bearer token
//
// The session has an explicit lifecycle:
// - init: after a successful login/signup, or when a saved token is restored
// - teardown: on logout, or when the server rejects the token
//
// The token is persisted in a small JSON file so the dashboard survives
// restarts. The API client reads the token from here on every request.

use crate::api::models::User;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stored under the fixed key `token`
    pub token: String,
    pub user: User,
}

/// Durable storage for the session token
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved session, if any
    ///
    /// A corrupt file is treated as "logged out" rather than an error,
    /// the user just logs in again and the file is overwritten.
    pub fn load(&self) -> Result<Option<Session>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read session file {:?}", self.path))
            }
        };

        match serde_json::from_str::<Session>(&contents) {
            Ok(session) if !session.token.is_empty() => Ok(Some(session)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }

        let json = serde_json::to_string_pretty(session).context("Failed to serialize session")?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Bearer tokens are credentials: owner-only on Unix from the first byte
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open session file {:?}", self.path))?;

        // mode() only applies on create; narrow a file left by an older version
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .context("Failed to restrict session file permissions")?;
        }

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write session file {:?}", self.path))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

/// Process-wide session state shared with the API client
#[derive(Debug)]
pub struct SessionContext {
    current: RwLock<Option<Session>>,
    store: TokenStore,
}

impl SessionContext {
    /// Create an empty (logged out) context
    pub fn new(store: TokenStore) -> Self {
        Self {
            current: RwLock::new(None),
            store,
        }
    }

    /// Create a context from whatever session was saved last time
    pub fn restore(store: TokenStore) -> Result<Self> {
        let saved = store.load()?;
        if let Some(session) = &saved {
            tracing::debug!("Restored session for {}", session.user.name);
        }
        Ok(Self {
            current: RwLock::new(saved),
            store,
        })
    }

    /// Start a session and persist its token
    pub fn init(&self, session: Session) -> Result<()> {
        self.store.save(&session)?;
        tracing::info!("Session started for {}", session.user.name);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    /// End the session and forget the token
    ///
    /// The in-memory session is dropped even if removing the file fails,
    /// so no further request carries the token.
    pub fn teardown(&self) -> Result<()> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = previous {
            tracing::info!("Session ended for {}", session.user.name);
        }
        self.store.clear()
    }

    /// Token to attach as `Authorization: Bearer <token>`
    pub fn bearer(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(token: &str) -> Session {
        Session {
            token: token.to_string(),
            user: User {
                name: "Ada".to_string(),
                email: Some("ada@example.com".to_string()),
            },
        }
    }

    #[test]
    fn test_token_is_stored_under_fixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("session.json"));
        store.save(&session("abc")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["token"], "abc");
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fresh = TokenStore::new(dir.path().join("session.json"));
        fresh.save(&session("abc")).unwrap();
        let mode = std::fs::metadata(fresh.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // A world-readable file from before is narrowed and fully overwritten
        let old_path = dir.path().join("old.json");
        std::fs::write(&old_path, "x".repeat(4096)).unwrap();
        std::fs::set_permissions(&old_path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let old = TokenStore::new(&old_path);
        old.save(&session("def")).unwrap();
        let mode = std::fs::metadata(&old_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(old.load().unwrap().unwrap().token, "def");
    }

    #[test]
    fn test_restore_after_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let ctx = SessionContext::new(TokenStore::new(&path));
        assert!(!ctx.is_authenticated());
        ctx.init(session("abc")).unwrap();
        assert_eq!(ctx.bearer().as_deref(), Some("abc"));

        let restored = SessionContext::restore(TokenStore::new(&path)).unwrap();
        assert_eq!(restored.bearer().as_deref(), Some("abc"));
        assert_eq!(restored.user().unwrap().name, "Ada");
    }

    #[test]
    fn test_teardown_clears_memory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let ctx = SessionContext::new(TokenStore::new(&path));
        ctx.init(session("abc")).unwrap();

        ctx.teardown().unwrap();
        assert!(ctx.bearer().is_none());
        assert!(!path.exists());

        // Second teardown is a no-op
        ctx.teardown().unwrap();
    }

    #[test]
    fn test_corrupt_file_means_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let ctx = SessionContext::restore(TokenStore::new(&path)).unwrap();
        assert!(!ctx.is_authenticated());
    }
}
