// Data models for the remote project API
//
// These structs map to the JSON bodies exchanged with the backend.
// Serde ignores extra fields, so the client keeps working when the
// server adds columns to its project records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque project identifier assigned by the remote store
///
/// Backends disagree on whether ids are strings or integers, so both are
/// accepted on the wire and kept as a string internally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => ProjectId(s),
            RawId::Number(n) => ProjectId(n.to_string()),
        })
    }
}

/// Liveness reported by the server's most recent ping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectStatus {
    Up,
    Down,
    /// Never pinged, or a value this client doesn't recognize
    #[default]
    #[serde(other)]
    Unknown,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// A monitored backend endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub url: String,

    // Server-computed fields, read-only from the client's side
    #[serde(default, deserialize_with = "status_or_unknown")]
    pub last_status: ProjectStatus,
    #[serde(default)]
    pub last_ping_at: Option<DateTime<Utc>>,
    /// Latency of the last successful ping in milliseconds
    #[serde(default, rename = "last_response_time")]
    pub last_response_time_ms: Option<u64>,
}

/// `null` and missing statuses both mean "not pinged yet"
fn status_or_unknown<'de, D: Deserializer<'de>>(d: D) -> Result<ProjectStatus, D::Error> {
    Ok(Option::<ProjectStatus>::deserialize(d)?.unwrap_or_default())
}

/// Fields the user controls when creating or editing a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub url: String,
}

/// Login/signup request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Display name, only sent on signup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Authenticated identity as returned by the auth endpoints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// `{token, user}` returned by login and signup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// `{projects: [...]}` returned by the list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
}

/// Single-project responses come either bare or as `{project: ...}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProjectEnvelope {
    Wrapped { project: Project },
    Bare(Project),
}

impl ProjectEnvelope {
    pub(crate) fn into_project(self) -> Project {
        match self {
            Self::Wrapped { project } | Self::Bare(project) => project,
        }
    }
}

/// `{error: "..."}` body sent with failed requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_accepts_numbers_and_strings() {
        let numeric: Project =
            serde_json::from_str(r#"{"id": 42, "name": "API", "url": "https://a.dev"}"#).unwrap();
        let text: Project =
            serde_json::from_str(r#"{"id": "42", "name": "API", "url": "https://a.dev"}"#).unwrap();
        assert_eq!(numeric.id, ProjectId::new("42"));
        assert_eq!(numeric.id, text.id);
    }

    #[test]
    fn test_missing_and_null_status_read_as_unknown() {
        let missing: Project =
            serde_json::from_str(r#"{"id": 1, "name": "a", "url": "https://a.dev"}"#).unwrap();
        let null: Project = serde_json::from_str(
            r#"{"id": 1, "name": "a", "url": "https://a.dev", "last_status": null}"#,
        )
        .unwrap();
        let odd: Project = serde_json::from_str(
            r#"{"id": 1, "name": "a", "url": "https://a.dev", "last_status": "SLEEPING"}"#,
        )
        .unwrap();

        assert_eq!(missing.last_status, ProjectStatus::Unknown);
        assert_eq!(null.last_status, ProjectStatus::Unknown);
        assert_eq!(odd.last_status, ProjectStatus::Unknown);
        assert!(missing.last_ping_at.is_none());
        assert!(missing.last_response_time_ms.is_none());
    }

    #[test]
    fn test_server_fields_use_wire_names() {
        let project: Project = serde_json::from_str(
            r#"{
                "id": "p1",
                "name": "API",
                "url": "https://api.example.com",
                "last_status": "UP",
                "last_ping_at": "2025-01-15T10:30:00Z",
                "last_response_time": 120,
                "user_id": 7
            }"#,
        )
        .unwrap();

        assert_eq!(project.last_status, ProjectStatus::Up);
        assert_eq!(project.last_response_time_ms, Some(120));
        assert!(project.last_ping_at.is_some());
    }

    #[test]
    fn test_envelope_unwraps_both_shapes() {
        let wrapped: ProjectEnvelope = serde_json::from_str(
            r#"{"project": {"id": 3, "name": "w", "url": "https://w.dev"}}"#,
        )
        .unwrap();
        let bare: ProjectEnvelope =
            serde_json::from_str(r#"{"id": 3, "name": "b", "url": "https://b.dev"}"#).unwrap();

        assert_eq!(wrapped.into_project().name, "w");
        assert_eq!(bare.into_project().name, "b");
    }

    #[test]
    fn test_signup_credentials_carry_name_only_when_set() {
        let login = Credentials {
            email: "a@b.c".into(),
            password: "pw".into(),
            name: None,
        };
        let json = serde_json::to_value(&login).unwrap();
        assert!(json.get("name").is_none());
    }
}
