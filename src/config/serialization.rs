//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

impl Config {
    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        format!(
            r#"# awakener configuration

# Project API base URL (AWAKENER_API_URL overrides)
# Use `awakener demo` and point this at http://127.0.0.1:8787/api to try it offline
api_url = "{api_url}"

# Seconds between dashboard refreshes (AWAKENER_POLL_INTERVAL overrides)
poll_interval_secs = {poll}

# Per-request timeout in seconds
request_timeout_secs = {timeout}

# Where the login token is stored (AWAKENER_SESSION_FILE overrides)
session_file = "{session_file}"

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = "{log_level}"
# File logging (in addition to the TUI log strip or stderr)
file_enabled = {log_file_enabled}
file_dir = "{log_file_dir}"
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = "{log_file_prefix}"

# Local demo backend (`awakener demo`)
[demo]
bind_addr = "{demo_bind}"
ping_interval_secs = {demo_ping}
"#,
            api_url = self.api_url,
            poll = self.poll_interval.as_secs(),
            timeout = self.request_timeout.as_secs(),
            session_file = toml_path(&self.session_file),
            log_level = self.logging.level,
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = toml_path(&self.logging.file_dir),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = self.logging.file_prefix,
            demo_bind = self.demo.bind_addr,
            demo_ping = self.demo.ping_interval.as_secs(),
        )
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config path",
            ));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, self.to_toml())
    }
}

/// Paths go inside basic strings, so Windows backslashes need escaping
fn toml_path(path: &std::path::Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}
