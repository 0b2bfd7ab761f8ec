//! Configuration for the awakener client
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/awakener/config.toml)
//! 3. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod observability;
mod serialization;


pub use observability::{FileLogging, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hosted backend
pub const DEFAULT_API_URL: &str = "https://awakener-backend.onrender.com/api";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DEMO_BIND: &str = "127.0.0.1:8787";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the project API, including the `/api` prefix
    pub api_url: String,

    /// How often the dashboard refreshes the project list
    pub poll_interval: Duration,

    /// Per-request timeout for API calls
    pub request_timeout: Duration,

    /// Where the login token is persisted
    pub session_file: PathBuf,

    /// Whether to run the TUI (headless mode logs refreshes to stderr)
    pub enable_tui: bool,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Local demo backend settings
    pub demo: DemoConfig,
}

/// `awakener demo` settings
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub bind_addr: SocketAddr,
    pub ping_interval: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            ping_interval: crate::demo::DEFAULT_PING_INTERVAL,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_file: Self::default_session_file(),
            enable_tui: true,
            logging: LoggingConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub api_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub session_file: Option<String>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,

    /// Optional [demo] section
    pub demo: Option<FileDemo>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileDemo {
    pub bind_addr: Option<String>,
    pub ping_interval_secs: Option<u64>,
}

impl DemoConfig {
    fn from_file(file: Option<FileDemo>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let bind_addr = match file.bind_addr {
            Some(addr) => addr.parse().unwrap_or_else(|_| {
                eprintln!(
                    "Ignoring invalid [demo] bind_addr '{}', using {}",
                    addr, DEFAULT_DEMO_BIND
                );
                defaults.bind_addr
            }),
            None => defaults.bind_addr,
        };

        Self {
            bind_addr,
            ping_interval: file
                .ping_interval_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.ping_interval),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Config directory: ~/.config/awakener
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("awakener"))
    }

    /// Get the config file path: ~/.config/awakener/config.toml
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    fn default_session_file() -> PathBuf {
        Self::config_dir()
            .map(|p| p.join("session.json"))
            .unwrap_or_else(|| PathBuf::from("session.json"))
    }

    /// Create config file with defaults if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Config is optional
            }
        }

        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Load file config if it exists
    ///
    /// A config file that exists but can't be read or parsed is fatal: better
    /// a clear error than silently running with defaults.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                    eprintln!("║  CONFIG ERROR - Failed to parse configuration file          ║");
                    eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                    eprintln!("  File: {}\n", path.display());
                    eprintln!("  Error: {}\n", e);
                    eprintln!("  To reset, run `awakener config --reset`.\n");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                eprintln!("║  CONFIG ERROR - Cannot read configuration file              ║");
                eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                eprintln!("  File: {}\n", path.display());
                eprintln!("  Error: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: file -> env vars -> defaults
    pub fn from_env() -> Self {
        Self::from_sources(Self::load_file_config(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup
    pub(crate) fn from_sources(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        // API URL: env > file > default
        let api_url = env("AWAKENER_API_URL")
            .or(file.api_url)
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        // Poll interval: env > file > default, zero or garbage ignored
        let poll_secs = env("AWAKENER_POLL_INTERVAL")
            .and_then(|v| v.parse::<u64>().ok())
            .or(file.poll_interval_secs)
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        // Request timeout: file > default
        let timeout_secs = file
            .request_timeout_secs
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        // Session file: env > file > default
        let session_file = env("AWAKENER_SESSION_FILE")
            .or(file.session_file)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_session_file);

        // TUI toggle: env only (runtime flag)
        let enable_tui = env("AWAKENER_NO_TUI")
            .map(|v| v != "1" && v.to_lowercase() != "true")
            .unwrap_or(true);

        Self {
            api_url,
            poll_interval: Duration::from_secs(poll_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            session_file,
            enable_tui,
            logging: LoggingConfig::from_file(file.logging),
            demo: DemoConfig::from_file(file.demo),
        }
    }
}
