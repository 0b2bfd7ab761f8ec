//! `[logging]` section

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

/// How often the JSON log file rolls over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// One file, appended forever
    Never,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown rotation '{}'", other)),
        }
    }
}

impl LogRotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }

    /// Unknown values fall back to daily with a warning on stderr
    /// (the subscriber isn't installed yet when config loads)
    fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|err| {
            eprintln!("Warning: [logging] file_rotation: {}, using daily", err);
            Self::default()
        })
    }
}

/// Effective logging settings
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for the `awakener` target; RUST_LOG overrides the whole filter
    pub level: String,
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    /// "awakener" gives files like awakener.2026-01-15
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file_enabled: false,
            file_dir: "./logs".into(),
            file_rotation: LogRotation::Daily,
            file_prefix: "awakener".into(),
        }
    }
}

/// `[logging]` as written in config.toml, every key optional
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    level: Option<String>,
    file_enabled: Option<bool>,
    file_dir: Option<PathBuf>,
    file_rotation: Option<String>,
    file_prefix: Option<String>,
}

impl LoggingConfig {
    /// Fill the gaps in the file section with defaults
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let Some(file) = file else {
            return Self::default();
        };
        let defaults = Self::default();

        Self {
            level: file.level.unwrap_or(defaults.level),
            file_enabled: file.file_enabled.unwrap_or(defaults.file_enabled),
            file_dir: file.file_dir.unwrap_or(defaults.file_dir),
            file_rotation: file
                .file_rotation
                .as_deref()
                .map_or(defaults.file_rotation, LogRotation::parse_or_default),
            file_prefix: file.file_prefix.unwrap_or(defaults.file_prefix),
        }
    }
}
