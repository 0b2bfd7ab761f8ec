//! Clipboard helper for copying a project's URL
//!
//! Uses `arboard` for cross-platform support. The clipboard is created fresh
//! each time to avoid holding resources.

use super::toast::Toast;
use crate::api::Project;
use anyhow::{Context, Result};
use arboard::Clipboard;

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = Clipboard::new().context("Failed to access clipboard")?;
    clipboard
        .set_text(text)
        .context("Failed to set clipboard text")?;
    Ok(())
}

/// Copy the URL and return the toast describing the outcome
///
/// Fails without a display server (headless Linux, SSH sessions).
pub fn copy_url(project: &Project) -> Toast {
    match copy_to_clipboard(&project.url) {
        Ok(()) => Toast::new(format!("Copied {}", project.url)),
        Err(e) => {
            tracing::warn!("Clipboard copy failed: {:#}", e);
            Toast::failure("Clipboard unavailable")
        }
    }
}
