// Startup module - banner shown before the dashboard takes over the screen
//
// print_startup writes to stdout for headless runs; log_startup sends the
// same facts through tracing so they land in the dashboard's log panel.

use crate::config::{Config, VERSION};
use crate::session::SessionContext;

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
}

fn config_source() -> Option<String> {
    Config::config_path()
        .filter(|path| path.exists())
        .map(|path| path.display().to_string())
}

/// Print the startup banner (headless watch mode)
pub fn print_startup(config: &Config, session: &SessionContext) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}Awakener{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Uptime dashboard for your monitored projects{RESET}");
    println!();

    match config_source() {
        Some(path) => println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {path}"),
        None => println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}"),
    }
    println!("  {DIM}API:{RESET}    {}", config.api_url);

    match session.user() {
        Some(user) => println!("  {DIM}User:{RESET}   {GREEN}✓{RESET} {}", user.name),
        None => println!("  {DIM}User:{RESET}   {YELLOW}not logged in{RESET}"),
    }
    println!(
        "  {DIM}Polling every {}s{RESET}",
        config.poll_interval.as_secs()
    );
    println!();
}

/// Startup lines for the dashboard's log panel
pub fn log_startup(config: &Config, session: &SessionContext) {
    tracing::info!("Awakener v{}", VERSION);
    match config_source() {
        Some(path) => tracing::info!("Config: {}", path),
        None => tracing::info!("Config: defaults"),
    }
    tracing::info!("API: {}", config.api_url);
    if let Some(user) = session.user() {
        tracing::info!("Signed in as {}", user.name);
    }
    tracing::info!(
        "Polling every {}s",
        config.poll_interval.as_secs()
    );
}
