// Awakener - terminal client for an uptime monitoring service
//
// Users register backend URLs as projects; the service pings them and
// records UP/DOWN status. This client authenticates, manages projects, and
// keeps a live dashboard of their status.
//
// Architecture:
// - API client (reqwest): typed calls to the remote service, errors classified
// - Session: bearer token in memory and on disk
// - Store: cached project list with reconciliation against the server
// - Scheduler: background task that refreshes the store on an interval
// - Form: create/edit validation and submission
// - TUI (ratatui) or headless commands on top of the same pieces
// - Demo backend (axum): a local stand-in for the service

mod api;
mod cli;
mod commands;
mod config;
mod demo;
mod events;
mod form;
mod logging;
mod scheduler;
mod session;
mod startup;
mod store;
mod tui;
mod util;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::Services;
use config::Config;
use logging::LogBuffer;
use tui::app::ExitReason;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `config` works without loading anything else
    if let Some(Commands::Config { show, reset, path }) = cli.command {
        return cli::handle_config(show, reset, path);
    }

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();
    let config = Config::from_env();

    // The dashboard owns the terminal, so its logs go to the buffer instead
    let dashboard = cli.command.is_none() && config.enable_tui;
    let log_buffer = LogBuffer::new();
    let _file_guard = logging::init(&config.logging, dashboard, &log_buffer);

    tracing::debug!("Loaded configuration: api_url={}", config.api_url);

    let connect = || Services::connect(&config);
    match cli.command {
        None if dashboard => run_dashboard(&config, log_buffer).await,
        None | Some(Commands::Watch) => {
            let services = connect()?;
            startup::print_startup(&config, &services.session);
            commands::watch(&services, &config).await
        }
        Some(Commands::Demo { bind }) => {
            let bind = bind.unwrap_or(config.demo.bind_addr);
            demo::run_demo(bind, config.demo.ping_interval).await
        }
        Some(Commands::Login { email, password }) => {
            commands::login(&connect()?, email, password).await
        }
        Some(Commands::Signup {
            name,
            email,
            password,
        }) => commands::signup(&connect()?, name, email, password).await,
        Some(Commands::Logout) => commands::logout(&connect()?),
        Some(Commands::List) => commands::list(&connect()?).await,
        Some(Commands::Add { name, url }) => commands::add(&connect()?, name, url).await,
        Some(Commands::Edit { id, name, url }) => {
            commands::edit(&connect()?, id, name, url).await
        }
        Some(Commands::Delete { ids }) => commands::delete(&connect()?, ids).await,
        // Handled before the config was loaded
        Some(Commands::Config { .. }) => Ok(()),
    }
}

async fn run_dashboard(config: &Config, log_buffer: LogBuffer) -> Result<()> {
    let services = Services::connect(config)?;
    services.require_session()?;
    startup::log_startup(config, &services.session);

    let reason = tui::run_dashboard(
        services.store.clone(),
        services.session.clone(),
        config.poll_interval,
        log_buffer,
    )
    .await?;

    match reason {
        ExitReason::Quit => {}
        ExitReason::LoggedOut => println!("Logged out."),
        ExitReason::SessionExpired(reason) => {
            println!(
                "Session expired ({}). Run `awakener login --email <email>` to log in again.",
                reason
            );
        }
    }
    Ok(())
}
