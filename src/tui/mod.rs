// TUI module - the monitoring dashboard
//
// This module manages the terminal UI using ratatui. It handles:
// - Terminal initialization and cleanup
// - Event loop (keyboard input, timer ticks, poller events, task results)
// - Rendering the UI

pub mod app;
pub mod clipboard;
pub mod toast;
pub mod ui;

use crate::events::MonitorEvent;
use crate::logging::LogBuffer;
use crate::scheduler::PollingScheduler;
use crate::session::SessionContext;
use crate::store::ProjectStore;
use anyhow::{Context, Result};
use app::{App, ExitReason, UiMessage};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Run the dashboard until the user quits or the session ends
///
/// Sets up the terminal, starts the poller, runs the event loop, and restores
/// the terminal even when the loop fails.
pub async fn run_dashboard(
    store: Arc<ProjectStore>,
    session: Arc<SessionContext>,
    poll_interval: Duration,
    log_buffer: LogBuffer,
) -> Result<ExitReason> {
    let (monitor_tx, mut monitor_rx) = mpsc::channel(64);
    let scheduler =
        PollingScheduler::new(store.clone(), session.clone(), poll_interval).with_events(monitor_tx);
    let user_name = session.user().map(|u| u.name).unwrap_or_default();

    let (mut app, mut ui_rx) = App::new(store, scheduler, user_name, log_buffer);
    app.start();

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to setup terminal")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let result = run_event_loop(&mut terminal, &mut app, &mut monitor_rx, &mut ui_rx).await;

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to restore terminal")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    result
}

/// Main event loop
///
/// Waits on whichever comes first: keyboard input, a redraw tick, a poller
/// event, or the result of a spawned network call.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    monitor_rx: &mut mpsc::Receiver<MonitorEvent>,
    ui_rx: &mut mpsc::Receiver<UiMessage>,
) -> Result<ExitReason> {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(200));

    loop {
        app.sync();
        terminal
            .draw(|f| ui::draw(f, app))
            .context("Failed to draw terminal")?;

        tokio::select! {
            _ = async {
                if event::poll(Duration::from_millis(10)).unwrap_or(false) {
                    if let Ok(Event::Key(key)) = event::read() {
                        app.handle_key(key);
                    }
                }
            } => {}

            _ = tick_interval.tick() => {}

            Some(event) = monitor_rx.recv() => app.handle_monitor_event(event),

            Some(message) = ui_rx.recv() => app.handle_message(message),
        }

        if let Some(reason) = app.exit.take() {
            return Ok(reason);
        }
    }
}
