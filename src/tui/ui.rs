// UI rendering logic
//
// Everything here is a pure function of App state. Layout, top to bottom:
//
//   header     user, UP/DOWN/UNKNOWN counts, last refresh
//   alert      last store error (only when there is one)
//   body       project table, empty/loading state, or the form
//   key help
//   log strip

use super::app::{App, FormField, FormScreen};
use crate::api::{Project, ProjectStatus};
use crate::form::FormPhase;
use crate::logging::{LogEntry, LogLevel};
use crate::util::{format_clock, format_last_ping, truncate_to_width};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState},
    Frame,
};

const NAME_WIDTH: usize = 24;
const PING_WIDTH: u16 = 19;

/// Main UI render function - called on every frame
pub fn draw(f: &mut Frame, app: &App) {
    let alert_height = if app.snapshot.last_error.is_some() { 3 } else { 0 };
    let [header, alert, body, help, logs] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(alert_height),
        Constraint::Min(6),
        Constraint::Length(1),
        Constraint::Length(6),
    ])
    .areas(f.area());

    render_header(f, header, app);
    if let Some(error) = &app.snapshot.last_error {
        render_alert(f, alert, error);
    }

    match &app.form {
        Some(screen) => render_form(f, body, screen),
        None => render_projects(f, body, app),
    }

    render_help(f, help, app);
    render_logs_panel(f, logs, app);

    if let Some(project) = &app.confirm_delete {
        render_confirm(f, body, project);
    }
    if let Some(toast) = &app.toast {
        let full = f.area();
        toast.render(f, full);
    }
}

fn status_color(status: ProjectStatus) -> Color {
    match status {
        ProjectStatus::Up => Color::Green,
        ProjectStatus::Down => Color::Red,
        ProjectStatus::Unknown => Color::Gray,
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let (up, down, unknown) = app.status_counts();
    let refreshed = match app.snapshot.last_refreshed_at {
        Some(at) => format_clock(at),
        None => "never".to_string(),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.user_name),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("{} UP", up), Style::default().fg(Color::Green)),
        Span::raw("  "),
        Span::styled(format!("{} DOWN", down), Style::default().fg(Color::Red)),
        Span::raw("  "),
        Span::styled(format!("{} UNKNOWN", unknown), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("   refreshed {}", refreshed),
            Style::default().fg(Color::DarkGray),
        ),
        if app.refreshing {
            Span::styled("  refreshing...", Style::default().fg(Color::Yellow))
        } else {
            Span::raw("")
        },
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Awakener ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    );
    f.render_widget(header, area);
}

fn render_alert(f: &mut Frame, area: Rect, error: &str) {
    let alert = Paragraph::new(error)
        .style(Style::default().fg(Color::Red))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Error "),
        );
    f.render_widget(alert, area);
}

fn render_projects(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Projects ");

    if !app.snapshot.loaded {
        let loading = Paragraph::new("Loading projects...")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(loading, area);
        return;
    }

    if app.snapshot.projects.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from("No projects yet"),
            Line::from(Span::styled(
                "Press 'a' to add one",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    // URL gets whatever the fixed columns leave over
    let url_width = (area.width as usize).saturating_sub(NAME_WIDTH + 9 + 19 + 10 + 8);

    let rows = app.snapshot.projects.iter().map(|p| {
        let response = p
            .last_response_time_ms
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_default();
        Row::new(vec![
            Cell::from(p.last_status.as_str())
                .style(Style::default().fg(status_color(p.last_status))),
            Cell::from(truncate_to_width(&p.name, NAME_WIDTH)),
            Cell::from(truncate_to_width(&p.url, url_width.max(8))),
            Cell::from(format_last_ping(p.last_ping_at)),
            Cell::from(response),
        ])
    });

    let header = Row::new(["STATUS", "NAME", "URL", "LAST PING", "RESPONSE"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(NAME_WIDTH as u16),
            Constraint::Min(8),
            Constraint::Length(PING_WIDTH),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(table, area, &mut state);
}

fn render_form(f: &mut Frame, area: Rect, screen: &FormScreen) {
    let area = centered(area, 64, 11);
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", screen.title()));

    let form = &screen.form;
    let mut lines = Vec::new();

    match form.phase() {
        FormPhase::Loading => {
            lines.push(Line::from("Loading project..."));
        }
        FormPhase::Unavailable => {
            lines.push(Line::from(Span::styled(
                form.error().unwrap_or("Failed to fetch project"),
                Style::default().fg(Color::Red),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Esc to go back",
                Style::default().fg(Color::DarkGray),
            )));
        }
        FormPhase::Ready => {
            lines.push(field_line("Name", &form.name, screen.focus == FormField::Name));
            lines.push(Line::from(""));
            lines.push(field_line("URL ", &form.url, screen.focus == FormField::Url));
            lines.push(Line::from(""));

            if form.is_submitting() {
                let status = if form.editing().is_some() {
                    "Updating..."
                } else {
                    "Creating..."
                };
                lines.push(Line::from(Span::styled(
                    status,
                    Style::default().fg(Color::Yellow),
                )));
            } else if let Some(error) = form.error() {
                lines.push(Line::from(Span::styled(
                    error,
                    Style::default().fg(Color::Red),
                )));
            } else {
                lines.push(Line::from(""));
            }

            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Tab switch field   Enter save   Esc cancel",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Line<'a> {
    let style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(format!("{}: ", label), style),
        Span::raw(value),
        Span::styled(cursor, style),
    ])
}

fn render_confirm(f: &mut Frame, area: Rect, project: &Project) {
    let area = centered(area, 50, 5);
    f.render_widget(Clear, area);
    let prompt = Paragraph::new(vec![
        Line::from(format!(
            "Delete '{}'?",
            truncate_to_width(&project.name, 36)
        )),
        Line::from(Span::styled(
            "y confirm   n cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Confirm "),
    );
    f.render_widget(prompt, area);
}

fn render_help(f: &mut Frame, area: Rect, app: &App) {
    let text = if app.form.is_some() {
        " Tab field  Enter save  Esc cancel"
    } else {
        " a add  e edit  d delete  r refresh  y copy url  L logout  q quit"
    };
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

pub fn render_logs_panel(f: &mut Frame, area: Rect, app: &App) {
    let height = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .log_buffer
        .recent(height)
        .iter()
        .map(|entry| ListItem::new(format_log_entry(entry)).style(log_level_style(&entry.level)))
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" Logs "));
    f.render_widget(list, area);
}

fn format_log_entry(entry: &LogEntry) -> String {
    format!(
        "[{}] {:5} {}",
        format_clock(entry.timestamp),
        entry.level.as_str(),
        entry.message
    )
}

fn log_level_style(level: &LogLevel) -> Style {
    match level {
        LogLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        LogLevel::Warn => Style::default().fg(Color::Yellow),
        LogLevel::Info => Style::default().fg(Color::Blue),
        LogLevel::Debug => Style::default().fg(Color::Gray),
        LogLevel::Trace => Style::default().fg(Color::DarkGray),
    }
}

/// A `width` x `height` rect centered in `area`, clamped to fit
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
