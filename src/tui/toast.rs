//! Short-lived confirmation drawn over the bottom-right corner

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthStr;

const TOAST_DURATION: Duration = Duration::from_secs(3);

pub struct Toast {
    pub message: String,
    pub failure: bool,
    shown_at: Instant,
}

impl Toast {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failure: false,
            shown_at: Instant::now(),
        }
    }

    /// Same as `new`, drawn in red
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            failure: true,
            ..Self::new(message)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.shown_at.elapsed() >= TOAST_DURATION
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let color = if self.failure { Color::Red } else { Color::Cyan };
        let width = (self.message.width() as u16 + 4).min(area.width.saturating_sub(4));
        let rect = Rect::new(
            area.right().saturating_sub(width + 2),
            area.bottom().saturating_sub(5),
            width,
            3,
        );

        let text = Paragraph::new(self.message.as_str())
            .alignment(Alignment::Center)
            .style(Style::default().fg(color))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(color)),
            );

        f.render_widget(Clear, rect);
        f.render_widget(text, rect);
    }
}
