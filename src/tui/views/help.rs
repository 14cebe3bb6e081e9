use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};

use crate::tui::theme::Theme;

const BINDINGS: &[(&str, &str)] = &[
    ("Enter   ", "Run (replaces the current run)"),
    ("Tab     ", "Switch trace / mtr"),
    ("Esc     ", "Stop the current run"),
    ("Up/Down ", "Scroll output"),
    ("PgUp/Dn ", "Scroll output by page"),
    ("Ctrl+T  ", "Cycle theme"),
    ("Ctrl+E  ", "Export to JSON"),
    ("F1      ", "Show this help"),
    ("Ctrl+C  ", "Quit"),
];

/// Help overlay
pub struct HelpView<'a> {
    theme: &'a Theme,
    server: &'a str,
}

impl<'a> HelpView<'a> {
    pub fn new(theme: &'a Theme, server: &'a str) -> Self {
        Self { theme, server }
    }
}

impl Widget for HelpView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Calculate centered popup area
        let popup_width = 50.min(area.width.saturating_sub(4));
        let popup_height = (BINDINGS.len() as u16 + 7).min(area.height.saturating_sub(2));
        let popup_x = (area.width - popup_width) / 2 + area.x;
        let popup_y = (area.height - popup_height) / 2 + area.y;
        let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

        Clear.render(popup_area, buf);

        let block = Block::default()
            .title(format!(" Help \u{2500} webtrace {} ", env!("CARGO_PKG_VERSION")))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        let inner = block.inner(popup_area);
        block.render(popup_area, buf);

        let mut lines = vec![Line::from("")];
        lines.extend(BINDINGS.iter().map(|(key, what)| {
            Line::from(vec![
                Span::styled(format!("  {}", key), Style::default().fg(self.theme.shortcut)),
                Span::raw(*what),
            ])
        }));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  Backend: {}", self.server),
            Style::default().fg(self.theme.text_dim),
        )));
        lines.push(Line::from(Span::styled(
            "  Press any key to close",
            Style::default().fg(self.theme.text_dim),
        )));

        Paragraph::new(lines).render(inner, buf);
    }
}
