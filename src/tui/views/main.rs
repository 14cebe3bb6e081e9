use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget};

use webtrace::state::{HEADER, HopRow, LiveView, RowState};

use crate::tui::theme::Theme;

/// Truncate a string to max_len characters, adding ellipsis if truncated
fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 1).collect();
        format!("{}…", truncated)
    }
}

/// Height of the output pane under the hop table
fn output_pane_height(lines: usize, area: Rect) -> u16 {
    let wanted = lines.clamp(1, 8) as u16 + 2;
    wanted.min(area.height / 2)
}

/// Session body: hop table for mtr, plain output for everything
pub struct MainView<'a> {
    view: &'a LiveView,
    theme: &'a Theme,
    /// Lines scrolled back from the bottom of the output
    scroll_back: usize,
}

impl<'a> MainView<'a> {
    pub fn new(view: &'a LiveView, theme: &'a Theme) -> Self {
        Self {
            view,
            theme,
            scroll_back: 0,
        }
    }

    pub fn with_scroll_back(mut self, lines: usize) -> Self {
        self.scroll_back = lines;
        self
    }

    fn title(&self) -> String {
        match self.view.session {
            Some(ref session) => format!(
                "webtrace \u{2500}\u{2500} {} {} \u{2500}\u{2500} {}",
                session.request.action, session.request.target, session.id
            ),
            None => "webtrace".to_string(),
        }
    }

    fn render_table(&self, rows: &[HopRow], area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(self.title())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));
        let inner = block.inner(area);
        block.render(area, buf);

        let header = Row::new(
            HEADER
                .iter()
                .map(|h| Cell::from(*h).style(Style::default().bold().fg(self.theme.header))),
        )
        .height(1);

        let host_width = inner.width.saturating_sub(3 + 7 + 5 + 5 + 7 + 7 + 7 + 8).max(12) as usize;

        let table_rows: Vec<Row> = rows
            .iter()
            .map(|row| {
                let color = self.theme.row_color(row.state);
                let mut style = Style::default().fg(color);
                if row.state == RowState::Stale {
                    style = style.add_modifier(Modifier::DIM);
                }

                let hosts: Vec<Line> = row
                    .hosts
                    .iter()
                    .map(|h| Line::from(truncate_with_ellipsis(h, host_width)))
                    .collect();
                let height = hosts.len().max(1) as u16;

                let loss_style = if row.state == RowState::Live {
                    Style::default().fg(self.theme.loss_color(&row.loss))
                } else {
                    style
                };

                Row::new(vec![
                    Cell::from(row.index.to_string()),
                    Cell::from(hosts),
                    Cell::from(row.loss.clone()).style(loss_style),
                    Cell::from(row.received.clone()),
                    Cell::from(row.sent.clone()),
                    Cell::from(row.best.clone()),
                    Cell::from(row.avg.clone()),
                    Cell::from(row.worst.clone()),
                ])
                .style(style)
                .height(height)
            })
            .collect();

        let widths = [
            Constraint::Length(3),  // Hop
            Constraint::Min(12),    // Host
            Constraint::Length(7),  // Loss%
            Constraint::Length(5),  // Rcvd
            Constraint::Length(5),  // Sent
            Constraint::Length(7),  // Best
            Constraint::Length(7),  // Avg
            Constraint::Length(7),  // Worst
        ];

        Table::new(table_rows, widths)
            .header(header)
            .render(inner, buf);
    }

    fn render_output(&self, title: String, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));
        let inner = block.inner(area);
        block.render(area, buf);

        // Follow the tail unless scrolled back
        let visible = inner.height as usize;
        let total = self.view.output.len();
        let end = total.saturating_sub(self.scroll_back.min(total.saturating_sub(visible)));
        let start = end.saturating_sub(visible);

        let lines: Vec<Line> = self.view.output[start..end]
            .iter()
            .map(|l| Line::from(l.as_str()))
            .collect();
        Paragraph::new(lines)
            .style(Style::default().fg(self.theme.text))
            .render(inner, buf);
    }
}

impl Widget for MainView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.view.table {
            Some(ref table) => {
                let rows = table.rows();
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Min(3),
                        Constraint::Length(output_pane_height(self.view.output.len(), area)),
                    ])
                    .split(area);
                self.render_table(&rows, chunks[0], buf);
                self.render_output(" Output ".to_string(), chunks[1], buf);
            }
            None => {
                let title = self.title();
                self.render_output(title, area, buf);
            }
        }
    }
}
