/// Performance metrics table

use chrono::{DateTime, Local};
use ratatui::{
    layout::{Alignment, Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::core::metrics::{MetricSnapshot, DATABASE_PLACEHOLDER, HOST_PLACEHOLDER};

/// Two-column (Metric, Value) table fed by whole snapshots.
///
/// Every update throws away the previous rows and rebuilds them in snapshot
/// order.
#[derive(Debug, Default)]
pub struct MetricsTable {
    rows: Vec<(String, String)>,
    collected_at: Option<DateTime<Local>>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: &MetricSnapshot) {
        self.rows.clear();
        self.rows.extend(
            snapshot
                .iter()
                .map(|(label, value)| (label.to_string(), value.to_string())),
        );
        self.collected_at = Some(snapshot.collected_at());
    }

    /// True until the first snapshot arrives
    pub fn is_collecting(&self) -> bool {
        self.collected_at.is_none()
    }

    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    pub fn collected_at(&self) -> Option<DateTime<Local>> {
        self.collected_at
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, selected_index: usize, refreshing: bool) {
        let title = match (self.collected_at, refreshing) {
            (_, true) => " Performance Metrics (refreshing...) ".to_string(),
            (Some(at), false) => format!(" Performance Metrics (updated {}) ", at.format("%H:%M:%S")),
            (None, false) => " Performance Metrics ".to_string(),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.is_collecting() {
            let waiting = Paragraph::new(Line::from(Span::styled(
                "Collecting metrics...",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )))
            .alignment(Alignment::Center)
            .block(block);
            frame.render_widget(waiting, area);
            return;
        }

        let header = Row::new(vec!["Metric", "Value"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let rows: Vec<Row> = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, (label, value))| {
                let value_style = if value == DATABASE_PLACEHOLDER || value == HOST_PLACEHOLDER {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::Green)
                };

                let row = Row::new(vec![
                    Cell::from(label.as_str()),
                    Cell::from(value.as_str()).style(value_style),
                ]);

                if idx == selected_index {
                    row.style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                } else {
                    row
                }
            })
            .collect();

        let table = Table::new(rows, [Constraint::Length(28), Constraint::Min(20)])
            .header(header)
            .block(block);

        frame.render_widget(table, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics::MetricName;
    use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};

    fn buffer_text(buffer: &Buffer) -> String {
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    fn draw(table: &MetricsTable) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal
            .draw(|frame| table.render(frame, frame.size(), 0, false))
            .unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn test_collecting_state_before_first_snapshot() {
        let table = MetricsTable::new();
        assert!(table.is_collecting());
        assert!(draw(&table).contains("Collecting metrics..."));
    }

    #[test]
    fn test_update_replaces_all_rows() {
        let mut table = MetricsTable::new();
        table.update(&MetricSnapshot::from_fn(|_| "old".to_string()));
        table.update(&MetricSnapshot::from_fn(|name| format!("new {}", name.label())));

        assert_eq!(table.rows().len(), MetricName::ALL.len());
        assert!(table.rows().iter().all(|(_, value)| value.starts_with("new ")));
        assert_eq!(table.rows()[0].0, "Server Uptime");
        assert_eq!(table.rows()[13].0, "Network Traffic");
    }

    #[test]
    fn test_render_shows_metric_rows() {
        let mut table = MetricsTable::new();
        table.update(&MetricSnapshot::unavailable());

        let text = draw(&table);
        assert!(text.contains("Metric"));
        assert!(text.contains("Server Uptime"));
        assert!(text.contains("Open Tables"));
        assert!(text.contains(DATABASE_PLACEHOLDER));
    }
}
