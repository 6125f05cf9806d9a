/// Main dashboard frame: header, screen menu, content, footer, help overlay

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::Screen;
use crate::screens::{MetricsTable, SchemaView};

pub struct Dashboard {
    pub title: String,
    pub metrics: MetricsTable,
    pub schema: SchemaView,
}

/// Per-frame state owned by the app
pub struct FrameState<'a> {
    pub current_screen: Screen,
    pub selected_index: usize,
    pub endpoint: &'a str,
    pub server_running: Option<bool>,
    pub refreshing: bool,
    pub auto_refresh: Option<std::time::Duration>,
    pub status_message: Option<&'a str>,
    pub show_help: bool,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            title: format!("Gamma Metrics v{}", env!("CARGO_PKG_VERSION")),
            metrics: MetricsTable::new(),
            schema: SchemaView::new(),
        }
    }

    pub fn render(&self, frame: &mut Frame, state: &FrameState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Menu
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        let (server_text, server_color) = match state.server_running {
            Some(true) => ("running", Color::Green),
            Some(false) => ("not running", Color::Red),
            None => ("checking...", Color::DarkGray),
        };
        let refresh_text = match state.auto_refresh {
            Some(interval) => format!("every {}", humantime::format_duration(interval)),
            None => "manual".to_string(),
        };

        let title_line = Line::from(vec![
            Span::styled(
                &self.title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("Server: ", Style::default().fg(Color::Gray)),
            Span::styled(server_text, Style::default().fg(server_color).add_modifier(Modifier::BOLD)),
            Span::raw(" | "),
            Span::styled("Endpoint: ", Style::default().fg(Color::Gray)),
            Span::styled(state.endpoint, Style::default().fg(Color::White)),
            Span::raw(" | "),
            Span::styled("Refresh: ", Style::default().fg(Color::Gray)),
            Span::styled(refresh_text, Style::default().fg(Color::White)),
        ]);

        let title = Paragraph::new(title_line)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, chunks[0]);

        let menu_items: Vec<Span> = Screen::all()
            .iter()
            .enumerate()
            .flat_map(|(i, screen)| {
                let style = if *screen == state.current_screen {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                vec![
                    Span::styled(format!(" [{}] {} ", i + 1, screen.title()), style),
                    Span::raw("  "),
                ]
            })
            .collect();

        let menu = Paragraph::new(Line::from(menu_items))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(menu, chunks[1]);

        match state.current_screen {
            Screen::Metrics => self.metrics.render(frame, chunks[2], state.selected_index, state.refreshing),
            Screen::Schema => self.schema.render(frame, chunks[2]),
        }

        let footer_text = if let Some(status) = state.status_message {
            status.to_string()
        } else {
            match state.current_screen {
                Screen::Metrics => "[Tab/1-2] Switch screen | [↑↓] Select | [r]efresh | [?] Help | [q]uit".to_string(),
                Screen::Schema => "[Tab/1-2] Switch screen | [↑↓] Select | [← →] Pane | [a]ll schemas | [r]eload | [q]uit".to_string(),
            }
        };

        let footer = Paragraph::new(footer_text)
            .alignment(Alignment::Center)
            .style(if state.status_message.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);

        if state.show_help {
            self.render_help(frame, state.current_screen);
        }
    }

    fn render_help(&self, frame: &mut Frame, current_screen: Screen) {
        let area = frame.size();
        let popup_width = area.width.min(70);
        let popup_height = area.height.min(22);
        let popup_area = Rect {
            x: area.width.saturating_sub(popup_width) / 2,
            y: area.height.saturating_sub(popup_height) / 2,
            width: popup_width,
            height: popup_height,
        };

        let section = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let mut help_text = vec![
            Line::from(Span::styled(
                "Gamma Metrics - Keyboard Shortcuts",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled("Global:", section)),
            Line::from("  [1] [2]        Jump to screen (1=Metrics, 2=Schema)"),
            Line::from("  [Tab]          Next screen"),
            Line::from("  [?] / [F1]     Toggle this help screen"),
            Line::from("  [q] / [Esc]    Quit"),
            Line::from(""),
        ];

        match current_screen {
            Screen::Metrics => {
                help_text.push(Line::from(Span::styled("Metrics Screen:", section)));
                help_text.push(Line::from("  [r]            Collect a fresh snapshot"));
                help_text.push(Line::from("  [↑↓]           Select row"));
                help_text.push(Line::from(""));
                help_text.push(Line::from("  Database metrics need a running server; host metrics"));
                help_text.push(Line::from("  are always collected."));
                help_text.push(Line::from("  Disk I/O sums per-process counters and misses processes"));
                help_text.push(Line::from("  whose I/O stats the current user cannot read."));
            }
            Screen::Schema => {
                help_text.push(Line::from(Span::styled("Schema Screen:", section)));
                help_text.push(Line::from("  [↑↓]           Select database or table"));
                help_text.push(Line::from("  [← →] / [Enter] Switch between databases and tables"));
                help_text.push(Line::from("  [a]            Show or hide built-in schemas"));
                help_text.push(Line::from("  [r]            Reload database list"));
            }
        }

        help_text.push(Line::from(""));
        help_text.push(Line::from(Span::styled(
            "Press [?] or [Esc] to close this help",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        )));

        frame.render_widget(Clear, popup_area);
        let help_widget = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(Span::styled(" Help ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)))
                    .style(Style::default().bg(Color::Black)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(help_widget, popup_area);
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn state(screen: Screen, show_help: bool) -> FrameState<'static> {
        FrameState {
            current_screen: screen,
            selected_index: 0,
            endpoint: "root@127.0.0.1:3306",
            server_running: Some(false),
            refreshing: false,
            auto_refresh: None,
            status_message: None,
            show_help,
        }
    }

    fn draw(dashboard: &Dashboard, state: &FrameState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| dashboard.render(frame, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_header_shows_server_status() {
        let text = draw(&Dashboard::new(), &state(Screen::Metrics, false));
        assert!(text.contains("not running"));
        assert!(text.contains("root@127.0.0.1:3306"));
        assert!(text.contains("Collecting metrics..."));
    }

    #[test]
    fn test_help_overlay() {
        let text = draw(&Dashboard::new(), &state(Screen::Schema, true));
        assert!(text.contains("Keyboard Shortcuts"));
        assert!(text.contains("built-in schemas"));
    }

    #[test]
    fn test_metrics_help_notes_disk_io_scope() {
        let text = draw(&Dashboard::new(), &state(Screen::Metrics, true));
        assert!(text.contains("Disk I/O sums per-process counters"));
        assert!(text.contains("current user cannot read"));
    }
}
