/// Schema browser screen: databases, tables of the selected database,
/// columns of the selected table

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::core::browser::{ColumnInfo, DatabaseEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFocus {
    Databases,
    Tables,
}

#[derive(Debug)]
pub struct SchemaView {
    databases: Vec<DatabaseEntry>,
    tables: Vec<String>,
    columns: Vec<ColumnInfo>,
    selected_database: usize,
    selected_table: usize,
    focus: SchemaFocus,
    show_builtin: bool,
    loaded: bool,
    error: Option<String>,
}

impl Default for SchemaView {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            tables: Vec::new(),
            columns: Vec::new(),
            selected_database: 0,
            selected_table: 0,
            focus: SchemaFocus::Databases,
            show_builtin: false,
            loaded: false,
            error: None,
        }
    }
}

impl SchemaView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_databases(&mut self, databases: Vec<DatabaseEntry>) {
        self.databases = databases;
        self.selected_database = 0;
        self.tables.clear();
        self.columns.clear();
        self.selected_table = 0;
        self.focus = SchemaFocus::Databases;
        self.loaded = true;
        self.error = None;
    }

    /// Ignored unless `database` is still the selected one
    pub fn set_tables(&mut self, database: &str, tables: Vec<String>) {
        if self.selected_database_name() != Some(database) {
            return;
        }
        self.tables = tables;
        self.selected_table = 0;
        self.columns.clear();
        self.error = None;
    }

    /// Ignored unless `database`.`table` is still the selection
    pub fn set_columns(&mut self, database: &str, table: &str, columns: Vec<ColumnInfo>) {
        if self.selected_database_name() != Some(database) || self.selected_table_name() != Some(table) {
            return;
        }
        self.columns = columns;
        self.error = None;
    }

    pub fn set_error(&mut self, message: String) {
        self.loaded = true;
        self.error = Some(message);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn focus(&self) -> SchemaFocus {
        self.focus
    }

    pub fn show_builtin(&self) -> bool {
        self.show_builtin
    }

    pub fn toggle_builtin(&mut self) -> bool {
        self.show_builtin = !self.show_builtin;
        self.show_builtin
    }

    pub fn selected_database_name(&self) -> Option<&str> {
        self.databases.get(self.selected_database).map(|d| d.name.as_str())
    }

    pub fn selected_table_name(&self) -> Option<&str> {
        self.tables.get(self.selected_table).map(String::as_str)
    }

    /// Move the cursor in the focused list; true if the selection changed
    pub fn move_selection(&mut self, delta: isize) -> bool {
        let (index, len) = match self.focus {
            SchemaFocus::Databases => (&mut self.selected_database, self.databases.len()),
            SchemaFocus::Tables => (&mut self.selected_table, self.tables.len()),
        };
        if len == 0 {
            return false;
        }

        let next = (*index as isize + delta).clamp(0, len as isize - 1) as usize;
        if next == *index {
            return false;
        }
        *index = next;

        match self.focus {
            SchemaFocus::Databases => {
                self.tables.clear();
                self.columns.clear();
                self.selected_table = 0;
            }
            SchemaFocus::Tables => self.columns.clear(),
        }
        true
    }

    /// Databases -> Tables (when there are tables) -> Databases
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            SchemaFocus::Databases if !self.tables.is_empty() => SchemaFocus::Tables,
            SchemaFocus::Databases => SchemaFocus::Databases,
            SchemaFocus::Tables => SchemaFocus::Databases,
        };
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if let Some(error) = &self.error {
            let message = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Schema browser unavailable",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(error.as_str()),
                Line::from(""),
                Line::from(Span::styled(
                    "Start the database server and press [r] to retry",
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Schema "));
            frame.render_widget(message, area);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(25),
                Constraint::Percentage(25),
                Constraint::Percentage(50),
            ])
            .split(area);

        let db_title = if self.show_builtin {
            " Databases (all) "
        } else {
            " Databases "
        };
        let databases: Vec<ListItem> = self
            .databases
            .iter()
            .enumerate()
            .map(|(idx, db)| {
                let mut style = if db.builtin {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::White)
                };
                if idx == self.selected_database {
                    style = style.bg(Color::DarkGray).fg(Color::White).add_modifier(Modifier::BOLD);
                }
                ListItem::new(db.name.as_str()).style(style)
            })
            .collect();
        frame.render_widget(
            List::new(databases).block(self.pane(db_title, self.focus == SchemaFocus::Databases)),
            chunks[0],
        );

        let tables: Vec<ListItem> = self
            .tables
            .iter()
            .enumerate()
            .map(|(idx, table)| {
                let style = if idx == self.selected_table && self.focus == SchemaFocus::Tables {
                    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(table.as_str()).style(style)
            })
            .collect();
        frame.render_widget(
            List::new(tables).block(self.pane(" Tables ", self.focus == SchemaFocus::Tables)),
            chunks[1],
        );

        let header = Row::new(vec!["Field", "Type", "Null", "Key", "Default", "Extra"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);
        let rows: Vec<Row> = self
            .columns
            .iter()
            .map(|c| {
                Row::new(vec![
                    Cell::from(c.field.as_str()),
                    Cell::from(c.column_type.as_str()),
                    Cell::from(c.null.as_str()),
                    Cell::from(c.key.as_str()),
                    Cell::from(c.default.as_deref().unwrap_or("NULL")),
                    Cell::from(c.extra.as_str()),
                ])
            })
            .collect();
        let title = match self.selected_table_name() {
            Some(table) => format!(" Columns of {} ", table),
            None => " Columns ".to_string(),
        };
        let columns = Table::new(
            rows,
            [
                Constraint::Percentage(22),
                Constraint::Percentage(22),
                Constraint::Length(5),
                Constraint::Length(5),
                Constraint::Percentage(18),
                Constraint::Min(6),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(columns, chunks[2]);
    }

    fn pane<'a>(&self, title: &'a str, focused: bool) -> Block<'a> {
        let border = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> DatabaseEntry {
        DatabaseEntry {
            name: name.to_string(),
            builtin: false,
        }
    }

    fn loaded_view() -> SchemaView {
        let mut view = SchemaView::new();
        view.set_databases(vec![entry("shop"), entry("crm")]);
        view.set_tables("shop", vec!["orders".to_string(), "users".to_string()]);
        view
    }

    #[test]
    fn test_changing_database_clears_tables() {
        let mut view = loaded_view();
        assert!(view.move_selection(1));
        assert_eq!(view.selected_database_name(), Some("crm"));
        assert_eq!(view.selected_table_name(), None);

        // Already at the end
        assert!(!view.move_selection(1));
    }

    #[test]
    fn test_stale_results_are_ignored() {
        let mut view = loaded_view();
        view.move_selection(1);

        view.set_tables("shop", vec!["orders".to_string()]);
        assert_eq!(view.selected_table_name(), None);

        view.set_tables("crm", vec!["leads".to_string()]);
        assert_eq!(view.selected_table_name(), Some("leads"));
    }

    #[test]
    fn test_focus_moves_to_tables_only_when_present() {
        let mut view = SchemaView::new();
        view.set_databases(vec![entry("empty")]);
        view.toggle_focus();
        assert_eq!(view.focus(), SchemaFocus::Databases);

        let mut view = loaded_view();
        view.toggle_focus();
        assert_eq!(view.focus(), SchemaFocus::Tables);
        assert!(view.move_selection(1));
        assert_eq!(view.selected_table_name(), Some("users"));
    }
}
