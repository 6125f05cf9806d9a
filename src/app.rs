/// Main TUI application

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::core::browser::{ColumnInfo, DatabaseEntry, SchemaBrowser};
use crate::core::database::MySqlClient;
use crate::core::host::{server_process_running, SysinfoProbe};
use crate::core::metrics::MetricSnapshot;
use crate::core::{LiveCollector, MetricsRefresher};
use crate::screens::{Dashboard, FrameState, SchemaFocus};
use crate::utils::AppConfig;

// How often the server process probe runs
const SERVER_PROBE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Metrics,
    Schema,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Metrics => "Metrics",
            Screen::Schema => "Schema",
        }
    }

    pub fn all() -> &'static [Screen] {
        &[Screen::Metrics, Screen::Schema]
    }

    pub fn next(&self) -> Screen {
        let screens = Screen::all();
        let idx = screens.iter().position(|s| s == self).unwrap_or(0);
        screens[(idx + 1) % screens.len()]
    }
}

/// Schema browser results delivered by background tasks
enum SchemaEvent {
    Databases(Result<Vec<DatabaseEntry>, String>),
    Tables {
        database: String,
        result: Result<Vec<String>, String>,
    },
    Columns {
        database: String,
        table: String,
        result: Result<Vec<ColumnInfo>, String>,
    },
}

pub struct App {
    dashboard: Dashboard,
    refresher: MetricsRefresher<MySqlClient, SysinfoProbe>,
    browser: SchemaBrowser,
    endpoint: String,
    current_screen: Screen,
    selected_index: usize,
    should_quit: bool,
    status_message: Option<String>,
    show_help: bool,
    auto_refresh: Option<Duration>,
    last_refresh: Instant,
    // In-flight metrics refresh
    pending_snapshot: Option<oneshot::Receiver<MetricSnapshot>>,
    server_running: Option<bool>,
    server_status_rx: mpsc::UnboundedReceiver<bool>,
    schema_tx: mpsc::UnboundedSender<SchemaEvent>,
    schema_rx: mpsc::UnboundedReceiver<SchemaEvent>,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = MySqlClient::new(&config.database);
        let endpoint = client.endpoint().to_string();
        let refresher = MetricsRefresher::new(LiveCollector::from_config(config));
        let browser = SchemaBrowser::new(client);

        // Background task watching for the server process
        let (server_status_tx, server_status_rx) = mpsc::unbounded_channel();
        let names = config.metrics.server_process.clone();
        tokio::spawn(async move {
            loop {
                let probe_names = names.clone();
                match tokio::task::spawn_blocking(move || server_process_running(&probe_names)).await {
                    Ok(running) => {
                        if server_status_tx.send(running).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Server process probe failed"),
                }
                tokio::time::sleep(SERVER_PROBE_INTERVAL).await;
            }
        });

        let (schema_tx, schema_rx) = mpsc::unbounded_channel();

        Ok(Self {
            dashboard: Dashboard::new(),
            refresher,
            browser,
            endpoint,
            current_screen: Screen::Metrics,
            selected_index: 0,
            should_quit: false,
            status_message: None,
            show_help: false,
            auto_refresh: config.metrics.auto_refresh,
            last_refresh: Instant::now(),
            pending_snapshot: None,
            server_running: None,
            server_status_rx,
            schema_tx,
            schema_rx,
        })
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        info!(endpoint = %self.endpoint, "Dashboard started");
        self.trigger_refresh();

        let result = self.run_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            // Completed metrics refresh (non-blocking)
            if let Some(rx) = self.pending_snapshot.as_mut() {
                match rx.try_recv() {
                    Ok(snapshot) => {
                        self.dashboard.metrics.update(&snapshot);
                        self.pending_snapshot = None;
                    }
                    Err(oneshot::error::TryRecvError::Empty) => {}
                    Err(oneshot::error::TryRecvError::Closed) => {
                        warn!("Metrics refresh ended without a snapshot");
                        self.pending_snapshot = None;
                    }
                }
            }

            while let Ok(running) = self.server_status_rx.try_recv() {
                self.server_running = Some(running);
            }

            while let Ok(event) = self.schema_rx.try_recv() {
                self.apply_schema_event(event);
            }

            if let Some(interval) = self.auto_refresh {
                if self.pending_snapshot.is_none() && self.last_refresh.elapsed() >= interval {
                    self.trigger_refresh();
                }
            }

            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(100))? {
                self.handle_event(event::read()?);
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Start a background refresh; keeps the current table if one is running
    fn trigger_refresh(&mut self) {
        match self.refresher.trigger() {
            Some(rx) => {
                self.pending_snapshot = Some(rx);
                self.last_refresh = Instant::now();
            }
            None => self.set_status("Refresh already in progress".to_string()),
        }
    }

    /// Windows consoles report both press and release; act on presses only
    fn handle_event(&mut self, event: Event) {
        if let Event::Key(key_event) = event {
            if key_event.kind == KeyEventKind::Press {
                self.handle_key(key_event.code);
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        self.clear_status();

        match key {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('?') | KeyCode::F(1) => {
                self.show_help = !self.show_help;
            }
            KeyCode::Tab => self.switch_screen(self.current_screen.next()),
            KeyCode::Char('1') => self.switch_screen(Screen::Metrics),
            KeyCode::Char('2') => self.switch_screen(Screen::Schema),
            KeyCode::Char('r') => match self.current_screen {
                Screen::Metrics => {
                    self.set_status("Refreshing...".to_string());
                    self.trigger_refresh();
                }
                Screen::Schema => self.load_databases(),
            },
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Left | KeyCode::Right | KeyCode::Enter if self.current_screen == Screen::Schema => {
                self.dashboard.schema.toggle_focus();
            }
            KeyCode::Char('a') if self.current_screen == Screen::Schema => {
                let all = self.dashboard.schema.toggle_builtin();
                self.set_status(if all {
                    "Showing built-in schemas".to_string()
                } else {
                    "Hiding built-in schemas".to_string()
                });
                self.load_databases();
            }
            _ => {}
        }
    }

    fn switch_screen(&mut self, screen: Screen) {
        self.current_screen = screen;
        self.selected_index = 0;
        if screen == Screen::Schema && !self.dashboard.schema.is_loaded() {
            self.load_databases();
        }
    }

    fn move_selection(&mut self, delta: isize) {
        match self.current_screen {
            Screen::Metrics => {
                let max = self.dashboard.metrics.rows().len().saturating_sub(1);
                self.selected_index = (self.selected_index as isize + delta).clamp(0, max as isize) as usize;
            }
            Screen::Schema => {
                if self.dashboard.schema.move_selection(delta) {
                    match self.dashboard.schema.focus() {
                        SchemaFocus::Databases => self.load_tables(),
                        SchemaFocus::Tables => self.load_columns(),
                    }
                }
            }
        }
    }

    fn apply_schema_event(&mut self, event: SchemaEvent) {
        let schema = &mut self.dashboard.schema;
        match event {
            SchemaEvent::Databases(Ok(databases)) => {
                schema.set_databases(databases);
                self.load_tables();
            }
            SchemaEvent::Tables { database, result: Ok(tables) } => {
                schema.set_tables(&database, tables);
                self.load_columns();
            }
            SchemaEvent::Columns { database, table, result: Ok(columns) } => {
                schema.set_columns(&database, &table, columns);
            }
            SchemaEvent::Databases(Err(e))
            | SchemaEvent::Tables { result: Err(e), .. }
            | SchemaEvent::Columns { result: Err(e), .. } => {
                warn!(error = %e, "Schema browser request failed");
                schema.set_error(e);
            }
        }
    }

    fn load_databases(&self) {
        let browser = self.browser.clone();
        let tx = self.schema_tx.clone();
        let include_builtin = self.dashboard.schema.show_builtin();
        tokio::spawn(async move {
            let result = browser
                .list_databases(include_builtin)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(SchemaEvent::Databases(result));
        });
    }

    fn load_tables(&self) {
        let Some(database) = self.dashboard.schema.selected_database_name().map(str::to_string) else {
            return;
        };
        let browser = self.browser.clone();
        let tx = self.schema_tx.clone();
        tokio::spawn(async move {
            let result = browser.list_tables(&database).await.map_err(|e| format!("{:#}", e));
            let _ = tx.send(SchemaEvent::Tables { database, result });
        });
    }

    fn load_columns(&self) {
        let schema = &self.dashboard.schema;
        let (Some(database), Some(table)) = (schema.selected_database_name(), schema.selected_table_name()) else {
            return;
        };
        let (database, table) = (database.to_string(), table.to_string());
        debug!(%database, %table, "Loading columns");

        let browser = self.browser.clone();
        let tx = self.schema_tx.clone();
        tokio::spawn(async move {
            let result = browser
                .describe_table(&database, &table)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(SchemaEvent::Columns { database, table, result });
        });
    }

    fn render(&self, frame: &mut ratatui::Frame) {
        let state = FrameState {
            current_screen: self.current_screen,
            selected_index: self.selected_index,
            endpoint: &self.endpoint,
            server_running: self.server_running,
            refreshing: self.pending_snapshot.is_some(),
            auto_refresh: self.auto_refresh,
            status_message: self.status_message.as_deref(),
            show_help: self.show_help,
        };
        self.dashboard.render(frame, &state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyModifiers};

    fn key(code: KeyCode, kind: KeyEventKind) -> Event {
        Event::Key(KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind))
    }

    #[tokio::test]
    async fn test_key_release_is_ignored() {
        let mut app = App::new(&AppConfig::default()).unwrap();

        app.handle_event(key(KeyCode::Char('?'), KeyEventKind::Press));
        app.handle_event(key(KeyCode::Char('?'), KeyEventKind::Release));
        assert!(app.show_help);

        app.handle_event(key(KeyCode::Esc, KeyEventKind::Press));
        app.handle_event(key(KeyCode::Esc, KeyEventKind::Release));
        assert!(!app.show_help);
        assert!(!app.should_quit);

        app.handle_event(key(KeyCode::Char('q'), KeyEventKind::Repeat));
        assert!(!app.should_quit);
        app.handle_event(key(KeyCode::Char('q'), KeyEventKind::Press));
        assert!(app.should_quit);
    }

    #[test]
    fn test_screen_cycle() {
        assert_eq!(Screen::Metrics.next(), Screen::Schema);
        assert_eq!(Screen::Schema.next(), Screen::Metrics);
        assert_eq!(Screen::all().len(), 2);
    }
}
