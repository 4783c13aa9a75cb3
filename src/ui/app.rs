use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event as CrosstermEvent, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::catalog::BuiltinCatalog;
use crate::config::{ConfigFile, KeyBindings};
use crate::error::Result;
use crate::filter::FilterState;
use crate::project::{Project, ProjectStore};
use crate::tree::{
    flatten, ExpansionState, RowKind, RowRefs, Selection, TreeBuilder, TreeLink, TreeOptions,
    TreeRow,
};

use super::{AppState, DeleteConfirm, SearchInput};

/// Main TUI application
pub struct App {
    // Terminal state
    width: u16,
    height: u16,

    // Application state
    state: AppState,
    should_quit: bool,
    status_message: Option<String>,

    // Data
    store: ProjectStore,
    projects: Arc<[Project]>,
    catalog: BuiltinCatalog,
    options: TreeOptions,
    keys: KeyBindings,

    // Tree state
    rows: Vec<TreeRow>,
    expansion: ExpansionState,
    refs: RowRefs,
    coach_mark: Rc<RefCell<Option<String>>>,
    selected_index: usize,
    selection: Selection,

    // Search state
    search: SearchInput,
    filter: FilterState,

    delete_confirm: Option<DeleteConfirm>,
    last_reload_check: Instant,
}

impl App {
    const RELOAD_CHECK: Duration = Duration::from_secs(2);

    /// Create new application
    pub async fn new(workspace: &std::path::Path) -> Result<Self> {
        let store = ProjectStore::open(workspace).await?;
        let config = ConfigFile::load().await?.unwrap_or_default();
        Ok(Self::with_store(store, &config))
    }

    pub fn with_store(store: ProjectStore, config: &ConfigFile) -> Self {
        let coach_mark: Rc<RefCell<Option<String>>> = Rc::default();
        let sink = Rc::clone(&coach_mark);
        let refs = RowRefs::with_callback(move |_kind, link: &TreeLink| {
            tracing::debug!("Coach mark attached to {}", link.row_key());
            *sink.borrow_mut() = Some(link.row_key());
        });

        let mut app = Self {
            width: 0,
            height: 0,
            state: AppState::Normal,
            should_quit: false,
            status_message: None,
            projects: store.snapshot(),
            store,
            catalog: config.catalog(),
            options: config.tree_options(),
            keys: config.key_bindings(),
            rows: Vec::new(),
            expansion: ExpansionState::new(),
            refs,
            coach_mark,
            selected_index: 0,
            selection: Selection::default(),
            search: SearchInput::new(),
            filter: FilterState::new(config.filter_debounce()),
            delete_confirm: None,
            last_reload_check: Instant::now(),
        };
        app.rebuild_tree();
        app
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        terminal.clear()?;

        let result = self.event_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    /// Main event loop
    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let tick_rate = Duration::from_millis(250);

        loop {
            terminal.draw(|f| {
                self.width = f.area().width;
                self.height = f.area().height;
                super::render::draw(f, self);
            })?;

            if event::poll(tick_rate)? {
                if let CrosstermEvent::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Release {
                        self.handle_key(key.code, key.modifiers).await?;
                    }
                }
            } else {
                self.tick(Instant::now()).await;
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Apply settled filter input and pick up workspace changes on disk
    pub async fn tick(&mut self, now: Instant) {
        if self.filter.tick(now) {
            self.rebuild_tree();
        }

        if now.saturating_duration_since(self.last_reload_check) >= Self::RELOAD_CHECK {
            self.last_reload_check = now;
            match self.store.reload_if_changed().await {
                Ok(true) => {
                    tracing::debug!("Workspace changed on disk, reloading");
                    self.projects = self.store.snapshot();
                    self.rebuild_tree();
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to reload workspace: {}", e);
                    self.status_message = Some(format!("Reload failed: {e}"));
                }
            }
        }
    }

    /// Handle keyboard input
    pub async fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        match self.state {
            AppState::Normal => self.handle_normal_key(key, modifiers).await,
            AppState::Search => {
                self.handle_search_key(key, modifiers);
                Ok(())
            }
            AppState::ConfirmDelete => self.handle_confirm_key(key).await,
            AppState::Help => {
                if matches!(key, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                    self.state = AppState::Normal;
                }
                Ok(())
            }
        }
    }

    async fn handle_normal_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        if self.keys.matches("quit", &key, modifiers) {
            self.should_quit = true;
        } else if self.keys.matches("up", &key, modifiers) {
            self.move_selection_up();
        } else if self.keys.matches("down", &key, modifiers) {
            self.move_selection_down();
        } else if self.keys.matches("select", &key, modifiers) {
            self.select_current();
        } else if self.keys.matches("collapse", &key, modifiers) {
            self.set_current_expanded(Some(false));
        } else if self.keys.matches("expand", &key, modifiers) {
            self.set_current_expanded(Some(true));
        } else if self.keys.matches("toggle", &key, modifiers) {
            self.set_current_expanded(None);
        } else if self.keys.matches("search", &key, modifiers) {
            self.state = AppState::Search;
        } else if self.keys.matches("delete", &key, modifiers) {
            self.request_delete();
        } else if self.keys.matches("reload", &key, modifiers) {
            self.reload().await?;
        } else if self.keys.matches("help", &key, modifiers) {
            self.state = AppState::Help;
        } else if key == KeyCode::Esc && !self.filter.applied().is_empty() {
            self.clear_filter();
        }
        Ok(())
    }

    fn handle_search_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        match key {
            KeyCode::Esc => {
                self.clear_filter();
                self.state = AppState::Normal;
                return;
            }
            KeyCode::Enter => {
                if self.filter.apply_now(self.search.text()) {
                    self.rebuild_tree();
                }
                self.state = AppState::Normal;
                return;
            }
            KeyCode::Left => self.search.move_left(),
            KeyCode::Right => self.search.move_right(),
            KeyCode::Home => self.search.move_home(),
            KeyCode::End => self.search.move_end(),
            KeyCode::Backspace => self.search.backspace(),
            KeyCode::Delete => self.search.delete(),
            KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => self.search.clear(),
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                self.search.insert(ch)
            }
            _ => return,
        }
        self.filter.on_input(self.search.text(), Instant::now());
    }

    async fn handle_confirm_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.state = AppState::Normal;
                if let Some(pending) = self.delete_confirm.take() {
                    self.apply_delete(pending).await?;
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.state = AppState::Normal;
                self.delete_confirm = None;
            }
            _ => {}
        }
        Ok(())
    }

    fn clear_filter(&mut self) {
        self.search.clear();
        if self.filter.apply_now("") {
            self.rebuild_tree();
        }
    }

    /// Rebuild rows from the current snapshot, keeping the cursor on the
    /// same row when it is still visible
    fn rebuild_tree(&mut self) {
        let current = self.selected_row().map(RowAnchor::of);

        let builder = TreeBuilder::new(&self.catalog).with_options(self.options);
        let nodes = builder.build(&self.projects, self.filter.applied(), &mut self.refs);
        self.rows = flatten(&nodes, &self.expansion);

        if let Some(anchor) = current {
            if let Some(idx) = self.rows.iter().position(|r| anchor.matches(r)) {
                self.selected_index = idx;
            }
        }
        if self.selected_index >= self.rows.len() {
            self.selected_index = self.rows.len().saturating_sub(1);
        }
    }

    async fn reload(&mut self) -> Result<()> {
        self.store.reload().await?;
        self.projects = self.store.snapshot();
        self.rebuild_tree();
        self.status_message = Some("Reloaded".to_string());
        Ok(())
    }

    fn move_selection_up(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
        }
    }

    fn move_selection_down(&mut self) {
        if self.selected_index + 1 < self.rows.len() {
            self.selected_index += 1;
        }
    }

    fn set_current_expanded(&mut self, desired: Option<bool>) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if !row.has_children {
            return;
        }
        let key = row.key.clone();
        match desired {
            Some(expanded) => self.expansion.set_expanded(&key, expanded),
            None => self.expansion.toggle(&key),
        }
        self.rebuild_tree();
    }

    /// Commit the highlighted row as the selection
    fn select_current(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let link = row.link.clone();
        match link.kind() {
            RowKind::Bot => {
                let key = row.key.clone();
                self.expansion.toggle(&key);
                self.rebuild_tree();
            }
            RowKind::Dialog | RowKind::Trigger => self.on_select(&link),
        }
    }

    fn on_select(&mut self, link: &TreeLink) {
        tracing::debug!("Selected {}", link.row_key());
        self.selection = Selection::from_link(link);
        self.status_message = Some(format!("Selected {}", link.display_name));
    }

    fn request_delete(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        let link = &row.link;

        let pending = match (row.kind, &link.dialog_name) {
            (RowKind::Dialog, Some(dialog)) if link.is_root => {
                Err(format!("Cannot delete main dialog {dialog}"))
            }
            (RowKind::Dialog, Some(dialog)) => Ok(DeleteConfirm {
                project_id: link.target_project().to_string(),
                dialog_id: dialog.clone(),
                trigger: None,
                label: link.display_name.clone(),
            }),
            (RowKind::Trigger, Some(dialog)) => Ok(DeleteConfirm {
                project_id: link.target_project().to_string(),
                dialog_id: dialog.clone(),
                trigger: row.source_index,
                label: link.display_name.clone(),
            }),
            _ => Err("Bots cannot be deleted here".to_string()),
        };

        match pending {
            Ok(pending) => {
                self.delete_confirm = Some(pending);
                self.state = AppState::ConfirmDelete;
            }
            Err(msg) => self.status_message = Some(msg),
        }
    }

    async fn apply_delete(&mut self, pending: DeleteConfirm) -> Result<()> {
        let result = match pending.trigger {
            Some(index) => {
                self.store
                    .delete_trigger(&pending.project_id, &pending.dialog_id, index)
                    .await
            }
            None => {
                self.store
                    .delete_dialog(&pending.project_id, &pending.dialog_id)
                    .await
            }
        };

        match result {
            Ok(()) => {
                self.status_message = Some(format!("Deleted {}", pending.label));
                if self.selection.dialog_id.as_deref() == Some(pending.dialog_id.as_str()) {
                    self.selection.clear();
                }
            }
            Err(e) if matches!(e, crate::Error::NotFound(_) | crate::Error::InvalidInput(_)) => {
                self.status_message = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }

        self.projects = self.store.snapshot();
        self.rebuild_tree();
        Ok(())
    }

    fn selected_row(&self) -> Option<&TreeRow> {
        self.rows.get(self.selected_index)
    }

    // Accessors for rendering and tests

    pub fn rows(&self) -> &[TreeRow] {
        &self.rows
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn selected_item(&self) -> Option<&TreeRow> {
        self.selected_row()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_selected(&self, row: &TreeRow) -> bool {
        self.selection.is_selected(&row.link)
    }

    pub fn coach_mark(&self) -> Option<String> {
        self.coach_mark.borrow().clone()
    }

    pub fn keys(&self) -> &KeyBindings {
        &self.keys
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn search(&self) -> &SearchInput {
        &self.search
    }

    pub fn applied_filter(&self) -> &str {
        self.filter.applied()
    }

    pub fn filter_pending(&self) -> bool {
        self.filter.is_pending()
    }

    pub fn delete_confirm(&self) -> Option<&DeleteConfirm> {
        self.delete_confirm.as_ref()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn workspace_path(&self) -> &std::path::Path {
        self.store.path()
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }
}

/// Identity of the row under the cursor. Trigger row keys carry the
/// filtered index, so triggers are matched on their source index.
enum RowAnchor {
    Key(String),
    Trigger {
        project: String,
        dialog: Option<String>,
        source_index: usize,
    },
}

impl RowAnchor {
    fn of(row: &TreeRow) -> Self {
        match (row.kind, row.source_index) {
            (RowKind::Trigger, Some(source_index)) => RowAnchor::Trigger {
                project: row.link.target_project().to_string(),
                dialog: row.link.dialog_name.clone(),
                source_index,
            },
            _ => RowAnchor::Key(row.key.clone()),
        }
    }

    fn matches(&self, row: &TreeRow) -> bool {
        match self {
            RowAnchor::Key(key) => &row.key == key,
            RowAnchor::Trigger {
                project,
                dialog,
                source_index,
            } => {
                row.kind == RowKind::Trigger
                    && row.source_index == Some(*source_index)
                    && row.link.target_project() == project
                    && &row.link.dialog_name == dialog
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Dialog, Trigger};
    use tempfile::TempDir;

    async fn app_with(projects: Vec<Project>) -> (App, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path().join("workspace.json"))
            .await
            .unwrap();
        store.replace(projects).await.unwrap();
        (App::with_store(store, &ConfigFile::default()), dir)
    }

    fn bot1() -> Project {
        Project::new("p1", "Bot1")
            .with_dialog(Dialog::new("d1", "Main").root())
            .with_dialog(
                Dialog::new("d2", "Greeting")
                    .with_trigger(Trigger::named("Microsoft.OnIntent", "Hello"))
                    .with_trigger(Trigger::named("Microsoft.OnIntent", "Goodbye")),
            )
    }

    fn labels(app: &App) -> Vec<&str> {
        app.rows().iter().map(|r| r.label()).collect()
    }

    async fn press(app: &mut App, key: KeyCode) {
        app.handle_key(key, KeyModifiers::NONE).await.unwrap();
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c)).await;
        }
    }

    #[tokio::test]
    async fn test_initial_tree_and_coach_mark() {
        let (app, _dir) = app_with(vec![bot1()]).await;
        assert_eq!(labels(&app), vec!["Main", "Greeting", "Hello", "Goodbye"]);
        assert_eq!(app.coach_mark().as_deref(), Some("dialog:p1/d1"));
    }

    #[tokio::test]
    async fn test_search_is_debounced() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;

        press(&mut app, KeyCode::Char('/')).await;
        type_text(&mut app, "bye").await;
        assert_eq!(app.state(), AppState::Search);
        assert!(app.filter_pending());
        assert_eq!(labels(&app).len(), 4);

        app.tick(Instant::now() + Duration::from_millis(1100)).await;
        assert_eq!(app.applied_filter(), "bye");
        assert_eq!(labels(&app), vec!["Greeting", "Goodbye"]);
    }

    #[tokio::test]
    async fn test_search_enter_applies_and_esc_clears() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;

        press(&mut app, KeyCode::Char('/')).await;
        type_text(&mut app, "greet").await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.state(), AppState::Normal);
        assert_eq!(labels(&app), vec!["Greeting", "Hello", "Goodbye"]);

        press(&mut app, KeyCode::Char('/')).await;
        press(&mut app, KeyCode::Esc).await;
        assert_eq!(app.applied_filter(), "");
        assert!(!app.filter_pending());
        assert_eq!(labels(&app).len(), 4);
    }

    #[tokio::test]
    async fn test_select_trigger_uses_rendered_index() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;

        press(&mut app, KeyCode::Char('/')).await;
        type_text(&mut app, "good").await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(labels(&app), vec!["Greeting", "Goodbye"]);

        press(&mut app, KeyCode::Down).await;
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.selection().dialog_id.as_deref(), Some("d2"));
        assert_eq!(app.selection().path, "triggers[0]");
        assert!(app.is_selected(&app.rows()[1]));
    }

    #[tokio::test]
    async fn test_collapse_dialog() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;
        press(&mut app, KeyCode::Down).await;
        press(&mut app, KeyCode::Left).await;
        assert_eq!(labels(&app), vec!["Main", "Greeting"]);
        press(&mut app, KeyCode::Char(' ')).await;
        assert_eq!(labels(&app).len(), 4);
    }

    #[tokio::test]
    async fn test_delete_filtered_trigger_removes_source_trigger() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;

        press(&mut app, KeyCode::Char('/')).await;
        type_text(&mut app, "good").await;
        press(&mut app, KeyCode::Enter).await;
        press(&mut app, KeyCode::Down).await;

        press(&mut app, KeyCode::Char('d')).await;
        assert_eq!(app.state(), AppState::ConfirmDelete);
        assert_eq!(app.delete_confirm().and_then(|d| d.trigger), Some(1));
        press(&mut app, KeyCode::Char('y')).await;

        press(&mut app, KeyCode::Esc).await;
        assert_eq!(labels(&app), vec!["Main", "Greeting", "Hello"]);
    }

    #[tokio::test]
    async fn test_main_dialog_not_deletable() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;
        press(&mut app, KeyCode::Char('d')).await;
        assert_eq!(app.state(), AppState::Normal);
        assert!(app.status_message().is_some());
        assert_eq!(labels(&app).len(), 4);
    }

    #[tokio::test]
    async fn test_delete_cancelled() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;
        press(&mut app, KeyCode::Down).await;
        press(&mut app, KeyCode::Char('d')).await;
        press(&mut app, KeyCode::Esc).await;
        assert_eq!(app.state(), AppState::Normal);
        assert_eq!(labels(&app).len(), 4);
    }

    #[tokio::test]
    async fn test_multi_project_bot_rows() {
        let other = Project::new("p2", "Bot2").with_dialog(Dialog::new("e1", "Root").root());
        let (mut app, _dir) = app_with(vec![bot1(), other]).await;
        assert_eq!(labels(&app)[0], "Bot1");
        assert_eq!(app.rows().iter().filter(|r| r.kind == RowKind::Bot).count(), 2);

        // Enter on a bot row toggles it
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(labels(&app), vec!["Bot1", "Bot2", "Root"]);

        press(&mut app, KeyCode::Char('d')).await;
        assert_eq!(app.state(), AppState::Normal);
    }

    #[tokio::test]
    async fn test_cursor_follows_trigger_across_filter_change() {
        let (mut app, _dir) = app_with(vec![bot1()]).await;

        press(&mut app, KeyCode::Char('/')).await;
        type_text(&mut app, "good").await;
        press(&mut app, KeyCode::Enter).await;
        press(&mut app, KeyCode::Down).await;
        assert_eq!(app.selected_item().map(|r| r.label()), Some("Goodbye"));

        // Goodbye moves from filtered index 0 to index 1; Hello takes index 0
        press(&mut app, KeyCode::Esc).await;
        assert_eq!(labels(&app), vec!["Main", "Greeting", "Hello", "Goodbye"]);
        assert_eq!(app.selected_item().map(|r| r.label()), Some("Goodbye"));
        assert_eq!(app.selected_index(), 3);
    }
}
