mod app;
mod input;
mod render;

pub use app::App;
pub use input::SearchInput;

/// Application state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Normal,
    Search,
    ConfirmDelete,
    Help,
}

/// Pending delete awaiting confirmation
#[derive(Debug, Clone)]
pub struct DeleteConfirm {
    pub project_id: String,
    pub dialog_id: String,
    /// Unfiltered trigger position; `None` deletes the dialog itself
    pub trigger: Option<usize>,
    pub label: String,
}
