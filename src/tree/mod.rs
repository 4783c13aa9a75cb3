//! Bot → dialog → trigger display model.
//!
//! [`TreeBuilder`] turns a snapshot of projects into nested [`TreeNode`]s;
//! [`flatten`] turns those into the rows a list widget draws.

mod builder;
mod rows;

pub use builder::{RowRefs, TreeBuilder};
pub use rows::{flatten, ExpansionState, Selection, TreeRow};

use serde::Serialize;

/// Which kind of row a [`TreeLink`] addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Bot,
    Dialog,
    Trigger,
}

/// Addressing record for one row, handed to select/delete callbacks.
///
/// `trigger` set means a trigger leaf, `dialog_name` set without `trigger`
/// means a dialog header, neither means a bot header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeLink {
    pub display_name: String,
    pub is_root: bool,
    pub project_id: String,
    pub skill_id: Option<String>,
    pub dialog_name: Option<String>,
    pub trigger: Option<usize>,
    pub warning_content: Option<String>,
    pub error_content: Option<String>,
}

impl TreeLink {
    pub fn kind(&self) -> RowKind {
        match (&self.dialog_name, self.trigger) {
            (_, Some(_)) => RowKind::Trigger,
            (Some(_), None) => RowKind::Dialog,
            (None, None) => RowKind::Bot,
        }
    }

    /// Id of the project that owns the addressed row
    pub fn target_project(&self) -> &str {
        self.skill_id.as_deref().unwrap_or(&self.project_id)
    }

    /// Stable key used for expansion state and one-shot registration
    pub fn row_key(&self) -> String {
        let project = self.target_project();
        match (&self.dialog_name, self.trigger) {
            (Some(dialog), Some(index)) => format!("trigger:{project}/{dialog}/{index}"),
            (None, Some(index)) => format!("trigger:{project}//{index}"),
            (Some(dialog), None) => format!("dialog:{project}/{dialog}"),
            (None, None) => format!("bot:{project}"),
        }
    }
}

/// Display switches for a build pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    pub show_dialogs: bool,
    pub show_triggers: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            show_dialogs: true,
            show_triggers: true,
        }
    }
}

/// One node of the built tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub link: TreeLink,
    pub depth: usize,
    /// Bot/dialog: some trigger below is unsupported. Trigger: this one is.
    pub warning: bool,
    /// Always false for now; reserved for bot-level error reporting
    pub error: bool,
    pub is_remote: bool,
    /// Position of a trigger in its dialog before filtering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn kind(&self) -> RowKind {
        self.link.kind()
    }

    pub fn label(&self) -> &str {
        &self.link.display_name
    }

    pub fn key(&self) -> String {
        self.link.row_key()
    }

    /// Depth-first walk over this node and its descendants
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a TreeNode>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> TreeLink {
        TreeLink {
            display_name: "Bot1".to_string(),
            is_root: true,
            project_id: "p1".to_string(),
            skill_id: None,
            dialog_name: None,
            trigger: None,
            warning_content: None,
            error_content: None,
        }
    }

    #[test]
    fn test_link_kind() {
        let mut l = link();
        assert_eq!(l.kind(), RowKind::Bot);
        l.dialog_name = Some("d1".to_string());
        assert_eq!(l.kind(), RowKind::Dialog);
        l.trigger = Some(0);
        assert_eq!(l.kind(), RowKind::Trigger);
    }

    #[test]
    fn test_row_key_uses_skill() {
        let mut l = link();
        l.skill_id = Some("p2".to_string());
        l.dialog_name = Some("d1".to_string());
        assert_eq!(l.target_project(), "p2");
        assert_eq!(l.row_key(), "dialog:p2/d1");
        l.trigger = Some(3);
        assert_eq!(l.row_key(), "trigger:p2/d1/3");
    }
}
