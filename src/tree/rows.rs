use std::collections::HashSet;

use serde::Serialize;

use super::{RowKind, TreeLink, TreeNode};

/// A visible row, in draw order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRow {
    pub key: String,
    pub kind: RowKind,
    pub depth: usize,
    pub link: TreeLink,
    pub warning: bool,
    pub error: bool,
    pub is_remote: bool,
    pub has_children: bool,
    pub expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
}

impl TreeRow {
    pub fn label(&self) -> &str {
        &self.link.display_name
    }
}

/// Collapse state keyed by row key. Rows are expanded unless collapsed.
#[derive(Debug, Clone, Default)]
pub struct ExpansionState {
    collapsed: HashSet<String>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        !self.collapsed.contains(key)
    }

    pub fn set_expanded(&mut self, key: &str, expanded: bool) {
        if expanded {
            self.collapsed.remove(key);
        } else {
            self.collapsed.insert(key.to_string());
        }
    }

    pub fn toggle(&mut self, key: &str) {
        let next = !self.is_expanded(key);
        self.set_expanded(key, next);
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }
}

/// Flatten the nested tree into visible rows
pub fn flatten(nodes: &[TreeNode], expansion: &ExpansionState) -> Vec<TreeRow> {
    fn visit(node: &TreeNode, expansion: &ExpansionState, rows: &mut Vec<TreeRow>) {
        let key = node.key();
        let expanded = expansion.is_expanded(&key);

        rows.push(TreeRow {
            kind: node.kind(),
            depth: node.depth,
            link: node.link.clone(),
            warning: node.warning,
            error: node.error,
            is_remote: node.is_remote,
            has_children: !node.children.is_empty(),
            expanded,
            source_index: node.source_index,
            key,
        });

        if !expanded {
            return;
        }
        for child in &node.children {
            visit(child, expansion, rows);
        }
    }

    let mut rows = Vec::new();
    for node in nodes {
        visit(node, expansion, &mut rows);
    }
    rows
}

/// The caller's current selection: a dialog id plus a path inside it.
///
/// An empty path selects the dialog itself; `triggers[N]` selects the
/// N-th trigger as currently rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub dialog_id: Option<String>,
    pub path: String,
}

impl Selection {
    pub fn from_link(link: &TreeLink) -> Self {
        Self {
            dialog_id: link.dialog_name.clone(),
            path: link.trigger.map(trigger_path).unwrap_or_default(),
        }
    }

    pub fn is_selected(&self, link: &TreeLink) -> bool {
        match (&self.dialog_id, &link.dialog_name) {
            (Some(selected), Some(dialog)) if selected == dialog => match link.trigger {
                Some(index) => self.path == trigger_path(index),
                None => self.path.is_empty(),
            },
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.dialog_id = None;
        self.path.clear();
    }
}

fn trigger_path(index: usize) -> String {
    format!("triggers[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuiltinCatalog;
    use crate::project::{Dialog, Project, Trigger};
    use crate::tree::{RowRefs, TreeBuilder};

    fn nodes() -> Vec<TreeNode> {
        let projects = [
            Project::new("p1", "Bot1").with_dialog(
                Dialog::new("d1", "Main")
                    .root()
                    .with_trigger(Trigger::new("Microsoft.OnBeginDialog")),
            ),
            Project::new("p2", "Bot2").with_dialog(
                Dialog::new("e1", "Root")
                    .root()
                    .with_trigger(Trigger::new("Microsoft.OnError"))
                    .with_trigger(Trigger::new("Microsoft.OnIntent")),
            ),
        ];
        let catalog = BuiltinCatalog::new();
        TreeBuilder::new(&catalog).build(&projects, "", &mut RowRefs::new())
    }

    #[test]
    fn test_flatten_order_and_depth() {
        let rows = flatten(&nodes(), &ExpansionState::new());
        let shape: Vec<(RowKind, usize)> = rows.iter().map(|r| (r.kind, r.depth)).collect();
        assert_eq!(
            shape,
            vec![
                (RowKind::Bot, 0),
                (RowKind::Dialog, 1),
                (RowKind::Trigger, 2),
                (RowKind::Bot, 0),
                (RowKind::Dialog, 1),
                (RowKind::Trigger, 2),
                (RowKind::Trigger, 2),
            ]
        );
        assert!(rows[0].has_children);
        assert!(!rows[2].has_children);
    }

    #[test]
    fn test_collapsed_rows_hide_children() {
        let mut expansion = ExpansionState::new();
        expansion.set_expanded("bot:p1", false);
        expansion.toggle("dialog:p2/e1");

        let rows = flatten(&nodes(), &expansion);
        let labels: Vec<&str> = rows.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["Bot1", "Bot2", "Root"]);
        assert!(!rows[0].expanded);

        expansion.expand_all();
        assert_eq!(flatten(&nodes(), &expansion).len(), 7);
    }

    #[test]
    fn test_selection_matches_links() {
        let rows = flatten(&nodes(), &ExpansionState::new());
        let second_trigger = &rows[6].link;

        let selection = Selection::from_link(second_trigger);
        assert_eq!(selection.dialog_id.as_deref(), Some("e1"));
        assert_eq!(selection.path, "triggers[1]");

        let selected: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| selection.is_selected(&r.link))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(selected, vec![6]);
    }

    #[test]
    fn test_dialog_selection() {
        let rows = flatten(&nodes(), &ExpansionState::new());
        let mut selection = Selection::from_link(&rows[1].link);
        assert!(selection.is_selected(&rows[1].link));
        assert!(!selection.is_selected(&rows[2].link));
        assert!(!selection.is_selected(&rows[0].link));

        selection.clear();
        assert!(rows.iter().all(|r| !selection.is_selected(&r.link)));
    }
}
