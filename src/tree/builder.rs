use std::collections::HashSet;
use std::fmt;

use crate::catalog::{has_warning, TriggerCatalog};
use crate::project::{Dialog, Project, Trigger};

use super::{RowKind, TreeLink, TreeNode, TreeOptions};

type RegisterFn = Box<dyn FnMut(RowKind, &TreeLink)>;

/// Guards the one-shot row registration (the onboarding coach mark).
///
/// One instance lives as long as the mounted view; a row key registers
/// at most once no matter how often the tree is rebuilt.
#[derive(Default)]
pub struct RowRefs {
    registered: HashSet<String>,
    on_register: Option<RegisterFn>,
}

impl RowRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(f: impl FnMut(RowKind, &TreeLink) + 'static) -> Self {
        Self {
            registered: HashSet::new(),
            on_register: Some(Box::new(f)),
        }
    }

    /// Returns true the first time `link`'s row is seen
    pub fn register_once(&mut self, kind: RowKind, link: &TreeLink) -> bool {
        if !self.registered.insert(link.row_key()) {
            return false;
        }
        if let Some(f) = self.on_register.as_mut() {
            f(kind, link);
        }
        true
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.registered.contains(key)
    }

    /// Forget registrations, as on a fresh mount
    pub fn reset(&mut self) {
        self.registered.clear();
    }
}

impl fmt::Debug for RowRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowRefs")
            .field("registered", &self.registered)
            .field("has_callback", &self.on_register.is_some())
            .finish()
    }
}

/// Builds the display tree from a project snapshot
pub struct TreeBuilder<'a> {
    catalog: &'a dyn TriggerCatalog,
    options: TreeOptions,
}

/// Per-project addressing shared by every row of one bot
struct BotScope<'p> {
    project: &'p Project,
    root_project_id: &'p str,
    skill_id: Option<&'p str>,
    first: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(catalog: &'a dyn TriggerCatalog) -> Self {
        Self {
            catalog,
            options: TreeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TreeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> TreeOptions {
        self.options
    }

    /// Build the tree for `projects` narrowed by `filter`.
    ///
    /// A single project is rendered without a bot header. The first
    /// project is the root bot; the others are addressed as skills of it.
    pub fn build(&self, projects: &[Project], filter: &str, refs: &mut RowRefs) -> Vec<TreeNode> {
        let Some(first) = projects.first() else {
            return Vec::new();
        };
        let needle = filter.to_lowercase();

        if projects.len() == 1 {
            let scope = BotScope {
                project: first,
                root_project_id: &first.project_id,
                skill_id: None,
                first: true,
            };
            return self.dialog_nodes(&scope, &needle, 0, refs);
        }

        projects
            .iter()
            .enumerate()
            .map(|(i, project)| {
                let scope = BotScope {
                    project,
                    root_project_id: &first.project_id,
                    skill_id: (i > 0).then_some(project.project_id.as_str()),
                    first: i == 0,
                };
                self.bot_node(&scope, &needle, refs)
            })
            .collect()
    }

    /// Resolved display name of a trigger
    pub fn trigger_name(&self, trigger: &Trigger) -> String {
        match trigger.explicit_name() {
            Some(name) => name.to_string(),
            None => self.catalog.friendly_name(&trigger.kind),
        }
    }

    /// Whether the dialog header survives `needle` (already lowercased)
    fn dialog_matches(&self, dialog: &Dialog, needle: &str) -> bool {
        needle.is_empty()
            || contains(&dialog.display_name, needle)
            || dialog
                .triggers
                .iter()
                .any(|t| contains(&self.trigger_name(t), needle))
    }

    fn bot_node(&self, scope: &BotScope<'_>, needle: &str, refs: &mut RowRefs) -> TreeNode {
        let project = scope.project;
        let warning = project.dialogs.iter().any(|d| {
            d.triggers
                .iter()
                .any(|t| has_warning(self.catalog.unsupported_warning(d, t)))
        });
        let error = bot_has_errors(project);

        let children = if self.options.show_dialogs {
            self.dialog_nodes(scope, needle, 1, refs)
        } else {
            Vec::new()
        };

        TreeNode {
            link: TreeLink {
                display_name: project.name.clone(),
                is_root: scope.first,
                project_id: scope.root_project_id.to_string(),
                skill_id: scope.skill_id.map(str::to_string),
                dialog_name: None,
                trigger: None,
                warning_content: None,
                error_content: None,
            },
            depth: 0,
            warning,
            error,
            is_remote: project.is_remote,
            source_index: None,
            children,
        }
    }

    fn dialog_nodes(
        &self,
        scope: &BotScope<'_>,
        needle: &str,
        depth: usize,
        refs: &mut RowRefs,
    ) -> Vec<TreeNode> {
        let mut dialogs: Vec<&Dialog> = scope.project.dialogs.iter().collect();
        // Stable: only the root/non-root partition moves
        dialogs.sort_by_key(|d| !d.is_root);

        let mut nodes = Vec::new();
        for dialog in dialogs {
            if !self.dialog_matches(dialog, needle) {
                continue;
            }

            let link = TreeLink {
                display_name: dialog.display_name.clone(),
                is_root: dialog.is_root,
                project_id: scope.root_project_id.to_string(),
                skill_id: scope.skill_id.map(str::to_string),
                dialog_name: Some(dialog.id.clone()),
                trigger: None,
                warning_content: None,
                error_content: None,
            };

            if scope.first && dialog.is_root {
                refs.register_once(RowKind::Dialog, &link);
            }

            let children = if self.options.show_triggers {
                self.trigger_nodes(scope, dialog, needle, depth + 1)
            } else {
                Vec::new()
            };

            nodes.push(TreeNode {
                link,
                depth,
                warning: self.catalog.dialog_has_unsupported(dialog),
                error: false,
                is_remote: scope.project.is_remote,
                source_index: None,
                children,
            });
        }
        nodes
    }

    fn trigger_nodes(
        &self,
        scope: &BotScope<'_>,
        dialog: &Dialog,
        needle: &str,
        depth: usize,
    ) -> Vec<TreeNode> {
        let dialog_hit = needle.is_empty() || contains(&dialog.display_name, needle);

        dialog
            .triggers
            .iter()
            .enumerate()
            .filter_map(|(source_index, trigger)| {
                let name = self.trigger_name(trigger);
                (dialog_hit || contains(&name, needle)).then_some((source_index, trigger, name))
            })
            .enumerate()
            .map(|(shown_index, (source_index, trigger, name))| {
                let warning_content = self
                    .catalog
                    .unsupported_warning(dialog, trigger)
                    .filter(|w| !w.is_empty());
                TreeNode {
                    warning: warning_content.is_some(),
                    link: TreeLink {
                        display_name: name,
                        is_root: false,
                        project_id: scope.root_project_id.to_string(),
                        skill_id: scope.skill_id.map(str::to_string),
                        dialog_name: Some(dialog.id.clone()),
                        trigger: Some(shown_index),
                        warning_content,
                        error_content: None,
                    },
                    depth,
                    error: false,
                    is_remote: scope.project.is_remote,
                    source_index: Some(source_index),
                    children: Vec::new(),
                }
            })
            .collect()
    }
}

/// Bot-level error detection is not wired to anything yet.
fn bot_has_errors(_project: &Project) -> bool {
    false
}

/// Case-insensitive substring test; `needle` must already be lowercase
fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
