use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::TriggerCatalog;
use crate::cli::{Args, Command};
use crate::config::ConfigFile;
use crate::error::{Error, Result};
use crate::project::{Project, ProjectStore};
use crate::tree::{flatten, ExpansionState, RowRefs, TreeBuilder, TreeOptions, TreeRow};

pub async fn run_cli(args: Args) -> Result<()> {
    let workspace = match args.workspace {
        Some(path) => path,
        None => ProjectStore::default_path()?,
    };

    match args.command {
        Some(Command::Tree {
            filter,
            no_dialogs,
            no_triggers,
            json,
        }) => handle_tree(workspace, &filter, no_dialogs, no_triggers, json).await,

        Some(Command::Check { json }) => handle_check(workspace, json).await,

        Some(Command::Version) => {
            println!("botnav v{}", crate::VERSION);
            Ok(())
        }

        None => {
            let mut app = crate::ui::App::new(&workspace).await?;
            app.run().await
        }
    }
}

async fn handle_tree(
    workspace: PathBuf,
    filter: &str,
    no_dialogs: bool,
    no_triggers: bool,
    json: bool,
) -> Result<()> {
    let store = ProjectStore::open(&workspace).await?;
    let config = ConfigFile::load().await?.unwrap_or_default();
    let catalog = config.catalog();

    let defaults = config.tree_options();
    let options = TreeOptions {
        show_dialogs: defaults.show_dialogs && !no_dialogs,
        show_triggers: defaults.show_triggers && !no_triggers,
    };

    let builder = TreeBuilder::new(&catalog).with_options(options);
    let nodes = builder.build(&store.snapshot(), filter, &mut RowRefs::new());
    let rows = flatten(&nodes, &ExpansionState::new());

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("(no rows)");
        return Ok(());
    }
    for row in &rows {
        println!("{}", format_row(row));
    }
    Ok(())
}

/// Plain-text rendering of one row
pub fn format_row(row: &TreeRow) -> String {
    let mut line = format!("{}{}", "  ".repeat(row.depth), row.label());
    if row.link.is_root && row.link.dialog_name.is_some() {
        line.push_str(" *");
    }
    if row.is_remote && row.link.dialog_name.is_none() {
        line.push_str(" (remote)");
    }
    match &row.link.warning_content {
        Some(w) => line.push_str(&format!("  [warning: {w}]")),
        None if row.warning => line.push_str("  [warning]"),
        None => {}
    }
    line
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Finding {
    project_id: String,
    dialog_id: String,
    trigger: usize,
    kind: String,
    warning: String,
}

fn find_unsupported(projects: &[Project], catalog: &dyn TriggerCatalog) -> Vec<Finding> {
    let mut findings = Vec::new();
    for project in projects {
        for dialog in &project.dialogs {
            for (i, trigger) in dialog.triggers.iter().enumerate() {
                let Some(warning) = catalog
                    .unsupported_warning(dialog, trigger)
                    .filter(|w| !w.is_empty())
                else {
                    continue;
                };
                findings.push(Finding {
                    project_id: project.project_id.clone(),
                    dialog_id: dialog.id.clone(),
                    trigger: i,
                    kind: trigger.kind.clone(),
                    warning,
                });
            }
        }
    }
    findings
}

async fn handle_check(workspace: PathBuf, json: bool) -> Result<()> {
    let store = ProjectStore::open(&workspace).await?;
    let config = ConfigFile::load().await?.unwrap_or_default();
    let catalog = config.catalog();

    let findings = find_unsupported(&store.snapshot(), &catalog);

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    } else if findings.is_empty() {
        println!("All triggers supported.");
    } else {
        for f in &findings {
            println!(
                "{}/{} triggers[{}]: {}",
                f.project_id, f.dialog_id, f.trigger, f.warning
            );
        }
    }

    if findings.is_empty() {
        Ok(())
    } else {
        Err(Error::Other(format!(
            "{} unsupported trigger(s) found",
            findings.len()
        )))
    }
}
