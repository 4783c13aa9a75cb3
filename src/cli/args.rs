use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "botnav")]
#[command(version, about = "Navigate the bots, dialogs and triggers of a workspace", long_about = None)]
pub struct Args {
    /// Workspace file (JSON or TOML)
    #[arg(short, long, global = true, env = "BOTNAV_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the bot/dialog/trigger tree
    Tree {
        /// Only show rows matching this text (case-insensitive)
        #[arg(short, long, default_value = "")]
        filter: String,

        /// Show bot headers only
        #[arg(long)]
        no_dialogs: bool,

        /// Hide trigger rows
        #[arg(long)]
        no_triggers: bool,

        /// Output rows as JSON
        #[arg(long)]
        json: bool,
    },

    /// List unsupported triggers
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version
    Version,
}
