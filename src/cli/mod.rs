mod args;
mod commands;

pub use args::{Args, Command};
pub use commands::{format_row, run_cli};
