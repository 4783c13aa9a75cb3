pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod project;
pub mod tree;
pub mod ui;

pub use error::{Error, Result};

/// Version of bot-navigator
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
