mod model;
mod store;

pub use model::{Dialog, Project, Trigger};
pub use store::{ProjectStore, Workspace};
