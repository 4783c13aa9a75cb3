use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::Project;
use crate::error::{Error, Result};

const MAX_BACKUP_GENERATIONS: usize = 3;

/// Workspace file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Format::Toml,
            _ => Format::Json,
        }
    }

    fn parse(self, content: &str) -> Result<Workspace> {
        Ok(match self {
            Format::Json => serde_json::from_str(content)?,
            Format::Toml => toml::from_str(content)?,
        })
    }

    fn render(self, workspace: &Workspace) -> Result<String> {
        Ok(match self {
            Format::Json => serde_json::to_string_pretty(workspace)?,
            Format::Toml => toml::to_string_pretty(workspace)?,
        })
    }
}

/// Owns the project data. Readers get immutable snapshots; only the
/// store mutates.
pub struct ProjectStore {
    path: PathBuf,
    format: Format,
    projects: Arc<[Project]>,
    modified: Option<SystemTime>,
    lock: Mutex<()>,
}

impl ProjectStore {
    /// Open a workspace file. A missing file is an empty workspace.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            format: Format::from_path(&path),
            path,
            projects: Arc::from(Vec::new()),
            modified: None,
            lock: Mutex::new(()),
        };
        store.reload().await?;
        Ok(store)
    }

    /// Get bot-navigator base directory
    pub fn base_dir() -> Result<PathBuf> {
        let home =
            dirs::home_dir().ok_or_else(|| Error::config("Cannot determine home directory"))?;
        Ok(home.join(".botnav"))
    }

    /// Default workspace location
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("workspace.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consistent snapshot of the current projects
    pub fn snapshot(&self) -> Arc<[Project]> {
        Arc::clone(&self.projects)
    }

    /// Re-read the workspace file
    pub async fn reload(&mut self) -> Result<()> {
        if !self.path.exists() {
            tracing::debug!("Workspace {} does not exist yet", self.path.display());
            self.projects = Arc::from(Vec::new());
            self.modified = None;
            return Ok(());
        }

        let content = fs::read_to_string(&self.path).await?;
        let workspace = self.format.parse(&content)?;
        self.modified = self.current_mtime().await;
        tracing::debug!(
            "Loaded {} project(s) from {}",
            workspace.projects.len(),
            self.path.display()
        );
        self.projects = Arc::from(workspace.projects);
        Ok(())
    }

    /// Reload when the file changed on disk since the last read or write
    pub async fn reload_if_changed(&mut self) -> Result<bool> {
        let mtime = self.current_mtime().await;
        if mtime == self.modified {
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    /// Replace all projects and persist. The snapshot only changes once
    /// the file is written.
    pub async fn replace(&mut self, projects: Vec<Project>) -> Result<()> {
        self.write(&projects).await?;
        self.projects = Arc::from(projects);
        Ok(())
    }

    /// Save the current projects
    pub async fn save(&mut self) -> Result<()> {
        let projects = self.projects.to_vec();
        self.write(&projects).await
    }

    async fn write(&mut self, projects: &[Project]) -> Result<()> {
        {
            let _lock = self.lock.lock();

            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }

            self.create_backup().await?;

            let workspace = Workspace {
                projects: projects.to_vec(),
                updated_at: Some(Utc::now()),
            };
            let content = self.format.render(&workspace)?;

            // Atomic write: write to temp file, then rename
            let temp_path = self.path.with_extension("tmp");
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);

            fs::rename(&temp_path, &self.path).await?;
        }

        self.modified = self.current_mtime().await;
        tracing::debug!("Saved workspace {}", self.path.display());
        Ok(())
    }

    /// Delete a dialog. The main dialog cannot be deleted.
    pub async fn delete_dialog(&mut self, project_id: &str, dialog_id: &str) -> Result<()> {
        let mut projects = self.projects.to_vec();
        let project = find_project(&mut projects, project_id)?;

        let idx = project
            .dialogs
            .iter()
            .position(|d| d.id == dialog_id)
            .ok_or_else(|| Error::not_found(format!("dialog '{dialog_id}'")))?;
        if project.dialogs[idx].is_root {
            return Err(Error::invalid_input(format!(
                "Cannot delete main dialog '{dialog_id}'"
            )));
        }

        project.dialogs.remove(idx);
        tracing::debug!("Deleted dialog {} from {}", dialog_id, project_id);
        self.replace(projects).await
    }

    /// Delete the trigger at `index` in the dialog's unfiltered trigger list
    pub async fn delete_trigger(
        &mut self,
        project_id: &str,
        dialog_id: &str,
        index: usize,
    ) -> Result<()> {
        let mut projects = self.projects.to_vec();
        let project = find_project(&mut projects, project_id)?;

        let dialog = project
            .dialogs
            .iter_mut()
            .find(|d| d.id == dialog_id)
            .ok_or_else(|| Error::not_found(format!("dialog '{dialog_id}'")))?;
        if index >= dialog.triggers.len() {
            return Err(Error::not_found(format!(
                "trigger {index} in dialog '{dialog_id}'"
            )));
        }

        let removed = dialog.triggers.remove(index);
        tracing::debug!(
            "Deleted trigger {} ({}) from {}/{}",
            index,
            removed.kind,
            project_id,
            dialog_id
        );
        self.replace(projects).await
    }

    async fn current_mtime(&self) -> Option<SystemTime> {
        let meta = fs::metadata(&self.path).await.ok()?;
        meta.modified().ok()
    }

    /// Create rolling backup
    async fn create_backup(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        // Roll backups: .bak.2 -> .bak.3, .bak -> .bak.2
        for i in (1..MAX_BACKUP_GENERATIONS).rev() {
            let from = if i == 1 {
                self.path.with_extension("bak")
            } else {
                self.path.with_extension(format!("bak.{}", i))
            };
            let to = self.path.with_extension(format!("bak.{}", i + 1));

            if from.exists() {
                if to.exists() {
                    let _ = fs::remove_file(&to).await;
                }
                fs::rename(&from, &to).await?;
            }
        }

        let bak = self.path.with_extension("bak");
        if bak.exists() {
            let _ = fs::remove_file(&bak).await;
        }
        fs::copy(&self.path, &bak).await?;

        Ok(())
    }
}

fn find_project<'a>(projects: &'a mut [Project], project_id: &str) -> Result<&'a mut Project> {
    projects
        .iter_mut()
        .find(|p| p.project_id == project_id)
        .ok_or_else(|| Error::not_found(format!("project '{project_id}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Dialog, Trigger};
    use tempfile::tempdir;

    fn sample() -> Vec<Project> {
        vec![Project::new("p1", "Bot1")
            .with_dialog(Dialog::new("d1", "Main").root())
            .with_dialog(
                Dialog::new("d2", "Greeting")
                    .with_trigger(Trigger::named("Microsoft.OnIntent", "Hello"))
                    .with_trigger(Trigger::new("Microsoft.OnUnknownIntent")),
            )]
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = ProjectStore::open(dir.path().join("workspace.json"))
            .await
            .unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workspace.json");

        let mut store = ProjectStore::open(&path).await.unwrap();
        store.replace(sample()).await.unwrap();

        let loaded = ProjectStore::open(&path).await.unwrap();
        assert_eq!(&*loaded.snapshot(), sample().as_slice());
    }

    #[tokio::test]
    async fn test_toml_workspace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workspace.toml");

        let mut store = ProjectStore::open(&path).await.unwrap();
        store.replace(sample()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[[projects]]"));

        let loaded = ProjectStore::open(&path).await.unwrap();
        assert_eq!(&*loaded.snapshot(), sample().as_slice());
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_across_writes() {
        let dir = tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path().join("workspace.json"))
            .await
            .unwrap();
        store.replace(sample()).await.unwrap();

        let before = store.snapshot();
        store.delete_dialog("p1", "d2").await.unwrap();

        assert_eq!(before[0].dialogs.len(), 2);
        assert_eq!(store.snapshot()[0].dialogs.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_root_dialog_refused() {
        let dir = tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path().join("workspace.json"))
            .await
            .unwrap();
        store.replace(sample()).await.unwrap();

        let err = store.delete_dialog("p1", "d1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.snapshot()[0].dialogs.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_trigger() {
        let dir = tempdir().unwrap();
        let mut store = ProjectStore::open(dir.path().join("workspace.json"))
            .await
            .unwrap();
        store.replace(sample()).await.unwrap();

        store.delete_trigger("p1", "d2", 0).await.unwrap();
        let triggers = &store.snapshot()[0].dialogs[1].triggers;
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, "Microsoft.OnUnknownIntent");

        let err = store.delete_trigger("p1", "d2", 5).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = store.delete_trigger("nope", "d2", 0).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_backups_roll() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workspace.json");
        let mut store = ProjectStore::open(&path).await.unwrap();

        for _ in 0..4 {
            store.replace(sample()).await.unwrap();
        }

        assert!(path.with_extension("bak").exists());
        assert!(path.with_extension("bak.2").exists());
        assert!(path.with_extension("bak.3").exists());
        assert!(!path.with_extension("bak.4").exists());
    }

    #[tokio::test]
    async fn test_reload_if_changed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workspace.json");
        let mut store = ProjectStore::open(&path).await.unwrap();
        store.replace(sample()).await.unwrap();

        assert!(!store.reload_if_changed().await.unwrap());

        std::fs::remove_file(&path).unwrap();
        assert!(store.reload_if_changed().await.unwrap());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workspace.json");
        let mut store = ProjectStore::open(&path).await.unwrap();
        store.replace(sample()).await.unwrap();

        // A directory at the temp path makes the atomic write fail
        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        assert!(store.delete_trigger("p1", "d2", 0).await.is_err());
        assert_eq!(store.snapshot()[0].dialogs[1].triggers.len(), 2);
        assert!(store.delete_dialog("p1", "d2").await.is_err());
        assert_eq!(store.snapshot()[0].dialogs.len(), 2);

        let on_disk = ProjectStore::open(&path).await.unwrap();
        assert_eq!(&*on_disk.snapshot(), &*store.snapshot());
    }
}
