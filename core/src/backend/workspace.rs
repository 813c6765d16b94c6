use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use crate::error::PlanError;

/// A private directory for one run. Deleted with everything in it when
/// dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    pub async fn create(root: &Path, run_id: &str) -> Result<Self, PlanError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(PlanError::Workspace)?;
        let root = root.to_path_buf();
        let prefix = format!("run-{run_id}-");
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(root)
        })
        .await
        .map_err(|e| PlanError::Workspace(std::io::Error::other(e)))?
        .map_err(PlanError::Workspace)?;
        let path = dir.path().to_path_buf();
        tracing::debug!(target: "txscope.workspace", path = %path.display(), "workspace created");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn create_dir(&self, rel: impl AsRef<Path>) -> Result<PathBuf, PlanError> {
        let target = self.resolve(rel.as_ref())?;
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(PlanError::Workspace)?;
        Ok(target)
    }

    /// Writes `contents` to `rel` inside the workspace, creating parent
    /// directories. `rel` must stay inside the workspace.
    pub async fn write_file(&self, rel: impl AsRef<Path>, contents: &[u8]) -> Result<PathBuf, PlanError> {
        let target = self.resolve(rel.as_ref())?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(PlanError::Workspace)?;
        }
        tokio::fs::write(&target, contents)
            .await
            .map_err(PlanError::Workspace)?;
        Ok(target)
    }

    fn resolve(&self, rel: &Path) -> Result<PathBuf, PlanError> {
        let escapes = rel.as_os_str().is_empty()
            || rel.is_absolute()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(PlanError::Config(format!(
                "workspace path `{}` must be relative and stay inside the workspace",
                rel.display()
            )));
        }
        Ok(self.path.join(rel))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => {
                tracing::debug!(target: "txscope.workspace", path = %self.path.display(), "workspace removed")
            }
            Err(e) => tracing::warn!(
                target: "txscope.workspace",
                path = %self.path.display(),
                error = %e,
                "failed to remove workspace"
            ),
        }
    }
}
