//! Per-execution scratch workspaces
//!
//! Each execution gets a fresh `<scratch>/<uuid>/` directory holding its
//! source file and, for compiled languages, the reserved artifact path. The
//! returned [`Workspace`] is a guard: [`Workspace::release`] removes the
//! directory, and dropping an unreleased guard removes it synchronously.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::profile::LanguageProfile;

const SOURCE_STEM: &str = "main";
const FALLBACK_EXTENSION: &str = "src";

#[cfg(windows)]
const ARTIFACT_NAME: &str = "main.exe";
#[cfg(not(windows))]
const ARTIFACT_NAME: &str = "main";

/// Allocates workspaces under a shared scratch directory
#[derive(Debug)]
pub struct WorkspaceManager {
    scratch_dir: PathBuf,
    initialized: OnceCell<()>,
}

impl WorkspaceManager {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            initialized: OnceCell::new(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Create the scratch directory if needed; runs at most once successfully
    pub async fn ensure_scratch_dir(&self) -> Result<(), ExecutionError> {
        self.initialized
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.scratch_dir).await.map_err(|e| {
                    ExecutionError::WorkspaceError(format!(
                        "failed to create scratch directory {}: {}",
                        self.scratch_dir.display(),
                        e
                    ))
                })
            })
            .await?;
        Ok(())
    }

    /// Create a workspace for one execution and write `code` into its source file
    pub async fn allocate(&self, profile: &LanguageProfile, code: &str) -> Result<Workspace, ExecutionError> {
        self.ensure_scratch_dir().await?;

        let id = Uuid::new_v4();
        let root = self.scratch_dir.join(id.to_string());

        // create_dir (not create_dir_all) so a name collision is an error
        fs::create_dir(&root).await.map_err(|e| {
            ExecutionError::WorkspaceError(format!("failed to create workspace {}: {}", root.display(), e))
        })?;

        let extension = profile.file_extension.as_deref().unwrap_or(FALLBACK_EXTENSION);
        let source_path = root.join(format!("{}.{}", SOURCE_STEM, extension));
        let artifact_path = profile
            .requires_compilation()
            .then(|| root.join(ARTIFACT_NAME));

        let workspace = Workspace {
            id,
            root,
            source_path,
            artifact_path,
            released: false,
        };

        // An error here drops the guard, which removes the directory
        fs::write(&workspace.source_path, code).await.map_err(|e| {
            ExecutionError::WorkspaceError(format!(
                "failed to write source file {}: {}",
                workspace.source_path.display(),
                e
            ))
        })?;

        debug!("Allocated workspace {} for {}", workspace.id, profile.name);
        Ok(workspace)
    }
}

/// Private directory owned by exactly one execution
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    root: PathBuf,
    source_path: PathBuf,
    artifact_path: Option<PathBuf>,
    released: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Reserved artifact path; only present for compiled languages
    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    /// Remove the workspace directory. Failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!("Released workspace {}", self.id),
            Err(e) => warn!("Failed to remove workspace {}: {}", self.root.display(), e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove workspace {}: {}", self.root.display(), e);
            }
        } else {
            debug!("Removed abandoned workspace {}", self.id);
        }
    }
}
