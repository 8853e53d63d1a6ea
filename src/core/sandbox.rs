use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::fs;
use uuid::Uuid;

use crate::{
    constants::{SANDBOX_DIR_PREFIX, SOURCE_FILE_NAME},
    core::{domain::SubmittedProgram, traits::executor::SandboxError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retention {
    Remove,
    Keep,
    Disposed,
}

/// A uniquely named working directory owned by one request.
///
/// The directory is removed by [`Sandbox::dispose`], or on drop if the
/// sandbox was never disposed or kept.
#[derive(Debug)]
pub struct Sandbox {
    dir: PathBuf,
    retention: Retention,
}

impl Sandbox {
    pub async fn create(root: &Path) -> Result<Self, SandboxError> {
        fs::create_dir_all(root)
            .await
            .map_err(|source| SandboxError::Setup {
                path: root.to_path_buf(),
                source,
            })?;

        let dir = root.join(format!("{}{}", SANDBOX_DIR_PREFIX, Uuid::new_v4()));
        fs::create_dir(&dir)
            .await
            .map_err(|source| SandboxError::Setup {
                path: dir.clone(),
                source,
            })?;

        tracing::debug!(dir = %dir.display(), "Sandbox created");
        Ok(Self {
            dir,
            retention: Retention::Remove,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub async fn write_source(&self, program: &SubmittedProgram) -> Result<PathBuf, SandboxError> {
        let source_path = self.path_of(SOURCE_FILE_NAME);
        fs::write(&source_path, program.as_bytes())
            .await
            .map_err(|source| SandboxError::Setup {
                path: source_path.clone(),
                source,
            })?;

        Ok(source_path)
    }

    /// Leaves the directory on disk for post-mortem inspection.
    pub fn keep(mut self) -> PathBuf {
        self.retention = Retention::Keep;
        self.dir.clone()
    }

    pub async fn dispose(mut self) {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => tracing::debug!(dir = %self.dir.display(), "Sandbox removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                dir = %self.dir.display(),
                error = %e,
                "Failed to remove sandbox"
            ),
        }
        self.retention = Retention::Disposed;
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.retention == Retention::Remove {
            // Best effort
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_unique_directories() {
        let root = tempfile::tempdir().unwrap();

        let first = Sandbox::create(root.path()).await.unwrap();
        let second = Sandbox::create(root.path()).await.unwrap();

        assert_ne!(first.dir(), second.dir());
        assert!(first.dir().is_dir());
        assert!(second.dir().is_dir());
        assert!(first.dir().starts_with(root.path()));
    }

    #[tokio::test]
    async fn test_write_source() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::create(root.path()).await.unwrap();

        let path = sandbox
            .write_source(&SubmittedProgram::new("package main"))
            .await
            .unwrap();

        assert_eq!(path, sandbox.dir().join("main.go"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "package main");
    }

    #[tokio::test]
    async fn test_dispose_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::create(root.path()).await.unwrap();
        std::fs::write(sandbox.path_of("trace.out"), b"data").unwrap();
        let dir = sandbox.dir().to_path_buf();

        sandbox.dispose().await;

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::create(root.path()).await.unwrap();
        let dir = sandbox.dir().to_path_buf();

        drop(sandbox);

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_keep_preserves_directory() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::create(root.path()).await.unwrap();

        let dir = sandbox.keep();

        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_create_in_readonly_root_fails() {
        // /proc is readonly dir
        let root = Path::new("/proc").join(format!("gtrace_root_{}", Uuid::new_v4()));

        let result = Sandbox::create(&root).await;

        assert!(matches!(result, Err(SandboxError::Setup { .. })));
    }
}
