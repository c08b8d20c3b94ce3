// temp_files.rs - Per-request scratch files with guaranteed removal
use crate::error::TempFileError;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempRole {
    Upload,
    Frame,
}

impl TempRole {
    fn prefix(&self) -> &'static str {
        match self {
            TempRole::Upload => "upload",
            TempRole::Frame => "frame",
        }
    }
}

/// A scratch file owned by exactly one request.
#[derive(Debug, Clone, PartialEq)]
pub struct TempFile {
    pub path: PathBuf,
    pub role: TempRole,
}

/// Directory where every request writes its scratch files.
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    dir: PathBuf,
}

impl TempWorkspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), TempFileError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| TempFileError::Io {
                path: self.dir.display().to_string(),
                source,
            })
    }

    /// A fresh path that no other request can pick: a v4 UUID per file.
    pub fn unique_path(&self, role: TempRole, extension: &str) -> PathBuf {
        let extension = extension.trim_start_matches('.');
        self.dir
            .join(format!("{}_{}.{}", role.prefix(), Uuid::new_v4().simple(), extension))
    }

    /// Write `bytes` to a new unique file.
    pub async fn persist(
        &self,
        bytes: &[u8],
        extension: &str,
        role: TempRole,
    ) -> Result<TempFile, TempFileError> {
        let path = self.unique_path(role, extension);
        write_file(&path, bytes).await?;
        Ok(TempFile { path, role })
    }

    /// Start tracking the scratch files of one request.
    pub fn scope(&self) -> TempScope {
        TempScope {
            workspace: self.clone(),
            files: Vec::new(),
        }
    }
}

/// Write `bytes` to `path`. A failed write can leave a partial file, which
/// is removed before the error is returned.
async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TempFileError> {
    if let Err(source) = fs::write(path, bytes).await {
        cleanup(&[path.to_path_buf()]).await;
        return Err(TempFileError::Io {
            path: path.display().to_string(),
            source,
        });
    }
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "temp file written");
    Ok(())
}

/// Remove each path if present. Missing files are skipped, other errors are
/// logged and swallowed. Returns how many files were actually removed.
pub async fn cleanup(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {
                removed += 1;
                tracing::debug!(path = %path.display(), "temp file removed");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "temp file already gone");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
    tracing::debug!("cleanup finished: {}/{} files removed", removed, paths.len());
    removed
}

/// Every file created through a scope is deleted when the scope is cleaned
/// up, or when it is dropped without having been cleaned up.
#[derive(Debug)]
pub struct TempScope {
    workspace: TempWorkspace,
    files: Vec<TempFile>,
}

impl TempScope {
    pub async fn persist(
        &mut self,
        bytes: &[u8],
        extension: &str,
        role: TempRole,
    ) -> Result<PathBuf, TempFileError> {
        // Tracked before the write so a partial file is still cleaned up.
        let path = self.workspace.unique_path(role, extension);
        self.files.push(TempFile {
            path: path.clone(),
            role,
        });
        write_file(&path, bytes).await?;
        Ok(path)
    }

    pub fn files(&self) -> &[TempFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Delete every tracked file. Returns how many were removed.
    pub async fn cleanup(mut self) -> usize {
        let paths: Vec<PathBuf> = self.files.drain(..).map(|f| f.path).collect();
        tracing::debug!("cleaning up {} temp files", paths.len());
        cleanup(&paths).await
    }
}

impl Drop for TempScope {
    fn drop(&mut self) {
        // Reached only when the scope was not cleaned up, e.g. on panic or a
        // cancelled request future.
        for file in self.files.drain(..) {
            match std::fs::remove_file(&file.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "failed to remove temp file on drop");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_unique_paths_do_not_collide() {
        let workspace = TempWorkspace::new("/tmp/x");
        let a = workspace.unique_path(TempRole::Upload, "jpg");
        let b = workspace.unique_path(TempRole::Upload, ".jpg");
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_str().unwrap().starts_with("upload_"));
        assert_eq!(b.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_scope_cleanup_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path());
        let mut scope = workspace.scope();
        scope.persist(b"video", "mp4", TempRole::Upload).await.unwrap();
        scope.persist(b"frame", "jpg", TempRole::Frame).await.unwrap();
        assert_eq!(scope.len(), 2);
        assert_eq!(entries(dir.path()), 2);

        let removed = scope.cleanup().await;
        assert_eq!(removed, 2);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_drop_removes_uncleaned_files() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path());
        {
            let mut scope = workspace.scope();
            scope.persist(b"x", "png", TempRole::Upload).await.unwrap();
            assert_eq!(entries(dir.path()), 1);
        }
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_cleanup_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never_written.jpg");
        assert_eq!(cleanup(&[missing]).await, 0);
    }

    #[tokio::test]
    async fn test_failed_write_stays_tracked_for_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path().join("absent"));
        let mut scope = workspace.scope();

        assert!(scope.persist(b"video", "mp4", TempRole::Upload).await.is_err());
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.files()[0].role, TempRole::Upload);

        assert_eq!(scope.cleanup().await, 0);
        assert_eq!(entries(dir.path()), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // Linux only: every write to /dev/full fails with ENOSPC after open.
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let target = dir.path().join("partial.jpg");
        std::os::unix::fs::symlink(full, &target).unwrap();

        let err = write_file(&target, b"payload").await.unwrap_err();
        assert!(err.to_string().contains("partial.jpg"));
        assert!(std::fs::symlink_metadata(&target).is_err());
        assert!(full.exists());
    }

    #[tokio::test]
    async fn test_persist_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path().join("absent"));
        let err = workspace
            .persist(b"x", "jpg", TempRole::Upload)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("absent"));
    }
}
