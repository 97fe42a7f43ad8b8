//! Staged uploads on local disk.
//!
//! # Responsibilities
//! - Give every intercepted upload its own uniquely named directory
//! - Keep the original filename as the leaf so rules can inspect the extension
//! - Remove the staged file on every exit path, including cancellation
//!
//! # Design Decisions
//! - Uniqueness comes from the directory, so concurrent uploads of the same
//!   filename never collide
//! - Removal is explicit (async) on every path the handler controls; `Drop`
//!   covers a dropped request future by handing the delete to the blocking
//!   pool, or deleting inline when no runtime is running

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const STAGING_PREFIX: &str = "upload-";
const FALLBACK_NAME: &str = "upload";

/// A transient local copy of one upload.
#[derive(Debug)]
pub struct StagedFile {
    dir: Option<TempDir>,
    path: PathBuf,
    field_name: String,
    file_name: String,
    content_type: Option<String>,
}

impl StagedFile {
    /// Create an empty staged file under `root` and open it for writing.
    pub async fn create(
        root: &Path,
        field_name: &str,
        original_name: &str,
        content_type: Option<String>,
    ) -> io::Result<(Self, tokio::fs::File)> {
        tokio::fs::create_dir_all(root).await?;

        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(root)
        })
        .await
        .map_err(io::Error::other)??;

        let file_name = sanitize_file_name(original_name);
        let path = dir.path().join(&file_name);
        let staged = Self {
            dir: Some(dir),
            path,
            field_name: field_name.to_string(),
            file_name,
            content_type,
        };

        let created = tokio::fs::File::create(&staged.path).await;
        match created {
            Ok(file) => Ok((staged, file)),
            Err(e) => {
                let _ = staged.remove().await;
                Err(e)
            }
        }
    }

    /// Stage a copy of an existing file.
    pub async fn copy_from(root: &Path, source: &Path) -> io::Result<Self> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(FALLBACK_NAME);
        let (staged, file) = Self::create(root, "file", name, None).await?;
        drop(file);
        let copied = tokio::fs::copy(source, staged.path()).await;
        match copied {
            Ok(_) => Ok(staged),
            Err(e) => {
                let _ = staged.remove().await;
                Err(e)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Sanitized original filename, re-used for the upstream submission.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Open the (possibly rewritten) content for reading, with its current length.
    pub async fn open(&self) -> io::Result<(tokio::fs::File, u64)> {
        let file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Delete the staged file and its directory.
    pub async fn remove(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => tokio::task::spawn_blocking(move || dir.close())
                .await
                .map_err(io::Error::other)?,
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            tracing::debug!(path = ?self.path, "Removing staged upload on drop");
            let path = std::mem::take(&mut self.path);
            let close = move || {
                if let Err(e) = dir.close() {
                    tracing::warn!(path = ?path, error = %e, "Failed to remove staged upload");
                }
            };
            // Off the async workers when there is a runtime to hand the delete to.
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(close);
                }
                Err(_) => close(),
            }
        }
    }
}

/// Reduce a client-supplied filename to a safe leaf name.
pub fn sanitize_file_name(name: &str) -> String {
    let leaf = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    match leaf {
        "" | "." | ".." => FALLBACK_NAME.to_string(),
        leaf => leaf.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("part.gcode"), "part.gcode");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\prints\\cube.gcode"), "cube.gcode");
        assert_eq!(sanitize_file_name("dir/"), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[tokio::test]
    async fn test_same_name_uploads_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let (a, _) = StagedFile::create(root.path(), "file", "part.gcode", None).await.unwrap();
        let (b, _) = StagedFile::create(root.path(), "file", "part.gcode", None).await.unwrap();

        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().file_name().unwrap(), "part.gcode");
        assert_eq!(b.path().file_name().unwrap(), "part.gcode");
    }

    #[tokio::test]
    async fn test_remove_deletes_staging_directory() {
        let root = tempfile::tempdir().unwrap();
        let (staged, mut file) = StagedFile::create(
            root.path(),
            "file",
            "part.gcode",
            Some("application/octet-stream".into()),
        )
        .await
        .unwrap();
        file.write_all(b"G1 X10\n").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let (_, len) = staged.open().await.unwrap();
        assert_eq!(len, 7);
        assert_eq!(staged.content_type(), Some("application/octet-stream"));

        staged.remove().await.unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_drop_in_runtime_deletes_staging_directory() {
        let root = tempfile::tempdir().unwrap();
        {
            let (_staged, _file) = StagedFile::create(root.path(), "file", "a.g", None).await.unwrap();
            assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
        }

        for _ in 0..100 {
            if std::fs::read_dir(root.path()).unwrap().count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("staging directory still present after drop");
    }

    #[test]
    fn test_drop_outside_runtime_deletes_inline() {
        let root = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (staged, file) = runtime
            .block_on(StagedFile::create(root.path(), "file", "a.g", None))
            .unwrap();
        drop(file);
        drop(runtime);

        drop(staged);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_copy_from_missing_source_leaves_nothing_behind() {
        let root = tempfile::tempdir().unwrap();
        let err = StagedFile::copy_from(root.path(), Path::new("/nonexistent/part.gcode")).await;

        assert!(err.is_err());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
