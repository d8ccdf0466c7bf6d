use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const MAX_STORED_NAME_LEN: usize = 120;

/// Manages upload bytes on disk, one flat file per upload under `base_dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// `base_dir` may start with `~`. Nothing is created until the first write.
    pub fn new(base_dir: &str) -> Self {
        let expanded = shellexpand::tilde(base_dir).to_string();
        Self {
            base_dir: PathBuf::from(expanded),
        }
    }

    /// Location for an upload. The id prefix keeps paths distinct even when
    /// original names collide.
    pub fn path_for(&self, id: &str, original_name: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}", id, sanitize_file_name(original_name)))
    }

    /// Write bytes to `path`, creating the storage root if needed. A partially
    /// written file is removed before the error is returned.
    pub async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        debug!(path = %path.display(), size = data.len(), "storage: write");
        if let Err(err) = fs::write(path, data).await {
            let _ = fs::remove_file(path).await;
            return Err(err);
        }
        Ok(())
    }

    pub async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    /// Delete the file at `path`. A file that is already gone counts as deleted.
    pub async fn delete(&self, path: &Path) -> io::Result<()> {
        debug!(path = %path.display(), "storage: delete");
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Reduce a caller-supplied name to a single safe path component.
fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STORED_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
