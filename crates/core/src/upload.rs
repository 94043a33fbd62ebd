use crate::error::IngestError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An uploaded blob persisted for the lifetime of one ingestion.
///
/// Everything lives under `<root>/<ingestion_id>/`, so concurrent ingestions
/// never share a path. The directory is removed by [`ScopedUpload::release`],
/// or on drop if release never ran.
#[derive(Debug)]
pub struct ScopedUpload {
    dir: PathBuf,
    file: PathBuf,
    released: bool,
}

impl ScopedUpload {
    pub async fn acquire(
        root: &Path,
        ingestion_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Self, IngestError> {
        let name = safe_file_name(filename)?;
        let dir = root.join(ingestion_id);
        tokio::fs::create_dir_all(&dir).await?;

        let upload = Self {
            file: dir.join(format!("{ingestion_id}_{name}")),
            dir,
            released: false,
        };

        // On failure `upload` drops here and takes the directory with it.
        tokio::fs::write(&upload.file, bytes).await?;
        debug!(path = %upload.file.display(), bytes = bytes.len(), "upload persisted");

        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Scratch space for derived files (rendered pages) that share the upload's lifetime.
    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub async fn release(mut self) -> Result<(), IngestError> {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

impl Drop for ScopedUpload {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(error) = std::fs::remove_dir_all(&self.dir) {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.dir.display(), error = %error, "failed to remove upload");
            }
        }
    }
}

/// Keeps only the final path component of a client-supplied file name.
pub fn safe_file_name(filename: &str) -> Result<String, IngestError> {
    let normalized = filename.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(filename.to_string()))
}
