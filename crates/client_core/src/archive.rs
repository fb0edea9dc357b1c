use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone)]
pub enum ArchiveSource {
    Memory(Arc<[u8]>),
    Path(PathBuf),
}

/// A user-selected archive. Name and size are known up front so validation
/// never has to read the content.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    name: String,
    size_bytes: u64,
    source: ArchiveSource,
}

impl ArchiveFile {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            source: ArchiveSource::Memory(bytes),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat '{}'", path.display()))?;
        if !metadata.is_file() {
            return Err(anyhow!("'{}' is not a regular file", path.display()));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("'{}' has no file name", path.display()))?;
        Ok(Self {
            name,
            size_bytes: metadata.len(),
            source: ArchiveSource::Path(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn source(&self) -> &ArchiveSource {
        &self.source
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            ArchiveSource::Memory(bytes) => Ok(bytes.to_vec()),
            ArchiveSource::Path(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read '{}'", path.display())),
        }
    }
}
