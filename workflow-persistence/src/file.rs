//! File-based implementation of PersistentBackend.
//!
//! Each snapshot lives in its own file under one directory. Execution ids are
//! escaped into file names, so ids containing path separators stay flat.

use crate::backend::{BackendError, PersistentBackend};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use workflow_core::codec::Codec;
use workflow_core::execution::ExecutionId;
use workflow_core::serialization::JsonCodec;
use workflow_core::snapshot::ExecutionSnapshot;

const SNAPSHOT_EXTENSION: &str = "snapshot";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Backend storing one encoded snapshot file per execution.
#[derive(Debug, Clone)]
pub struct FileBackend<C = JsonCodec> {
    dir: PathBuf,
    codec: C,
}

impl FileBackend<JsonCodec> {
    /// Open (creating if necessary) a JSON snapshot directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, BackendError> {
        Self::with_codec(dir, JsonCodec::new()).await
    }
}

impl<C> FileBackend<C>
where
    C: Codec<ExecutionSnapshot>,
{
    /// Open (creating if necessary) a snapshot directory using `codec`.
    pub async fn with_codec(dir: impl AsRef<Path>, codec: C) -> Result<Self, BackendError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BackendError::Backend(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir, codec })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ExecutionId) -> PathBuf {
        self.dir
            .join(format!("{}.{}", escape_id(id.as_str()), SNAPSHOT_EXTENSION))
    }
}

#[async_trait]
impl<C> PersistentBackend for FileBackend<C>
where
    C: Codec<ExecutionSnapshot>,
{
    async fn save_snapshot(&self, snapshot: ExecutionSnapshot) -> Result<(), BackendError> {
        let path = self.path_for(&snapshot.execution_id);
        let bytes = self
            .codec
            .encode(&snapshot)
            .map_err(|e| BackendError::Serialization(e.to_string()))?;

        // Write then rename so a crash mid-save never leaves a torn snapshot.
        // Every save stages under its own name; concurrent saves of one id
        // each rename a complete file and the last rename wins.
        let staging = path.with_extension(format!(
            "{}.{}-{}.tmp",
            SNAPSHOT_EXTENSION,
            std::process::id(),
            STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let staged = match tokio::fs::write(&staging, &bytes).await {
            Ok(()) => tokio::fs::rename(&staging, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(BackendError::Backend(e.to_string()));
        }

        tracing::debug!(
            execution_id = %snapshot.execution_id,
            path = %path.display(),
            "Saved snapshot"
        );
        Ok(())
    }

    async fn load_snapshot(&self, id: &ExecutionId) -> Result<ExecutionSnapshot, BackendError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackendError::NotFound(id.to_string()));
            }
            Err(e) => return Err(BackendError::Backend(e.to_string())),
        };
        self.codec
            .decode(Bytes::from(bytes))
            .map_err(|e| BackendError::Serialization(format!("{}: {}", path.display(), e)))
    }

    async fn delete_snapshot(&self, id: &ExecutionId) -> Result<(), BackendError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::NotFound(id.to_string())),
            Err(e) => Err(BackendError::Backend(e.to_string())),
        }
    }

    async fn list_snapshots(&self) -> Result<Vec<ExecutionId>, BackendError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| BackendError::Backend(e.to_string()))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackendError::Backend(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match unescape_id(stem) {
                Some(id) => ids.push(ExecutionId::new(id)),
                None => tracing::warn!(path = %path.display(), "Skipping unrecognized snapshot file"),
            }
        }
        Ok(ids)
    }
}

/// Escape everything but `[A-Za-z0-9_-]` as `%XX`.
fn escape_id(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

fn unescape_id(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
