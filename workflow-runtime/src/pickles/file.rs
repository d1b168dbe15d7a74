use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::sync::Mutex;
use workflow_core::error::RehydrationError;
use workflow_core::pending::{LiveResource, PendingResource};
use workflow_core::placeholder::{
    Placeholder, PlaceholderRecord, PlaceholderState, RehydrationCell,
};

/// Stand-in for an open file, reopened by path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePlaceholder {
    path: PathBuf,
    #[serde(skip)]
    cell: RehydrationCell,
}

impl FilePlaceholder {
    pub const KIND: &'static str = "file";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: RehydrationCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Placeholder for FilePlaceholder {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn to_record(&self) -> Result<PlaceholderRecord, serde_json::Error> {
        PlaceholderRecord::encode(Self::KIND, self)
    }

    fn begin_rehydrate(&self) -> PendingResource {
        let path = self.path.clone();
        self.cell.begin(|| async move {
            let (file, writable) = match open(&path, true).await {
                Ok(file) => (file, true),
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    (open(&path, false).await.map_err(|e| failure(&path, e))?, false)
                }
                Err(e) => return Err(failure(&path, e)),
            };
            tracing::debug!(path = %path.display(), writable, "Reopened file");
            Ok(LiveResource::new(LiveFile {
                path,
                writable,
                file: Mutex::new(file),
            }))
        })
    }

    fn state(&self) -> PlaceholderState {
        self.cell.state()
    }
}

async fn open(path: &Path, append: bool) -> std::io::Result<File> {
    OpenOptions::new().read(true).append(append).open(path).await
}

fn failure(path: &Path, e: std::io::Error) -> RehydrationError {
    match e.kind() {
        ErrorKind::NotFound => RehydrationError::Missing(path.display().to_string()),
        _ => RehydrationError::Failed(format!("{}: {}", path.display(), e)),
    }
}

/// A reopened file.
///
/// Opened for appending where permissions allow, read-only otherwise.
#[derive(Debug)]
pub struct LiveFile {
    path: PathBuf,
    writable: bool,
    file: Mutex<File>,
}

impl LiveFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn file(&self) -> &Mutex<File> {
        &self.file
    }
}
