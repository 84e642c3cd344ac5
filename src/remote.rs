// remote module: album service collaborator and its backends
mod library;
mod memory;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use library::LocalLibrary;
pub use memory::{MemoryPhotos, UploadFailure};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub title: String,
}

/// Per-token outcome of an attach call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatus {
    pub upload_token: String,
    pub error: Option<String>,
}

impl ItemStatus {
    pub fn ok(token: impl Into<String>) -> Self {
        Self { upload_token: token.into(), error: None }
    }

    pub fn failed(token: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { upload_token: token.into(), error: Some(msg.into()) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("library I/O failed at {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error(transparent)]
    Storage(#[from] crate::error::StorageError),

    #[error("album '{0}' does not exist")]
    AlbumNotFound(String),

    #[error("upload of {} failed: {reason}", path.display())]
    Upload { path: PathBuf, reason: String },

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        RemoteError::Io { path: path.to_path_buf(), source }
    }
}

/// The four calls the synchronizer makes against the photo service.
///
/// Implementations are shared between the control thread and upload workers,
/// so every method takes `&self`.
pub trait PhotosApi: Send + Sync {
    fn list_albums(&self) -> Result<Vec<Album>, RemoteError>;

    fn create_album(&self, title: &str) -> Result<Album, RemoteError>;

    /// Send the bytes at `path` as `file_name` and return the upload token.
    /// `path` may be a temporary copy. `progress` receives the cumulative
    /// number of bytes sent.
    fn upload_bytes(&self, path: &Path, file_name: &str, progress: &dyn Fn(u64)) -> Result<String, RemoteError>;

    /// Turn uploaded tokens into album items; one status per input token, in order.
    fn attach_tokens(&self, album_id: &str, tokens: &[String]) -> Result<Vec<ItemStatus>, RemoteError>;
}
