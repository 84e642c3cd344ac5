use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{Album, ItemStatus, PhotosApi, RemoteError};
use crate::app::StorageObject;

const INDEX_FILE: &str = "albums.json";
const STAGING_DIR: &str = ".uploads";
const TOKEN_SEPARATOR: &str = "__";
const COPY_BUF: usize = 64 * 1024;

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct LibraryIndex {
    albums: Vec<Album>,
}

/// A photo library kept in a plain directory.
///
/// ```text
/// <root>/albums.json               album index
/// <root>/.uploads/<token>__<name>  uploaded, not yet in an album
/// <root>/<album id>/<name>         album items
/// ```
///
/// Uploads are staged under a fresh token; attaching moves the staged file
/// into the album directory, so a token can only be attached once.
pub struct LocalLibrary {
    root: PathBuf,
    // serializes read-modify-write of the index and staging moves
    index_lock: Mutex<()>,
}

impl LocalLibrary {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, RemoteError> {
        let root = root.as_ref().to_path_buf();
        let staging = root.join(STAGING_DIR);
        std::fs::create_dir_all(&staging).map_err(|e| RemoteError::io(&staging, e))?;
        tracing::debug!("[library] opened {}", root.display());
        Ok(Self { root, index_lock: Mutex::new(()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn read_index(&self) -> Result<LibraryIndex, RemoteError> {
        Ok(LibraryIndex::read_or_default(self.index_path())?)
    }

    /// Staged uploads keyed by token.
    fn staged(&self) -> Result<HashMap<String, (PathBuf, String)>, RemoteError> {
        let dir = self.staging_dir();
        let mut out = HashMap::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| RemoteError::io(&dir, e))? {
            let entry = entry.map_err(|e| RemoteError::io(&dir, e))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some((token, name)) = file_name.split_once(TOKEN_SEPARATOR) {
                out.insert(token.to_string(), (entry.path(), name.to_string()));
            }
        }
        Ok(out)
    }

    /// Items currently stored in an album directory, sorted by name.
    pub fn album_items(&self, album_id: &str) -> Result<Vec<String>, RemoteError> {
        let dir = self.root.join(album_id);
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| RemoteError::io(&dir, e))? {
            let entry = entry.map_err(|e| RemoteError::io(&dir, e))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }
}

impl PhotosApi for LocalLibrary {
    fn list_albums(&self) -> Result<Vec<Album>, RemoteError> {
        Ok(self.read_index()?.albums)
    }

    fn create_album(&self, title: &str) -> Result<Album, RemoteError> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut index = self.read_index()?;
        let album = Album { id: uuid::Uuid::new_v4().simple().to_string(), title: title.to_string() };
        let dir = self.root.join(&album.id);
        std::fs::create_dir_all(&dir).map_err(|e| RemoteError::io(&dir, e))?;
        index.albums.push(album.clone());
        index.save_to(self.index_path())?;
        tracing::info!("[library] created album '{}' id={}", album.title, album.id);
        Ok(album)
    }

    fn upload_bytes(&self, path: &Path, file_name: &str, progress: &dyn Fn(u64)) -> Result<String, RemoteError> {
        let name = Path::new(file_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| RemoteError::Upload { path: path.to_path_buf(), reason: "empty file name".into() })?;
        let token = uuid::Uuid::new_v4().simple().to_string();
        let dest = self.staging_dir().join(format!("{}{}{}", token, TOKEN_SEPARATOR, name));

        let mut src = File::open(path).map_err(|e| RemoteError::io(path, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(self.staging_dir()).map_err(|e| RemoteError::io(&dest, e))?;
        let mut buf = vec![0u8; COPY_BUF];
        let mut sent = 0u64;
        loop {
            let n = src.read(&mut buf).map_err(|e| RemoteError::io(path, e))?;
            if n == 0 {
                break;
            }
            tmp.write_all(&buf[..n]).map_err(|e| RemoteError::io(&dest, e))?;
            sent += n as u64;
            progress(sent);
        }
        tmp.persist(&dest).map_err(|e| RemoteError::io(&dest, e.error))?;
        tracing::debug!("[library] staged {} as token={} ({} bytes)", name, token, sent);
        Ok(token)
    }

    fn attach_tokens(&self, album_id: &str, tokens: &[String]) -> Result<Vec<ItemStatus>, RemoteError> {
        let _guard = self.index_lock.lock().unwrap_or_else(|e| e.into_inner());
        let index = self.read_index()?;
        if !index.albums.iter().any(|a| a.id == album_id) {
            return Err(RemoteError::AlbumNotFound(album_id.to_string()));
        }
        let album_dir = self.root.join(album_id);
        let mut staged = self.staged()?;

        let mut statuses = Vec::with_capacity(tokens.len());
        for token in tokens {
            let Some((src, name)) = staged.remove(token) else {
                statuses.push(ItemStatus::failed(token, "unknown upload token"));
                continue;
            };
            let mut dest = album_dir.join(&name);
            if dest.exists() {
                // same name already in the album; keep both
                dest = album_dir.join(format!("{}{}{}", token, TOKEN_SEPARATOR, name));
            }
            match std::fs::rename(&src, &dest) {
                Ok(()) => statuses.push(ItemStatus::ok(token)),
                Err(e) => statuses.push(ItemStatus::failed(token, e.to_string())),
            }
        }
        Ok(statuses)
    }
}
