use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{Album, ItemStatus, PhotosApi, RemoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFailure {
    /// `upload_bytes` returns an error.
    Error,
    /// `upload_bytes` panics inside the worker.
    Panic,
}

#[derive(Default)]
struct Inner {
    albums: Vec<Album>,
    // token -> file name
    uploads: HashMap<String, String>,
    // album id -> attached file names
    items: HashMap<String, Vec<String>>,
    attached_tokens: HashSet<String>,
    uploaded_names: Vec<String>,
    fail_uploads: HashMap<String, UploadFailure>,
    reject_names: HashSet<String>,
    reject_all: bool,
}

/// In-process photo service with call counters and failure injection.
#[derive(Default)]
pub struct MemoryPhotos {
    inner: Mutex<Inner>,
    next_token: AtomicUsize,
    next_album: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub attach_calls: AtomicUsize,
}

impl MemoryPhotos {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pre-existing album, as if created by an earlier session.
    pub fn seed_album(&self, title: &str) -> Album {
        let album = self.new_album(title);
        self.lock().albums.push(album.clone());
        album
    }

    /// Register an upload token that was issued before this process started.
    pub fn seed_upload(&self, token: &str, name: &str) {
        self.lock().uploads.insert(token.to_string(), name.to_string());
    }

    pub fn fail_upload_of(&self, name: &str, how: UploadFailure) {
        self.lock().fail_uploads.insert(name.to_string(), how);
    }

    /// Attach calls report the item for `name` as failed.
    pub fn reject_attach_of(&self, name: &str) {
        self.lock().reject_names.insert(name.to_string());
    }

    pub fn reject_all_attaches(&self) {
        self.lock().reject_all = true;
    }

    pub fn albums(&self) -> Vec<Album> {
        self.lock().albums.clone()
    }

    pub fn album_items(&self, album_id: &str) -> Vec<String> {
        self.lock().items.get(album_id).cloned().unwrap_or_default()
    }

    /// File names passed to `upload_bytes`, in call order.
    pub fn uploaded_names(&self) -> Vec<String> {
        self.lock().uploaded_names.clone()
    }

    fn new_album(&self, title: &str) -> Album {
        let n = self.next_album.fetch_add(1, Ordering::SeqCst) + 1;
        Album { id: format!("album-{}", n), title: title.to_string() }
    }
}

impl PhotosApi for MemoryPhotos {
    fn list_albums(&self) -> Result<Vec<Album>, RemoteError> {
        Ok(self.albums())
    }

    fn create_album(&self, title: &str) -> Result<Album, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let album = self.new_album(title);
        self.lock().albums.push(album.clone());
        Ok(album)
    }

    fn upload_bytes(&self, path: &Path, file_name: &str, progress: &dyn Fn(u64)) -> Result<String, RemoteError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let name = file_name.to_string();
        let failure = self.lock().fail_uploads.get(&name).copied();
        match failure {
            Some(UploadFailure::Error) => {
                return Err(RemoteError::Upload { path: path.to_path_buf(), reason: "injected failure".into() });
            }
            Some(UploadFailure::Panic) => panic!("injected panic uploading {}", name),
            None => {}
        }
        let len = std::fs::metadata(path).map_err(|e| RemoteError::io(path, e))?.len();
        progress(len);

        let token = format!("tok-{}", self.next_token.fetch_add(1, Ordering::SeqCst) + 1);
        let mut inner = self.lock();
        inner.uploads.insert(token.clone(), name.clone());
        inner.uploaded_names.push(name);
        Ok(token)
    }

    fn attach_tokens(&self, album_id: &str, tokens: &[String]) -> Result<Vec<ItemStatus>, RemoteError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        if !inner.albums.iter().any(|a| a.id == album_id) {
            return Err(RemoteError::AlbumNotFound(album_id.to_string()));
        }
        let mut statuses = Vec::with_capacity(tokens.len());
        for token in tokens {
            let Some(name) = inner.uploads.get(token).cloned() else {
                statuses.push(ItemStatus::failed(token, "unknown upload token"));
                continue;
            };
            if inner.reject_all || inner.reject_names.contains(&name) {
                statuses.push(ItemStatus::failed(token, "rejected"));
                continue;
            }
            if !inner.attached_tokens.insert(token.clone()) {
                statuses.push(ItemStatus::failed(token, "token already used"));
                continue;
            }
            inner.items.entry(album_id.to_string()).or_default().push(name);
            statuses.push(ItemStatus::ok(token));
        }
        Ok(statuses)
    }
}
