//! Per-directory upload ledger.
//!
//! One file per synchronized directory records, for every file name, the
//! upload token the service handed back and whether that token has been
//! attached to an album. Entries only move forward:
//! absent -> token recorded -> `media_item_created`.
//!
//! On-disk layout: 4 magic bytes, 1 version byte, big-endian `u32` payload
//! length, then the postcard-encoded [`LedgerFile`].

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::remote::Album;

pub const LEDGER_FILE_NAME: &str = ".photo-uploader.ledger";

const LEDGER_MAGIC: &[u8; 4] = b"PULG";
const LEDGER_VERSION: u8 = 1;
const HEADER_LEN: usize = 9;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to access ledger {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("ledger {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("ledger for {} already has an entry for '{name}'", dir.display())]
    DuplicateEntry { dir: PathBuf, name: String },

    #[error("failed to encode ledger: {0}")]
    Encode(#[from] postcard::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    pub name: String,
    pub upload_token: String,
    pub media_item_created: bool,
}

impl LedgerEntry {
    /// Uploaded, but the token never made it into an album.
    pub fn is_pending_attach(&self) -> bool {
        !self.upload_token.is_empty() && !self.media_item_created
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFile {
    pub entries: Vec<LedgerEntry>,
    pub album: Option<Album>,
}

#[derive(Default)]
struct LedgerState {
    file: LedgerFile,
    index: HashMap<String, usize>,
}

impl LedgerState {
    fn from_file(file: LedgerFile) -> Self {
        let index = file.entries.iter().enumerate().map(|(i, e)| (e.name.clone(), i)).collect();
        Self { file, index }
    }
}

pub struct Ledger {
    dir: PathBuf,
    persistent: bool,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Fresh ledger bound to `dir`; nothing is written until the first mutation.
    pub fn empty<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            persistent: true,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Load the ledger stored in `dir`. `Ok(None)` means the directory has no
    /// history; a file that cannot be decoded is an error, never "empty".
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Option<Self>, LedgerError> {
        let dir = dir.as_ref();
        let path = ledger_path(dir);
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("[ledger] no ledger at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(LedgerError::Io { path, source }),
        };
        let file = decode(&data).map_err(|reason| LedgerError::Corrupt { path: path.clone(), reason })?;
        tracing::debug!("[ledger] loaded {} entries from {}", file.entries.len(), path.display());
        Ok(Some(Self {
            dir: dir.to_path_buf(),
            persistent: true,
            state: Mutex::new(LedgerState::from_file(file)),
        }))
    }

    /// Same contents, but mutations stay in memory (dry runs).
    pub fn without_persistence(self) -> Self {
        Self { persistent: false, ..self }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        ledger_path(&self.dir)
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lookup(&self, name: &str) -> Option<LedgerEntry> {
        let st = self.lock();
        st.index.get(name).map(|&i| st.file.entries[i].clone())
    }

    pub fn len(&self) -> usize {
        self.lock().file.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().file.entries.clone()
    }

    /// Tokens that were uploaded but never attached, in ledger order.
    pub fn pending_tokens(&self) -> Vec<String> {
        self.lock()
            .file
            .entries
            .iter()
            .filter(|e| e.is_pending_attach())
            .map(|e| e.upload_token.clone())
            .collect()
    }

    pub fn album(&self) -> Option<Album> {
        self.lock().file.album.clone()
    }

    /// Append the entry for a freshly uploaded file and flush to disk.
    pub fn record_upload(&self, name: &str, upload_token: &str) -> Result<(), LedgerError> {
        let mut st = self.lock();
        if st.index.contains_key(name) {
            return Err(LedgerError::DuplicateEntry { dir: self.dir.clone(), name: name.to_string() });
        }
        tracing::debug!("[ledger] adding entry for '{}'", name);
        let idx = st.file.entries.len();
        st.file.entries.push(LedgerEntry {
            name: name.to_string(),
            upload_token: upload_token.to_string(),
            media_item_created: false,
        });
        st.index.insert(name.to_string(), idx);
        self.persist(&st.file)
    }

    /// Mark every entry holding one of `tokens` as attached; flushes once.
    /// Returns how many entries changed.
    pub fn mark_attached(&self, tokens: &HashSet<String>) -> Result<usize, LedgerError> {
        let mut st = self.lock();
        let mut changed = 0usize;
        for e in st.file.entries.iter_mut() {
            if !e.media_item_created && tokens.contains(&e.upload_token) {
                e.media_item_created = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.persist(&st.file)?;
        }
        Ok(changed)
    }

    /// Remember the album this directory created.
    pub fn record_album(&self, album: &Album) -> Result<(), LedgerError> {
        let mut st = self.lock();
        st.file.album = Some(album.clone());
        self.persist(&st.file)
    }

    /// Called with the state lock held.
    fn persist(&self, file: &LedgerFile) -> Result<(), LedgerError> {
        if !self.persistent {
            return Ok(());
        }
        let path = ledger_path(&self.dir);
        let data = encode(file)?;
        let io_err = |source| LedgerError::Io { path: path.clone(), source };

        // 写入临时文件 -> fsync -> 原子重命名
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&data).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

pub fn ledger_path(dir: &Path) -> PathBuf {
    dir.join(LEDGER_FILE_NAME)
}

pub fn encode(file: &LedgerFile) -> Result<Vec<u8>, LedgerError> {
    let payload = postcard::to_allocvec(file)?;
    let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
    data.extend_from_slice(LEDGER_MAGIC);
    data.push(LEDGER_VERSION);
    data.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    data.extend_from_slice(&payload);
    Ok(data)
}

pub fn decode(data: &[u8]) -> Result<LedgerFile, String> {
    if data.len() < HEADER_LEN {
        return Err("data too short for header".to_string());
    }
    if &data[0..4] != LEDGER_MAGIC {
        return Err("invalid magic bytes".to_string());
    }
    if data[4] != LEDGER_VERSION {
        return Err(format!("unsupported ledger version {}", data[4]));
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&data[5..HEADER_LEN]);
    let len = u32::from_be_bytes(len_bytes) as usize;
    if data.len() != HEADER_LEN + len {
        return Err(format!(
            "payload length mismatch: header says {} bytes, found {}",
            len,
            data.len() - HEADER_LEN
        ));
    }
    postcard::from_bytes(&data[HEADER_LEN..]).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LedgerFile {
        LedgerFile {
            entries: vec![
                LedgerEntry {
                    name: "a.jpg".into(),
                    upload_token: "t-a".into(),
                    media_item_created: true,
                },
                LedgerEntry { name: "b.jpg".into(), upload_token: "t-b".into(), media_item_created: false },
            ],
            album: Some(Album { id: "42".into(), title: "Trip".into() }),
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let f = sample();
        assert_eq!(decode(&encode(&f).unwrap()).unwrap(), f);
        let empty = LedgerFile::default();
        assert_eq!(decode(&encode(&empty).unwrap()).unwrap(), empty);
    }

    #[test]
    fn decode_rejects_bad_header() {
        let mut data = encode(&sample()).unwrap();
        data[0] = b'X';
        assert!(decode(&data).unwrap_err().contains("magic"));

        let mut data = encode(&sample()).unwrap();
        data[4] = 9;
        assert!(decode(&data).unwrap_err().contains("version"));

        let data = encode(&sample()).unwrap();
        assert!(decode(&data[..data.len() - 1]).is_err());
        assert!(decode(&data[..3]).is_err());
    }

    #[test]
    fn pending_tokens_skip_attached_entries() {
        let l = Ledger::empty("/nonexistent").without_persistence();
        l.record_upload("a.jpg", "t-a").unwrap();
        l.record_upload("b.jpg", "t-b").unwrap();
        let set: HashSet<String> = ["t-a".to_string()].into_iter().collect();
        assert_eq!(l.mark_attached(&set).unwrap(), 1);
        assert_eq!(l.pending_tokens(), vec!["t-b".to_string()]);
        assert!(l.lookup("a.jpg").unwrap().media_item_created);
    }

    #[test]
    fn duplicate_entry_is_an_error() {
        let l = Ledger::empty("/nonexistent").without_persistence();
        l.record_upload("a.jpg", "t-1").unwrap();
        let err = l.record_upload("a.jpg", "t-2").unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateEntry { .. }));
        assert_eq!(l.lookup("a.jpg").unwrap().upload_token, "t-1");
    }

    #[test]
    fn duplicate_is_caught_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        Ledger::empty(dir.path()).record_upload("a.jpg", "t-1").unwrap();
        let l = Ledger::load(dir.path()).unwrap().unwrap();
        assert!(matches!(l.record_upload("a.jpg", "t-2"), Err(LedgerError::DuplicateEntry { .. })));
        l.record_upload("b.jpg", "t-3").unwrap();
        assert_eq!(l.lookup("b.jpg").unwrap().upload_token, "t-3");
        assert_eq!(l.len(), 2);
    }
}
