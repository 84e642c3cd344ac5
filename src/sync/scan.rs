use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::ledger::Ledger;

/// A regular file that passed the extension filter.
#[derive(Debug, Clone)]
pub(crate) struct ScannedFile {
    pub(crate) path: PathBuf,
    pub(crate) name: String,
    pub(crate) size: u64,
    pub(crate) modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct DirScan {
    pub(crate) files: Vec<ScannedFile>,
    pub(crate) subdirs: Vec<PathBuf>,
}

fn walk_err(dir: &Path, e: walkdir::Error) -> SyncError {
    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    SyncError::Io { path, source }
}

pub fn has_allowed_extension(name: &str, extensions: &[String]) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| extensions.iter().any(|x| *x == e))
}

/// Direct children of `dir`, sorted by name. Symlinks are never followed
/// nor returned.
pub(crate) fn scan_dir(dir: &Path, extensions: &[String]) -> Result<DirScan, SyncError> {
    let mut scan = DirScan::default();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| walk_err(dir, e))?;
        let ft = entry.file_type();
        let name = entry.file_name().to_string_lossy().to_string();
        if ft.is_symlink() {
            tracing::debug!("[scan] skipping symlink {}", entry.path().display());
            continue;
        }
        if ft.is_dir() {
            scan.subdirs.push(entry.into_path());
            continue;
        }
        if !ft.is_file() || !has_allowed_extension(&name, extensions) {
            continue;
        }
        let meta = entry.metadata().map_err(|e| walk_err(dir, e))?;
        let modified = meta
            .modified()
            .map_err(|source| SyncError::Io { path: entry.path().to_path_buf(), source })?;
        scan.files.push(ScannedFile {
            path: entry.into_path(),
            name,
            size: meta.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }
    Ok(scan)
}

/// Files that still need uploading, plus how many are already attached.
/// Files with a pending token are left out: their token is re-attached
/// instead.
pub(crate) fn filter_against_ledger(files: Vec<ScannedFile>, ledger: &Ledger) -> (Vec<ScannedFile>, usize) {
    let mut done = 0usize;
    let mut todo = Vec::with_capacity(files.len());
    for f in files {
        match ledger.lookup(&f.name) {
            None => todo.push(f),
            Some(e) if e.media_item_created => done += 1,
            Some(e) if e.is_pending_attach() => {
                tracing::debug!("[scan] {} has pending token, not re-uploading", f.name);
            }
            Some(_) => {
                tracing::warn!("[scan] ledger entry for {} has no token, leaving it alone", f.name);
            }
        }
    }
    (todo, done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_match_is_case_insensitive() {
        let exts = vec!["jpg".to_string(), "jpeg".to_string()];
        assert!(has_allowed_extension("a.JPG", &exts));
        assert!(has_allowed_extension("b.jpeg", &exts));
        assert!(!has_allowed_extension("c.png", &exts));
        assert!(!has_allowed_extension("jpg", &exts));
        assert!(!has_allowed_extension(".photo-uploader.ledger", &exts));
    }

    #[test]
    fn scan_splits_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"1").unwrap();
        std::fs::write(dir.path().join("a.JPG"), b"22").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("child")).unwrap();
        std::fs::write(dir.path().join("child").join("deep.jpg"), b"x").unwrap();

        let exts = vec!["jpg".to_string()];
        let scan = scan_dir(dir.path(), &exts).unwrap();
        let names: Vec<_> = scan.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.jpg"]);
        assert_eq!(scan.files[0].size, 2);
        assert_eq!(scan.subdirs, vec![dir.path().join("child")]);
    }
}
