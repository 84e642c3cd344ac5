//! Directory synchronizer: one album per directory, resumable through the
//! per-directory ledger.
//!
//! For each directory: resolve the album title, skip it if that album exists,
//! load the ledger, scan, upload whatever the ledger has not seen, attach
//! fresh and carried-over tokens in batches, then optionally recurse.
//! Everything except the uploads runs on the calling thread.
mod attach;
mod scan;
mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::MultiProgress;

use crate::error::{ConfigError, SyncError};
use crate::ledger::Ledger;
use crate::metadata::DateRewriter;
use crate::naming::{parse_year, resolve_collection_name};
use crate::parse::SubstitutionTable;
use crate::remote::{Album, PhotosApi};
use crate::util::{dir_header, file_progress_style, human_bytes, init_progress};

pub use scan::has_allowed_extension;
pub use upload::simulate_upload;

/// Most tokens a single attach call accepts.
pub const MAX_ATTACH_BATCH: usize = 50;
/// Queue depth of the per-directory upload executor.
pub const EXECUTOR_BUFFER: usize = 100;

const SIMULATED_STEP: Duration = Duration::from_millis(100);

/// Asks the user before a directory's files are uploaded.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt the same way.
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Settings for one run, built once from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub recurse: bool,
    pub skip_confirmation: bool,
    pub dry_run: bool,
    pub max_concurrency: usize,
    pub extensions: Vec<String>,
    pub substitutions: SubstitutionTable,
    pub capitalize: bool,
    pub parse_year: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            recurse: false,
            skip_confirmation: false,
            dry_run: false,
            max_concurrency: 1,
            extensions: crate::config::DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            substitutions: SubstitutionTable::default(),
            capitalize: false,
            parse_year: true,
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Concurrency(self.max_concurrency));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fresh or carried-over tokens were attached.
    Synced,
    /// An album with this title already exists.
    AlreadySynced,
    /// Nothing to upload or attach.
    NoWork,
    /// Uploads simulated, nothing attached.
    DryRun,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Synced => "synced",
            Outcome::AlreadySynced => "album exists",
            Outcome::NoWork => "up to date",
            Outcome::DryRun => "dry run",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    pub path: PathBuf,
    pub title: String,
    pub year: Option<i32>,
    pub outcome: Outcome,
    pub uploaded: usize,
    pub uploaded_bytes: u64,
    pub carried_over: usize,
    pub attached: usize,
    pub failed_items: usize,
    /// Files whose ledger entry was already attached.
    pub already_done: usize,
}

impl DirectoryReport {
    fn new(path: &Path, title: &str, year: Option<i32>) -> Self {
        Self {
            path: path.to_path_buf(),
            title: title.to_string(),
            year,
            outcome: Outcome::NoWork,
            uploaded: 0,
            uploaded_bytes: 0,
            carried_over: 0,
            attached: 0,
            failed_items: 0,
            already_done: 0,
        }
    }
}

pub struct Synchronizer {
    api: Arc<dyn PhotosApi>,
    settings: SyncSettings,
    confirm: Box<dyn Confirm>,
    rewriter: Option<Arc<dyn DateRewriter>>,
    mp: Arc<MultiProgress>,
    simulated_step: Duration,
    // album listing, fetched on first use and extended by our own creations
    albums: Option<Vec<Album>>,
    reports: Vec<DirectoryReport>,
}

impl Synchronizer {
    pub fn new(api: Arc<dyn PhotosApi>, settings: SyncSettings) -> Self {
        Self {
            api,
            settings,
            confirm: Box::new(AutoConfirm(true)),
            rewriter: None,
            mp: init_progress(true),
            simulated_step: SIMULATED_STEP,
            albums: None,
            reports: Vec::new(),
        }
    }

    pub fn with_confirm<C: Confirm + 'static>(mut self, confirm: C) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    pub fn with_date_rewriter(mut self, rewriter: Arc<dyn DateRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn with_progress(mut self, mp: Arc<MultiProgress>) -> Self {
        self.mp = mp;
        self
    }

    /// Delay between the ten progress steps of a simulated upload.
    pub fn with_simulated_step(mut self, step: Duration) -> Self {
        self.simulated_step = step;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Reports of every directory processed so far, including those finished
    /// before a failing one.
    pub fn reports(&self) -> &[DirectoryReport] {
        &self.reports
    }

    /// Treat every direct subdirectory of `base` as an album directory.
    pub fn sync_base_dir<P: AsRef<Path>>(&mut self, base: P) -> Result<Vec<DirectoryReport>, SyncError> {
        let base = base.as_ref();
        self.settings.validate()?;
        let meta = std::fs::metadata(base).map_err(|source| SyncError::Io { path: base.to_path_buf(), source })?;
        if !meta.is_dir() {
            return Err(SyncError::NotADirectory(base.to_path_buf()));
        }
        let scan = scan::scan_dir(base, &self.settings.extensions)?;
        tracing::info!("[sync] base {} has {} album dir(s)", base.display(), scan.subdirs.len());
        for dir in scan.subdirs {
            self.sync_dir(&dir)?;
        }
        Ok(self.reports.clone())
    }

    /// Run the per-directory state machine on `dir`, then on its children
    /// when recursion is enabled.
    pub fn sync_dir(&mut self, dir: &Path) -> Result<(), SyncError> {
        let base_name = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let title = resolve_collection_name(&base_name, &self.settings.substitutions, self.settings.capitalize);
        let year = if self.settings.parse_year { parse_year(&base_name) } else { None };
        if self.settings.parse_year && year.is_none() {
            tracing::info!("[sync] no album year in '{}', using file modification times", base_name);
        }
        tracing::info!("[sync] {} -> album '{}' year={:?}", dir.display(), title, year);

        let mut report = DirectoryReport::new(dir, &title, year);

        // an existing album means skip, unless this directory created it and
        // still has tokens to attach
        let mut owned_ledger = None;
        let resume_into = match self.find_album(&title)? {
            Some(album) => match Ledger::load(dir) {
                Ok(Some(l)) if l.album().is_some_and(|a| a.id == album.id) && !l.pending_tokens().is_empty() => {
                    tracing::info!("[sync] resuming into album '{}' created by an earlier run", title);
                    owned_ledger = Some(l);
                    Some(album)
                }
                Ok(_) => return self.skip_existing(dir, report),
                Err(e) => {
                    tracing::warn!("[sync] ignoring unreadable ledger in {}: {}", dir.display(), e);
                    return self.skip_existing(dir, report);
                }
            },
            None => None,
        };

        let ledger = match owned_ledger {
            Some(l) => self.prepare_ledger(l),
            None => self.load_ledger(dir)?,
        };
        let scan = scan::scan_dir(dir, &self.settings.extensions)?;
        let pending = ledger.pending_tokens();

        let (todo, already_done) = scan::filter_against_ledger(scan.files, &ledger);
        report.already_done = already_done;
        report.carried_over = pending.len();
        if todo.is_empty() && pending.is_empty() {
            tracing::info!("[sync] nothing to do in {}", dir.display());
            self.reports.push(report);
            return self.recurse(scan.subdirs);
        }

        let mut tokens = pending;
        if !todo.is_empty() {
            let bytes: u64 = todo.iter().map(|f| f.size).sum();
            let prompt = format!(
                "About to upload directory {} ({} image files, {}) as album '{}'",
                dir.display(),
                todo.len(),
                human_bytes(bytes),
                title
            );
            if !self.settings.skip_confirmation && !self.mp.suspend(|| self.confirm.confirm(&prompt)) {
                return Err(SyncError::Declined);
            }
            let count = todo.len();
            let fresh = self.upload(dir, &title, year, ledger.clone(), todo)?;
            report.uploaded = count;
            report.uploaded_bytes = bytes;
            tokens.extend(fresh);
        }

        if self.settings.dry_run {
            tracing::info!("[sync] dry run: would attach {} item(s) to '{}'", tokens.len(), title);
            report.outcome = Outcome::DryRun;
        } else {
            let album = match resume_into {
                Some(a) => a,
                None => self.resolve_or_create_album(&title, &ledger)?,
            };
            let summary = attach::attach_all(self.api.as_ref(), &ledger, &album, &tokens, MAX_ATTACH_BATCH)?;
            report.attached = summary.attached;
            report.failed_items = summary.failed_items;
            report.outcome = Outcome::Synced;
            tracing::info!(
                "[sync] album '{}' attached={} failed={}",
                title,
                summary.attached,
                summary.failed_items
            );
        }
        self.reports.push(report);
        self.recurse(scan.subdirs)
    }

    fn recurse(&mut self, subdirs: Vec<PathBuf>) -> Result<(), SyncError> {
        if !self.settings.recurse {
            return Ok(());
        }
        for d in subdirs {
            self.sync_dir(&d)?;
        }
        Ok(())
    }

    fn skip_existing(&mut self, dir: &Path, mut report: DirectoryReport) -> Result<(), SyncError> {
        self.notice(format!("Album '{}' already exists, skipping {}", report.title, dir.display()));
        report.outcome = Outcome::AlreadySynced;
        self.reports.push(report);
        if !self.settings.recurse {
            return Ok(());
        }
        let scan = scan::scan_dir(dir, &self.settings.extensions)?;
        self.recurse(scan.subdirs)
    }

    fn load_ledger(&self, dir: &Path) -> Result<Arc<Ledger>, SyncError> {
        let ledger = Ledger::load(dir)?.unwrap_or_else(|| Ledger::empty(dir));
        Ok(self.prepare_ledger(ledger))
    }

    fn prepare_ledger(&self, ledger: Ledger) -> Arc<Ledger> {
        let ledger = if self.settings.dry_run { ledger.without_persistence() } else { ledger };
        Arc::new(ledger)
    }

    fn albums(&mut self) -> Result<&mut Vec<Album>, SyncError> {
        if self.albums.is_none() {
            let list = self.api.list_albums()?;
            tracing::debug!("[sync] fetched {} album(s)", list.len());
            self.albums = Some(list);
        }
        Ok(self.albums.get_or_insert_with(Vec::new))
    }

    fn find_album(&mut self, title: &str) -> Result<Option<Album>, SyncError> {
        Ok(self.albums()?.iter().find(|a| a.title == title).cloned())
    }

    fn resolve_or_create_album(&mut self, title: &str, ledger: &Ledger) -> Result<Album, SyncError> {
        if let Some(a) = self.find_album(title)? {
            return Ok(a);
        }
        self.notice(format!("Creating new album: {}", title));
        let album = self.api.create_album(title)?;
        ledger.record_album(&album)?;
        self.albums()?.push(album.clone());
        Ok(album)
    }

    fn upload(
        &self,
        dir: &Path,
        title: &str,
        year: Option<i32>,
        ledger: Arc<Ledger>,
        files: Vec<scan::ScannedFile>,
    ) -> Result<Vec<String>, SyncError> {
        let total: u64 = files.iter().map(|f| f.size).sum();
        let header = dir_header(&self.mp, title, files.len(), self.settings.max_concurrency, total);
        let ctx = upload::UploadCtx {
            api: self.api.clone(),
            ledger,
            rewriter: if self.settings.dry_run { None } else { self.rewriter.clone() },
            album_year: year,
            dry_run: self.settings.dry_run,
            simulated_step: self.simulated_step,
            mp: self.mp.clone(),
            file_style: file_progress_style(),
        };
        let result = upload::upload_all(dir, &ctx, files, self.settings.max_concurrency, EXECUTOR_BUFFER);
        header.finish_and_clear();
        self.mp.remove(&header);
        result
    }

    fn notice(&self, msg: String) {
        tracing::info!("[sync] {}", msg);
        let _ = self.mp.println(msg);
    }
}
