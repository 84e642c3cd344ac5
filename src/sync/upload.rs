use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::scan::ScannedFile;
use crate::error::SyncError;
use crate::executor::Executor;
use crate::ledger::Ledger;
use crate::metadata::DateRewriter;
use crate::naming::capture_date;
use crate::remote::PhotosApi;

pub(crate) const SIMULATED_STEPS: u64 = 10;

/// What one upload task reports back to the control thread.
#[derive(Debug)]
enum UploadResult {
    Uploaded { index: usize, token: String },
    Failed { name: String, error: String },
    // abort flag was already set when the task started
    Skipped,
}

/// Everything the worker closures need; cloned into each task.
#[derive(Clone)]
pub(crate) struct UploadCtx {
    pub(crate) api: Arc<dyn PhotosApi>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) rewriter: Option<Arc<dyn DateRewriter>>,
    pub(crate) album_year: Option<i32>,
    pub(crate) dry_run: bool,
    pub(crate) simulated_step: Duration,
    pub(crate) mp: Arc<MultiProgress>,
    pub(crate) file_style: ProgressStyle,
}

/// Pretend to send `size` bytes in ten timed steps and hand out a random token.
pub fn simulate_upload(size: u64, step: Duration, progress: &dyn Fn(u64)) -> String {
    let per_step = size / SIMULATED_STEPS;
    let mut sent = 0u64;
    for i in 0..SIMULATED_STEPS {
        std::thread::sleep(step);
        sent = if i + 1 == SIMULATED_STEPS { size } else { sent + per_step };
        progress(sent);
    }
    uuid::Uuid::new_v4().to_string()
}

/// A per-file bar that is cleared and detached when dropped, also when the
/// upload panics.
struct FileBar<'a> {
    mp: &'a MultiProgress,
    pb: ProgressBar,
}

impl<'a> FileBar<'a> {
    fn new(mp: &'a MultiProgress, pb: ProgressBar) -> Self {
        let pb = mp.add(pb);
        Self { mp, pb }
    }
}

impl Drop for FileBar<'_> {
    fn drop(&mut self) {
        self.pb.finish_and_clear();
        self.mp.remove(&self.pb);
    }
}

fn upload_one(ctx: &UploadCtx, file: &ScannedFile, progress: &dyn Fn(u64)) -> Result<String, SyncError> {
    if ctx.dry_run {
        return Ok(simulate_upload(file.size, ctx.simulated_step, progress));
    }
    match &ctx.rewriter {
        Some(rw) => {
            let date = capture_date(ctx.album_year, file.modified);
            tracing::debug!("[upload] {} capture date {}", file.name, date);
            // the temporary copy is removed when `tmp` drops
            let tmp = rw.rewrite_capture_date(&file.path, date)?;
            Ok(ctx.api.upload_bytes(&tmp, &file.name, progress)?)
        }
        None => Ok(ctx.api.upload_bytes(&file.path, &file.name, progress)?),
    }
}

fn run_task(ctx: &UploadCtx, index: usize, file: &ScannedFile, abort: &AtomicBool, tx: &Sender<UploadResult>) {
    if abort.load(Ordering::SeqCst) {
        tracing::debug!("[upload] abort set, not starting {}", file.name);
        let _ = tx.send(UploadResult::Skipped);
        return;
    }
    let bar = FileBar::new(&ctx.mp, ProgressBar::new(file.size));
    bar.pb.set_style(ctx.file_style.clone());
    bar.pb.set_message(file.name.clone());

    let outcome = upload_one(ctx, file, &|sent| bar.pb.set_position(sent))
        .and_then(|token| ctx.ledger.record_upload(&file.name, &token).map(|_| token).map_err(Into::into));
    drop(bar);

    let msg = match outcome {
        Ok(token) => {
            tracing::debug!("[upload] {} -> token={}", file.name, token);
            UploadResult::Uploaded { index, token }
        }
        Err(e) => {
            abort.store(true, Ordering::SeqCst);
            tracing::debug!("[upload] {} failed: {}", file.name, e);
            UploadResult::Failed { name: file.name.clone(), error: e.to_string() }
        }
    };
    let _ = tx.send(msg);
}

/// Upload `files` through a fresh executor and return their tokens in
/// submission order. The first failure stops new uploads from starting; the
/// call still waits for in-flight ones before reporting the error.
pub(crate) fn upload_all(
    dir: &Path,
    ctx: &UploadCtx,
    files: Vec<ScannedFile>,
    max_concurrency: usize,
    buffer_size: usize,
) -> Result<Vec<String>, SyncError> {
    let executor = Executor::new(max_concurrency, buffer_size)?;
    let abort = Arc::new(AtomicBool::new(false));
    let (tx, rx) = unbounded::<UploadResult>();

    let mut submitted = 0usize;
    for (index, file) in files.into_iter().enumerate() {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let ctx = ctx.clone();
        let abort = abort.clone();
        let tx = tx.clone();
        executor.submit(move || run_task(&ctx, index, &file, &abort, &tx))?;
        submitted += 1;
    }
    executor.graceful_shutdown();
    drop(tx);

    let mut tokens: Vec<(usize, String)> = Vec::with_capacity(submitted);
    let mut failures = Vec::new();
    let mut finished = 0usize;
    for r in rx.try_iter() {
        finished += 1;
        match r {
            UploadResult::Uploaded { index, token } => tokens.push((index, token)),
            UploadResult::Failed { name, error } => failures.push(format!("{}: {}", name, error)),
            UploadResult::Skipped => {}
        }
    }
    if !failures.is_empty() {
        return Err(SyncError::Upload { dir: dir.to_path_buf(), failures });
    }
    if finished != submitted {
        // a task panicked before reporting
        return Err(SyncError::LostTasks { dir: dir.to_path_buf(), submitted, finished });
    }
    tokens.sort_by_key(|(i, _)| *i);
    Ok(tokens.into_iter().map(|(_, t)| t).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn simulated_upload_reports_ten_steps_ending_at_size() {
        let seen = Mutex::new(Vec::new());
        let token = simulate_upload(105, Duration::ZERO, &|n| seen.lock().unwrap().push(n));
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0], 10);
        assert_eq!(*seen.last().unwrap(), 105);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(uuid::Uuid::parse_str(&token).is_ok());
    }

    #[test]
    fn file_bar_is_cleared_when_upload_panics() {
        let mp = crate::util::init_progress(true);
        let mut seen = None;
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let bar = FileBar::new(&mp, ProgressBar::new(10));
            seen = Some(bar.pb.clone());
            bar.pb.set_position(3);
            panic!("upload blew up");
        }));
        assert!(r.is_err());
        assert!(seen.unwrap().is_finished());
    }
}
