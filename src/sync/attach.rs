use std::collections::HashSet;

use crate::error::SyncError;
use crate::ledger::Ledger;
use crate::remote::{Album, PhotosApi};
use crate::util::chunked;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttachSummary {
    pub(crate) attached: usize,
    pub(crate) failed_items: usize,
}

/// Attach `tokens` to `album` in batches of `batch_size`.
///
/// A batch where every item failed is fatal. Otherwise all of the batch's
/// tokens are marked attached in the ledger before the next batch is sent;
/// failed items are logged and not retried.
pub(crate) fn attach_all(
    api: &dyn PhotosApi,
    ledger: &Ledger,
    album: &Album,
    tokens: &[String],
    batch_size: usize,
) -> Result<AttachSummary, SyncError> {
    let mut summary = AttachSummary::default();
    for batch in chunked(tokens, batch_size) {
        let statuses = api.attach_tokens(&album.id, &batch)?;
        let ok = statuses.iter().filter(|s| s.is_ok()).count();
        if ok == 0 {
            let first_error = statuses
                .iter()
                .find_map(|s| s.error.clone())
                .unwrap_or_else(|| "no item status returned".to_string());
            return Err(SyncError::BatchRejected { album: album.title.clone(), count: batch.len(), first_error });
        }
        for s in statuses.iter().filter(|s| !s.is_ok()) {
            tracing::warn!(
                "[attach] album '{}' rejected token={}: {}",
                album.title,
                s.upload_token,
                s.error.as_deref().unwrap_or("")
            );
        }
        let batch_set: HashSet<String> = batch.iter().cloned().collect();
        ledger.mark_attached(&batch_set)?;
        summary.attached += ok;
        summary.failed_items += batch.len().saturating_sub(ok);
        tracing::debug!("[attach] album '{}' batch of {} ok={}", album.title, batch.len(), ok);
    }
    Ok(summary)
}
