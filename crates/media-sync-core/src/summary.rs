use media_sync_models::{SyncOp, SyncResponse, TypeCounts};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Outcome of the writes that went through the queue
///
/// Trakt reports per-type counters for every batch; they are summed here so
/// one line per run can replace one line per batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteSummary {
    /// Entries accepted per operation (`add-to-collection`, ...)
    pub queued: BTreeMap<String, usize>,
    pub added: TypeCounts,
    pub updated: TypeCounts,
    pub existing: TypeCounts,
    pub deleted: TypeCounts,
    pub not_found: usize,
    pub batches: usize,
    pub scrobbles: usize,
    pub failed: usize,
    /// Entries still waiting for a flush
    pub pending: usize,
    pub dry_run: bool,
    #[serde(skip)]
    error_counts: HashMap<String, usize>,
}

impl WriteSummary {
    pub fn record_queued(&mut self, op: SyncOp, entries: usize) {
        *self.queued.entry(op.as_str().to_string()).or_insert(0) += entries;
        self.pending += entries;
    }

    /// Record a batch that left the queue, whatever happened to it
    pub fn record_flushed(&mut self, entries: usize) {
        self.pending = self.pending.saturating_sub(entries);
    }

    pub fn record_response(&mut self, response: &SyncResponse) {
        self.batches += 1;
        self.added.add(&response.added);
        self.updated.add(&response.updated);
        self.existing.add(&response.existing);
        self.deleted.add(&response.deleted);
        self.not_found += response.not_found.len();
    }

    pub fn record_scrobble(&mut self) {
        self.scrobbles += 1;
    }

    /// Record a failed batch or scrobble, grouped by category in the summary
    pub fn record_failed_with_error(&mut self, error_category: &str) {
        self.failed += 1;
        *self.error_counts.entry(error_category.to_string()).or_insert(0) += 1;
    }

    pub fn queued_total(&self) -> usize {
        self.queued.values().sum()
    }

    pub fn log_summary(&self, operation_name: &str) {
        if self.queued.is_empty() && self.scrobbles == 0 && self.failed == 0 {
            return;
        }

        if self.dry_run {
            info!(
                "{} (dry run): {} entries not submitted",
                operation_name,
                self.queued_total()
            );
            return;
        }

        let line = format!(
            "{}: {} batches | Added: {} | Updated: {} | Existing: {} | Deleted: {} | Not found: {} | Scrobbles: {} | Failed: {}",
            operation_name,
            self.batches,
            self.added.total(),
            self.updated.total(),
            self.existing.total(),
            self.deleted.total(),
            self.not_found,
            self.scrobbles,
            self.failed
        );
        if self.failed > 0 {
            warn!("{}", line);
            let mut error_entries: Vec<_> = self.error_counts.iter().collect();
            error_entries.sort_by(|a, b| b.1.cmp(a.1));
            let error_summary: Vec<String> = error_entries
                .iter()
                .map(|(category, count)| format!("{}: {}", category, count))
                .collect();
            info!("Error breakdown: {}", error_summary.join(", "));
        } else {
            info!("{}", line);
        }
    }
}
