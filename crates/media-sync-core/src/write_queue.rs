use media_sync_models::{MediaType, PayloadEntry, ScrobbleAction, SyncOp, SyncPayload, TraktItem};
use media_sync_sources::{SourceError, TraktApi};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::rate::RateGovernor;
use crate::retry::RetryPolicy;
use crate::summary::WriteSummary;

const QUEUE_CAPACITY: usize = 256;

/// A Trakt write waiting in the queue
#[derive(Debug, Clone)]
pub enum WriteRequest {
    /// Batched per operation and submitted on the next flush
    Sync { op: SyncOp, payload: SyncPayload },
    /// Submitted as soon as it is dequeued
    Scrobble {
        action: ScrobbleAction,
        item: TraktItem,
        progress: f64,
    },
}

enum Message {
    Request(WriteRequest),
    Close,
}

/// Producer side of the write queue
#[derive(Clone)]
pub struct QueueHandle {
    sender: mpsc::Sender<Message>,
}

impl QueueHandle {
    pub async fn submit(&self, request: WriteRequest) -> SyncResult<()> {
        self.sender
            .send(Message::Request(request))
            .await
            .map_err(|_| SyncError::QueueClosed)
    }

    pub async fn add(&self, op: SyncOp, media_type: MediaType, entry: PayloadEntry) -> SyncResult<()> {
        self.submit(WriteRequest::Sync {
            op,
            payload: SyncPayload::single(media_type, entry),
        })
        .await
    }

    pub async fn scrobble(&self, action: ScrobbleAction, item: TraktItem, progress: f64) -> SyncResult<()> {
        self.submit(WriteRequest::Scrobble {
            action,
            item,
            progress,
        })
        .await
    }
}

/// Consumer side: batches per operation and submits through governor and retry
pub struct TraktWriter {
    trakt: Arc<dyn TraktApi>,
    governor: Arc<RateGovernor>,
    retry: RetryPolicy,
    dry_run: bool,
    pending: BTreeMap<SyncOp, SyncPayload>,
    summary: WriteSummary,
    fatal: Option<SyncError>,
}

impl TraktWriter {
    pub fn new(trakt: Arc<dyn TraktApi>, governor: Arc<RateGovernor>, retry: RetryPolicy) -> Self {
        Self {
            trakt,
            governor,
            retry,
            dry_run: false,
            pending: BTreeMap::new(),
            summary: WriteSummary::default(),
            fatal: None,
        }
    }

    /// Log every write instead of submitting it
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self.summary.dry_run = dry_run;
        self
    }

    pub async fn accept(&mut self, request: WriteRequest) {
        match request {
            WriteRequest::Sync { op, payload } => {
                self.summary.record_queued(op, payload.len());
                self.pending.entry(op).or_default().extend(payload);
            }
            WriteRequest::Scrobble {
                action,
                item,
                progress,
            } => self.scrobble(action, &item, progress).await,
        }
    }

    /// Submit every pending batch, one request per operation
    pub async fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (op, payload) in pending {
            if payload.is_empty() {
                continue;
            }
            let entries = payload.len();
            self.summary.record_flushed(entries);

            if self.dry_run {
                info!("[dry-run] Would submit {} with {} entries", op, entries);
                continue;
            }

            let args = format!(
                "movies: {}, shows: {}, episodes: {}",
                payload.movies.len(),
                payload.shows.len(),
                payload.episodes.len()
            );
            let trakt = &self.trakt;
            let governor = &self.governor;
            let payload = &payload;
            let result = self
                .retry
                .run(op.as_str(), &args, move || async move {
                    governor.wait_if_needed().await;
                    trakt.sync(op, payload).await
                })
                .await;

            match result {
                Ok(response) => {
                    info!(
                        "{}: added [{}] updated [{}] existing [{}] deleted [{}]",
                        op, response.added, response.updated, response.existing, response.deleted
                    );
                    if !response.not_found.is_empty() {
                        error!(
                            "{}: {} entries not found on Trakt: {:?}",
                            op,
                            response.not_found.len(),
                            response.not_found
                        );
                    }
                    self.summary.record_response(&response);
                }
                Err(e) => {
                    error!("{} failed: {}", op, e);
                    self.summary.record_failed_with_error(op.as_str());
                    if e.is_fatal() && self.fatal.is_none() {
                        self.fatal = Some(e);
                    }
                }
            }
        }
    }

    async fn scrobble(&mut self, action: ScrobbleAction, item: &TraktItem, progress: f64) {
        if self.dry_run {
            info!("[dry-run] Would {} {} at {:.2}%", action, item.label(), progress);
            return;
        }

        let trakt = &self.trakt;
        let governor = &self.governor;
        let args = format!("{}, {:.2}", item.trakt_id, progress);
        let result = self
            .retry
            .run(&action.to_string(), &args, move || async move {
                governor.wait_if_needed().await;
                trakt.scrobble(action, item, progress).await
            })
            .await;

        match result {
            Ok(()) => self.summary.record_scrobble(),
            // checkin in progress or duplicate scrobble; scrobble state is advisory
            Err(SyncError::Source(SourceError::Conflict(message))) => {
                error!("{} {} rejected with conflict: {}", action, item.label(), message);
                self.summary.record_failed_with_error("conflict");
            }
            Err(e) => {
                error!("{} {} failed: {}", action, item.label(), e);
                self.summary.record_failed_with_error(&action.to_string());
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.values().map(|p| p.len()).sum()
    }

    pub fn finish(self) -> (WriteSummary, Option<SyncError>) {
        (self.summary, self.fatal)
    }
}

/// Single-consumer Trakt write queue
///
/// Producers post through cloned [`QueueHandle`]s. The consumer task flushes
/// batches every `batch_delay` and once more when the queue is closed; FIFO
/// order is kept per operation.
pub struct WriteQueue {
    handle: QueueHandle,
    consumer: JoinHandle<(WriteSummary, Option<SyncError>)>,
}

impl WriteQueue {
    pub fn start(writer: TraktWriter, batch_delay: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let consumer = tokio::spawn(consume(writer, receiver, batch_delay));
        Self {
            handle: QueueHandle { sender },
            consumer,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Drain the queue, flush what is left and stop the consumer
    ///
    /// Fails with the first fatal write error, if any batch hit one.
    pub async fn close(self) -> SyncResult<WriteSummary> {
        // the consumer may already be gone if it panicked
        let _ = self.handle.sender.send(Message::Close).await;
        let (summary, fatal) = self.consumer.await.map_err(|e| {
            SyncError::Source(SourceError::Other(format!("Write queue consumer failed: {}", e)))
        })?;
        summary.log_summary("Trakt writes");
        match fatal {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

async fn consume(
    mut writer: TraktWriter,
    mut receiver: mpsc::Receiver<Message>,
    batch_delay: Duration,
) -> (WriteSummary, Option<SyncError>) {
    let mut ticker = interval_at(Instant::now() + batch_delay, batch_delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(Message::Request(request)) => writer.accept(request).await,
                Some(Message::Close) | None => break,
            },
            _ = ticker.tick() => {
                if writer.pending_len() > 0 {
                    debug!("Flushing {} queued Trakt writes", writer.pending_len());
                    writer.flush().await;
                }
            }
        }
    }

    receiver.close();
    while let Ok(Message::Request(request)) = receiver.try_recv() {
        warn!("Write submitted while closing the queue, processing it");
        writer.accept(request).await;
    }
    writer.flush().await;
    writer.finish()
}
