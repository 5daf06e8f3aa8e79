use anyhow::Result;
use media_sync_config::Config;
use media_sync_sources::{PlexServer, TraktApi};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

use crate::list_collection::ListCollection;
use crate::plugins::{enabled_plugins, PluginManager, RunContext};
use crate::rate::RateGovernor;
use crate::resolver::Resolver;
use crate::retry::RetryPolicy;
use crate::summary::WriteSummary;
use crate::trakt_state::TraktState;
use crate::walker::{self, WalkFilters, WalkProgress, WalkStats, Walker};
use crate::write_queue::{QueueHandle, TraktWriter, WriteQueue};

/// Runs one Plex to Trakt reconciliation
pub struct SyncOrchestrator {
    plex: Arc<dyn PlexServer>,
    trakt: Arc<dyn TraktApi>,
    config: Arc<Config>,
    governor: Arc<RateGovernor>,
    retry: RetryPolicy,
    progress: Option<WalkProgress>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub filters: WalkFilters,
    /// Read everything, write nothing
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub walked: usize,
    pub resolved: usize,
    pub skipped: usize,
    /// Plugins that stayed enabled after `init`
    pub plugins: Vec<String>,
    pub partial: bool,
    pub dry_run: bool,
    pub writes: WriteSummary,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl SyncOrchestrator {
    pub fn new(plex: Arc<dyn PlexServer>, trakt: Arc<dyn TraktApi>, config: Config) -> Self {
        Self {
            plex,
            trakt,
            config: Arc::new(config),
            governor: Arc::new(RateGovernor::default()),
            retry: RetryPolicy::default(),
            progress: None,
        }
    }

    /// Share the write spacing with other Trakt writers in the process
    pub fn with_governor(mut self, governor: Arc<RateGovernor>) -> Self {
        self.governor = governor;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_progress(mut self, progress: WalkProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[instrument(skip(self, options), fields(dry_run = options.dry_run))]
    pub async fn sync(&self, options: &SyncOptions) -> Result<SyncResult> {
        let start = Instant::now();
        let partial = options.filters.is_partial();
        info!(
            operation = "sync_start",
            partial,
            dry_run = options.dry_run,
            "Starting sync"
        );

        let writer = TraktWriter::new(self.trakt.clone(), self.governor.clone(), self.retry)
            .dry_run(options.dry_run);
        let queue = WriteQueue::start(writer, Duration::from_secs(self.config.batch_delay));

        let walked = self.run(options, queue.handle()).await;
        // writes queued before a failure still go out
        let writes = queue.close().await;

        let (stats, plugins) = match walked {
            Ok(walked) => walked,
            Err(e) => {
                error!(operation = "sync", status = "error", error = %e, "Sync aborted");
                return Err(e.into());
            }
        };
        let writes = writes?;

        let duration = start.elapsed();
        info!(
            operation = "sync_complete",
            duration_ms = duration.as_millis() as u64,
            walked = stats.walked,
            resolved = stats.resolved,
            skipped = stats.skipped,
            queued = writes.queued_total(),
            "Sync completed"
        );

        Ok(SyncResult {
            walked: stats.walked,
            resolved: stats.resolved,
            skipped: stats.skipped,
            plugins,
            partial,
            dry_run: options.dry_run,
            writes,
            duration,
        })
    }

    async fn run(
        &self,
        options: &SyncOptions,
        queue: QueueHandle,
    ) -> crate::error::SyncResult<(WalkStats, Vec<String>)> {
        let plan = walker::plan(
            self.plex.as_ref(),
            &options.filters,
            &self.config.excluded_libraries,
        )
        .await?;

        let resolver = Arc::new(Resolver::new(self.trakt.clone(), self.retry));
        let ctx = RunContext {
            plex: self.plex.clone(),
            state: Arc::new(TraktState::new(self.trakt.clone(), self.retry)),
            resolver: resolver.clone(),
            queue,
            config: self.config.clone(),
            partial: options.filters.is_partial(),
            walk_watchlist: options.filters.walk_watchlist,
            dry_run: options.dry_run,
            lists: ListCollection::default(),
        };

        let mut manager = PluginManager::new(enabled_plugins(&self.config), ctx);
        manager.init().await?;

        let mut walker = Walker::new(self.plex.clone(), resolver, self.config.plex.page_size);
        if let Some(progress) = &self.progress {
            walker = walker.with_progress(progress.clone());
        }
        let stats = walker.walk(&plan, &mut manager).await?;
        manager.fini().await?;

        let plugins = manager.names().into_iter().map(String::from).collect();
        Ok((stats, plugins))
    }
}

#[cfg(test)]
mod tests;
