use super::session::Session;
use super::sync_ui::{is_interactive, PlaybackBars};
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::PathManager;
use media_sync_core::{
    EventDispatcher, RateGovernor, Resolver, RetryPolicy, TraktWriter, WatchStateUpdater, WriteQueue,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn run_watch(paths: &PathManager, output: &Output) -> Result<()> {
    let mut session = Session::load(paths)?;
    let clients = session.connect(paths).await?;
    let config = &session.config;

    let retry = RetryPolicy::default();
    let writer = TraktWriter::new(clients.trakt.clone(), Arc::new(RateGovernor::default()), retry);
    let queue = WriteQueue::start(writer, Duration::from_secs(config.batch_delay));
    let resolver = Arc::new(Resolver::new(clients.trakt.clone(), retry));

    let mut updater = WatchStateUpdater::new(
        clients.plex.clone(),
        resolver,
        queue.handle(),
        config.watch.clone(),
        config.plex.username.clone(),
    );

    let bars = if config.watch.media_progressbar && is_interactive() {
        let (tx, rx) = mpsc::unbounded_channel();
        updater = updater.with_progress(tx);
        Some(tokio::spawn(PlaybackBars::new().run(rx)))
    } else {
        None
    };

    let mut dispatcher = EventDispatcher::new(Duration::from_secs(config.watch.restart_interval));
    dispatcher.register(Box::new(updater));

    info!(
        operation = "watch_start",
        threshold = config.watch.scrobble_threshold,
        "Listening for Plex events"
    );
    output.info("Listening for Plex events, press Ctrl-C to stop");

    dispatcher
        .run(clients.plex.as_ref(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!(operation = "watch_stop", "Shutting down, flushing pending Trakt writes");
    // releases the progress sender so the bars task ends
    drop(dispatcher);
    let writes = queue.close().await;
    if let Some(bars) = bars {
        let _ = bars.await;
    }
    clients.persist_cache();

    let writes = writes.map_err(|e| eyre!("Failed to flush Trakt writes: {}", e))?;
    output.success(format!("Stopped watching, {} scrobbles sent", writes.scrobbles));
    Ok(())
}
