use super::session::Session;
use super::sync_ui::SyncUI;
use crate::output::Output;
use crate::SyncKind;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::PathManager;
use media_sync_core::{SyncOptions, SyncOrchestrator, SyncResult, WalkFilters};

/// Turn the command line selection into walker filters
pub fn walk_filters(
    libraries: Vec<String>,
    shows: Vec<String>,
    movies: Vec<String>,
    ids: Vec<u64>,
    kinds: &[SyncKind],
) -> WalkFilters {
    let all = kinds.is_empty() || kinds.contains(&SyncKind::All);
    WalkFilters {
        libraries,
        shows,
        movies,
        ids,
        walk_movies: all || kinds.contains(&SyncKind::Movies),
        walk_shows: all || kinds.contains(&SyncKind::Shows),
        walk_watchlist: all || kinds.contains(&SyncKind::Watchlist),
    }
}

pub async fn run_sync(paths: &PathManager, filters: WalkFilters, dry_run: bool, output: &Output) -> Result<()> {
    tracing::debug!("Sync command started");

    let mut session = Session::load(paths)?;
    let clients = session.connect(paths).await?;

    let ui = SyncUI::new();
    let orchestrator = SyncOrchestrator::new(clients.plex.clone(), clients.trakt.clone(), session.config)
        .with_progress(ui.walk_progress());

    let options = SyncOptions { filters, dry_run };
    let result = orchestrator.sync(&options).await;
    ui.finish();
    clients.persist_cache();

    let result = result.map_err(|e| eyre!("Sync failed: {:#}", e))?;
    report(&result, output)
}

fn report(result: &SyncResult, output: &Output) -> Result<()> {
    if !output.is_human() {
        let value = serde_json::to_value(result).map_err(|e| eyre!("Failed to serialize sync result: {}", e))?;
        output.json(&value);
        return Ok(());
    }

    for line in summary_lines(result) {
        output.info(line);
    }
    if result.writes.failed > 0 {
        output.warn(format!("{} Trakt batches failed, see the log for details", result.writes.failed));
    }
    if result.dry_run {
        output.success(format!(
            "Dry run finished in {:.1}s, {} writes would have been sent",
            result.duration.as_secs_f64(),
            result.writes.queued_total()
        ));
    } else {
        output.success(format!("Sync finished in {:.1}s", result.duration.as_secs_f64()));
    }
    Ok(())
}

fn summary_lines(result: &SyncResult) -> Vec<String> {
    let mut lines = vec![format!(
        "Walked {} items: {} matched, {} skipped",
        result.walked, result.resolved, result.skipped
    )];
    if result.partial {
        lines.push("Partial run: library-wide cleanups were skipped".to_string());
    }
    for (op, count) in &result.writes.queued {
        lines.push(format!("  {:<24} {}", op, count));
    }
    if !result.dry_run {
        let writes = &result.writes;
        lines.push(format!(
            "Trakt: {} added, {} updated, {} deleted, {} not found",
            writes.added.total(),
            writes.updated.total(),
            writes.deleted.total(),
            writes.not_found
        ));
    }
    lines
}
