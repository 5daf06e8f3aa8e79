use super::session::Session;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::PathManager;
use media_sync_sources::HttpCache;

pub fn clear_cache(paths: &PathManager, output: &Output) -> Result<()> {
    let session = Session::load(paths)?;
    let cache_file = paths.http_cache_file();
    if !cache_file.exists() {
        output.info(format!("No HTTP cache at {}", cache_file.display()));
        return Ok(());
    }

    let cache = HttpCache::with_storage(&session.config.http_cache, &cache_file)
        .map_err(|e| eyre!("Invalid HTTP cache policy: {:#}", e))?;
    let entries = cache.len();
    cache
        .clear()
        .map_err(|e| eyre!("Failed to clear HTTP cache at {}: {}", cache_file.display(), e))?;

    tracing::info!(operation = "cache_clear", entries, "HTTP cache cleared");
    output.success(format!("Cleared {} cached Trakt responses", entries));
    Ok(())
}
