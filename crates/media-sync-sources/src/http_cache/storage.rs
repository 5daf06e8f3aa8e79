use anyhow::Result;
use bincode::{deserialize, serialize};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::CacheEntry;

/// On-disk store for cached HTTP responses
///
/// Uses bincode with gzip compression; a file in an older format is backed
/// up and replaced by an empty cache.
pub struct CacheStorage {
    cache_path: PathBuf,
    use_compression: bool,
}

impl CacheStorage {
    pub fn new(cache_path: &Path) -> Self {
        Self {
            cache_path: cache_path.to_path_buf(),
            use_compression: true,
        }
    }

    pub fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        if !self.cache_path.exists() {
            debug!("HTTP cache file does not exist, starting empty");
            return Ok(HashMap::new());
        }

        let start = std::time::Instant::now();
        let data = std::fs::read(&self.cache_path)?;

        let decoded = if self.use_compression {
            let mut decoder = GzDecoder::new(&data[..]);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            decompressed
        } else {
            data
        };

        let entries: HashMap<String, CacheEntry> = match deserialize(&decoded) {
            Ok(entries) => entries,
            Err(e) => {
                let backup_path = self.cache_path.with_extension("bak");
                if let Err(backup_err) = std::fs::copy(&self.cache_path, &backup_path) {
                    warn!(
                        "Failed to backup incompatible HTTP cache file: {}. Starting with empty cache.",
                        backup_err
                    );
                } else {
                    info!(
                        "HTTP cache format incompatible (error: {}). Backed up old cache to {:?} and starting with empty cache.",
                        e, backup_path
                    );
                }
                return Ok(HashMap::new());
            }
        };

        debug!("Loaded HTTP cache: {} entries in {:?}", entries.len(), start.elapsed());
        Ok(entries)
    }

    pub fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let start = std::time::Instant::now();
        let serialized = serialize(entries)?;

        let encoded = if self.use_compression {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&serialized)?;
            encoder.finish()?
        } else {
            serialized
        };

        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // write to a temp file, then rename
        let temp_path = self.cache_path.with_extension("tmp");
        std::fs::write(&temp_path, encoded)?;
        std::fs::rename(&temp_path, &self.cache_path)?;

        debug!("Saved HTTP cache: {} entries in {:?}", entries.len(), start.elapsed());
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        if self.cache_path.exists() {
            Ok(std::fs::metadata(&self.cache_path)?.len())
        } else {
            Ok(0)
        }
    }

    pub fn remove(&self) -> Result<()> {
        if self.cache_path.exists() {
            std::fs::remove_file(&self.cache_path)?;
        }
        Ok(())
    }
}
