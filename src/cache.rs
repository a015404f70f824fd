use color_eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Prompts whose submitted text is remembered between runs.
pub const HISTORY_IDS: &[&str] = &["search", "regex_select", "expr", "regex_column", "open", "save", "goto"];

/// Manages the cache directory: prompt histories and log files.
#[derive(Clone, Debug)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Cache rooted at an explicit directory (tests, temp-dir fallback).
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn history_file(&self, history_id: &str) -> PathBuf {
        self.cache_file(&format!("{history_id}_history.txt"))
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Log directory, created on demand.
    pub fn ensure_logs_dir(&self) -> Result<PathBuf> {
        let logs = self.cache_dir.join("logs");
        if !logs.exists() {
            fs::create_dir_all(&logs)?;
        }
        Ok(logs)
    }

    /// Remove every prompt history file. Logs are kept.
    pub fn clear_all(&self) -> Result<()> {
        for id in HISTORY_IDS {
            let path = self.history_file(id);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(file = %path.display(), error = %e, "could not remove cache file");
                }
            }
        }
        Ok(())
    }
}
