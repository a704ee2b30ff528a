use crate::query::DEFAULT_MAX_RESULTS;
use crate::search::engine::{default_threads, EngineOptions};
use crate::service::MAX_PENDING_ITEMS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub ignore: IgnoreConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
    /// Bytes; larger files are skipped.
    pub max_filesize: Option<u64>,
    pub encoding: Option<String>,
    pub cache_size: usize,
    pub max_pending_items: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            max_filesize: Some(50 * 1024 * 1024),
            encoding: None,
            cache_size: 16,
            max_pending_items: MAX_PENDING_ITEMS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Glob patterns excluded from every query unless the caller opts out.
    pub exclude: Vec<String>,
    pub respect_ignore_files: bool,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            exclude: vec![
                "**/.git".to_string(),
                "**/.svn".to_string(),
                "**/.hg".to_string(),
                "**/.DS_Store".to_string(),
                "**/node_modules".to_string(),
            ],
            respect_ignore_files: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_progress_every")]
    pub progress_every_files: usize,
}

fn default_progress_interval() -> u64 {
    50
}
fn default_progress_every() -> usize {
    100
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            threads: None,
            progress_interval_ms: default_progress_interval(),
            progress_every_files: default_progress_every(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        match Self::find_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn find_config_path() -> Option<PathBuf> {
        if let Some(xdg_config) = dirs::config_dir() {
            let xdg_path = xdg_config.join("wsearch/config.toml");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let home_path = home.join(".wsearch.toml");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        let current_path = Path::new(".wsearch.toml");
        if current_path.exists() {
            return Some(current_path.to_path_buf());
        }

        None
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            threads: self
                .performance
                .threads
                .map_or_else(default_threads, |n| n.clamp(1, num_cpus::get().max(1))),
            progress_interval: Duration::from_millis(self.performance.progress_interval_ms),
            progress_every: self.performance.progress_every_files.max(1),
            respect_ignore_files: self.ignore.respect_ignore_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str("[search]\nmax_results = 7\n").unwrap();
        assert_eq!(cfg.search.max_results, 7);
        assert_eq!(cfg.search.max_pending_items, MAX_PENDING_ITEMS);
        assert!(cfg.ignore.exclude.iter().any(|p| p == "**/.git"));
        assert_eq!(cfg.performance.progress_interval_ms, 50);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = Config::default();
        cfg.performance.threads = Some(2);
        cfg.save(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.performance.threads, Some(2));
        assert_eq!(loaded.search.max_results, cfg.search.max_results);
    }
}
