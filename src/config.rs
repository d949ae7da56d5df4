//! Configuration for leadharvest.
//!
//! [`Settings`] holds the resolved runtime values. [`Config`] is the optional
//! file (TOML, YAML or JSON, picked by extension) whose values are layered on
//! top of the defaults, followed by environment and command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{HarvestEngine, DEFAULT_BUFFER_SIZE, DEFAULT_RUN_ALL_CONCURRENCY};
use crate::models::NewSourceConfig;
use crate::repository::DbContext;
use crate::scheduler::DEFAULT_TICK;
use crate::scrapers::{ScraperRegistry, ScraperSettings};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "leadharvest.db";

/// Base name of config files looked up on disk.
const CONFIG_BASENAME: &str = "leadharvest";

const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Leads buffered per bulk save.
    pub buffer_size: usize,
    /// Sources harvested at once by `run --all`.
    pub run_all_concurrency: usize,
    /// Scheduler loop period.
    pub scheduler_tick: Duration,
    /// Request layer settings.
    pub scraper: ScraperSettings,
    /// Extra sources seeded by `init`.
    pub sources: Vec<NewSourceConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        // Platform data dir, falling back to home, then the current dir.
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leadharvest");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            run_all_concurrency: DEFAULT_RUN_ALL_CONCURRENCY,
            scheduler_tick: DEFAULT_TICK,
            scraper: ScraperSettings::default(),
            sources: Vec::new(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Full path to the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }

    pub fn create_db_context(&self) -> DbContext {
        DbContext::new(&self.database_path())
    }

    /// Registry with the built-in scrapers and these request settings.
    pub fn scraper_registry(&self) -> ScraperRegistry {
        ScraperRegistry::with_defaults(self.scraper.clone())
    }

    pub fn create_engine(&self, db: DbContext) -> HarvestEngine {
        HarvestEngine::new(db, self.scraper_registry())
            .with_buffer_size(self.buffer_size)
            .with_concurrency(self.run_all_concurrency)
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path, relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_all_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_tick_secs: Option<u64>,
    /// Request layer overrides; omitted keys keep their defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraper: Option<ScraperSettings>,
    /// Sources to seed in addition to the built-in list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<NewSourceConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
            }
            _ => toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find a config file in the working directory or the platform config dir.
    pub fn discover() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok();
        let user = dirs::config_dir().map(|d| d.join(CONFIG_BASENAME));

        for dir in cwd.iter().chain(user.iter()) {
            for ext in CONFIG_EXTENSIONS {
                let path = dir.join(format!("{}.{}", CONFIG_BASENAME, ext));
                if path.is_file() {
                    return Some(path);
                }
            }
        }
        None
    }

    /// Directory used to resolve relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(buffer_size) = self.buffer_size {
            settings.buffer_size = buffer_size.max(1);
        }
        if let Some(concurrency) = self.run_all_concurrency {
            settings.run_all_concurrency = concurrency.max(1);
        }
        if let Some(tick) = self.scheduler_tick_secs {
            settings.scheduler_tick = Duration::from_secs(tick.max(1));
        }
        if let Some(ref scraper) = self.scraper {
            settings.scraper = scraper.clone();
        }
        settings.sources = self.sources.clone();
    }
}

/// Resolve a possibly relative path against `base_dir`, expanding `~`.
fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = match path_str.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => None,
    }
    .unwrap_or_else(|| PathBuf::from(path_str));

    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Resolve settings from defaults, the config file, then overrides.
///
/// Precedence, lowest first: defaults, config file, `HARVEST_DATA_DIR`,
/// explicit options. The config file is `options.config_path`, else
/// `HARVEST_CONFIG`, else the first one [`Config::discover`] finds.
pub async fn load_settings(options: LoadOptions) -> Result<(Settings, Config), ConfigError> {
    let config_path = options
        .config_path
        .or_else(|| env_path("HARVEST_CONFIG"))
        .or_else(Config::discover);

    let config = match config_path {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::load_from_path(&path).await?
        }
        None => Config::default(),
    };

    let mut settings = Settings::default();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = env_path("HARVEST_DATA_DIR") {
        tracing::debug!("Using HARVEST_DATA_DIR: {}", data_dir.display());
        settings.data_dir = data_dir;
    }
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = if data_dir.is_absolute() {
            data_dir
        } else {
            cwd.join(data_dir)
        };
    }

    Ok((settings, config))
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}
