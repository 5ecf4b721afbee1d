// Configuration loading and parsing (civicfeed.toml, credentials.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

/// Environment variable that overrides `legiscan_api_key` from credentials.toml.
pub const API_KEY_ENV: &str = "LEGISCAN_API_KEY";

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub legiscan: LegiScanConfig,
    pub scoring: ScoringConfig,
    pub reconciler: ReconcilerConfig,
    pub credentials: CredentialsConfig,
    /// Resolved database location. Never empty after loading.
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// civicfeed.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire civicfeed.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AppFile {
    legiscan: LegiScanConfig,
    database: DatabaseSection,
    #[serde(default)]
    scoring: ScoringConfig,
    #[serde(default)]
    reconciler: ReconcilerConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegiScanConfig {
    pub base_url: String,
    /// Two-letter state used when a command does not name one.
    pub default_state: String,
    pub timeout_secs: u64,
}

/// Weights and caps for the bill relevance score. The defaults reproduce the
/// fixed feed ranking: 20 policy baseline, popularity capped at 30, recency
/// starting at 20 and losing half a point per day, 5 geography baseline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub policy_baseline: f64,
    pub geo_baseline: f64,
    pub popularity_multiplier: f64,
    pub comment_weight: f64,
    pub popularity_cap: f64,
    pub recency_max: f64,
    pub recency_decay_per_day: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            policy_baseline: 20.0,
            geo_baseline: 5.0,
            popularity_multiplier: 3.0,
            comment_weight: 2.0,
            popularity_cap: 30.0,
            recency_max: 20.0,
            recency_decay_per_day: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Total remote attempts per mutation; 1 disables retry.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            max_attempts: 1,
            retry_backoff_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub legiscan_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/civicfeed.toml` and
/// (optionally) `config/credentials.toml`, both relative to `base_dir`.
///
/// Does not copy defaults and does not consult the environment; `load_config()`
/// layers both on top.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- civicfeed.toml (required) ---
    let app_path = config_dir.join("civicfeed.toml");
    let app_text = read_file(&app_path)?;
    let app_file: AppFile = toml::from_str(&app_text).map_err(|e| ConfigError::ParseError {
        path: app_path.clone(),
        source: e,
    })?;

    let credentials = load_credentials(&config_dir.join("credentials.toml"))?;

    let db_path = resolve_db_path(&app_file.database.path)?;

    let config = Config {
        legiscan: app_file.legiscan,
        scoring: app_file.scoring,
        reconciler: app_file.reconciler,
        credentials,
        db_path,
    };

    validate(&config)?;

    Ok(config)
}

/// Seed `config/` from `defaults/`: every default file that has no
/// counterpart in `config/` is copied over. `*.example` templates stay behind.
/// Returns the paths written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    match (defaults_dir.is_dir(), config_dir.is_dir()) {
        (false, true) => return Ok(Vec::new()),
        (false, false) => {
            return Err(copy_error(format!(
                "no defaults/ or config/ under {}; run civicfeed from the project root",
                base_dir.display()
            )))
        }
        (true, _) => {}
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut sources: Vec<PathBuf> = std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map_or(true, |ext| ext != "example"))
        .collect();
    sources.sort();

    let mut copied = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if target.exists() {
            continue;
        }
        std::fs::copy(&source, &target).map_err(|e| {
            copy_error(format!("cannot copy {} to {}: {e}", source.display(), target.display()))
        })?;
        copied.push(target);
    }

    Ok(copied)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Convenience wrapper: loads config relative to the current working
/// directory after copying defaults, then applies `LEGISCAN_API_KEY`.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = load_config_from(&cwd)?;
    apply_env_api_key(&mut config, std::env::var(API_KEY_ENV).ok());
    Ok(config)
}

/// Override the credentials-file key with an environment value, ignoring
/// blank values.
pub fn apply_env_api_key(config: &mut Config, env_value: Option<String>) {
    if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
        config.credentials.legiscan_api_key = Some(key);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// credentials.toml is optional; a missing file means no API key.
fn load_credentials(path: &Path) -> Result<CredentialsConfig, ConfigError> {
    if !path.exists() {
        return Ok(CredentialsConfig::default());
    }
    toml::from_str(&read_file(path)?).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// An empty configured path falls back to `<data dir>/civicfeed.db`.
fn resolve_db_path(configured: &str) -> Result<String, ConfigError> {
    if !configured.trim().is_empty() {
        return Ok(configured.to_string());
    }
    let dirs = directories::ProjectDirs::from("org", "civicfeed", "civicfeed").ok_or_else(|| {
        ConfigError::ValidationError {
            field: "database.path".into(),
            message: "empty and no platform data directory is available".into(),
        }
    })?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::ValidationError {
        field: "database.path".into(),
        message: format!("failed to create {}: {e}", data_dir.display()),
    })?;
    Ok(data_dir.join("civicfeed.db").to_string_lossy().into_owned())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.legiscan.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "legiscan.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    let state = config.legiscan.default_state.trim();
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::ValidationError {
            field: "legiscan.default_state".into(),
            message: format!("must be a two-letter state code, got {state:?}"),
        });
    }

    if config.legiscan.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "legiscan.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    // Scoring weights may be zero (switches a term off) but never negative.
    let s = &config.scoring;
    let weight_fields: &[(&str, f64)] = &[
        ("scoring.policy_baseline", s.policy_baseline),
        ("scoring.geo_baseline", s.geo_baseline),
        ("scoring.popularity_multiplier", s.popularity_multiplier),
        ("scoring.comment_weight", s.comment_weight),
        ("scoring.popularity_cap", s.popularity_cap),
        ("scoring.recency_max", s.recency_max),
        ("scoring.recency_decay_per_day", s.recency_decay_per_day),
    ];
    for (name, val) in weight_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be a finite value >= 0, got {val}"),
            });
        }
    }

    if config.reconciler.max_attempts == 0 {
        return Err(ConfigError::ValidationError {
            field: "reconciler.max_attempts".into(),
            message: "must be at least 1".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
