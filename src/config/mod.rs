use crate::logging::LoggingConfig;
use crate::search::engine::{MatchStrategy, SearchOptions, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub search: SearchConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub model: PathBuf,
    pub space: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub tolerance: f32,
    pub batch_size: usize,
    pub max_workers: Option<usize>,
    pub strategy: MatchStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Diagnose the first `max_candidates` candidates after each run
    pub enabled: bool,
    pub max_candidates: usize,
    /// Diagnose the first `max_found` accepted offsets after each run
    pub diagnose_found: bool,
    pub max_found: usize,
    /// Mismatches reported per diagnosed candidate
    pub max_reported: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("data/model.json"),
            space: PathBuf::from("data/space.json"),
            output: PathBuf::from("data/offsets.json"),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: None,
            strategy: MatchStrategy::Fingerprint,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_candidates: 3,
            diagnose_found: true,
            max_found: 3,
            max_reported: 5,
        }
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_workers: config.max_workers,
            strategy: config.strategy,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> anyhow::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(1e-6..=1e-2).contains(&self.search.tolerance) {
            errors.push(format!(
                "Search tolerance must be within [1e-6, 1e-2], got {}",
                self.search.tolerance
            ));
        }

        if !(10..=500).contains(&self.search.batch_size) {
            errors.push(format!(
                "Search batch_size must be within [10, 500], got {}",
                self.search.batch_size
            ));
        }

        if self.search.max_workers == Some(0) {
            errors.push("Search max_workers must be positive".to_string());
        }

        if !(1..=20).contains(&self.diagnostics.max_candidates) {
            errors.push("Diagnostics max_candidates must be within [1, 20]".to_string());
        }

        if self.diagnostics.max_reported == 0 {
            errors.push("Diagnostics max_reported must be positive".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

pub fn load_config_or_default(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => match Config::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    for error in &errors {
                        tracing::warn!("Configuration validation error: {}", error);
                    }
                    tracing::warn!("Using default configuration instead");
                    Config::default()
                } else {
                    config
                }
            }
            Err(e) => {
                tracing::warn!("Failed to load config from '{}': {}", path.display(), e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        None => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.batch_size, 50);
        assert!((config.search.tolerance - 1e-4).abs() < f32::EPSILON);
        assert_eq!(config.search.strategy, MatchStrategy::Fingerprint);
        assert!(!config.diagnostics.enabled);
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = Config::default();
        config.search.tolerance = 0.5;
        config.search.batch_size = 5;
        config.search.max_workers = Some(0);
        config.diagnostics.max_candidates = 50;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].contains("tolerance"));
    }

    #[test]
    fn test_json_and_toml_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.search.batch_size = 120;
        config.search.strategy = MatchStrategy::Tolerance;
        config.diagnostics.enabled = true;

        let json_path = dir.path().join("config.json");
        config.save_to_file(&json_path, ConfigFormat::Json).unwrap();
        let loaded = Config::load_from_file(&json_path).unwrap();
        assert_eq!(loaded.search.batch_size, 120);
        assert_eq!(loaded.search.strategy, MatchStrategy::Tolerance);

        let toml_path = dir.path().join("config.toml");
        config.save_to_file(&toml_path, ConfigFormat::Toml).unwrap();
        let loaded = Config::load_from_file(&toml_path).unwrap();
        assert!(loaded.diagnostics.enabled);
        assert_eq!(loaded.paths.model, PathBuf::from("data/model.json"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "[search]\ntolerance = 0.001\n").unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert!((loaded.search.tolerance - 1e-3).abs() < 1e-9);
        assert_eq!(loaded.search.batch_size, 50);
        assert_eq!(loaded.diagnostics.max_reported, 5);
    }

    #[test]
    fn test_load_config_or_default_falls_back() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let config = load_config_or_default(Some(&missing));
        assert_eq!(config.search.batch_size, 50);

        let invalid = dir.path().join("invalid.toml");
        fs::write(&invalid, "[search]\nbatch_size = 1\n").unwrap();
        assert_eq!(load_config_or_default(Some(&invalid)).search.batch_size, 50);
    }

    #[test]
    fn test_search_options_from_config() {
        let config = SearchConfig {
            batch_size: 64,
            max_workers: Some(2),
            ..SearchConfig::default()
        };
        let options = SearchOptions::from(&config);
        assert_eq!(options.batch_size, 64);
        assert_eq!(options.max_workers, Some(2));
    }
}
