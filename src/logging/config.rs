//! Logging configuration system
//!
//! Per-component log levels and output destinations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Level for the search engine and service
    pub search_level: String,

    /// Level for set statistics and offset diagnostics
    pub diagnostics_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            search_level: "info".to_string(),
            diagnostics_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose configuration for local development
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            search_level: "trace".to_string(),
            diagnostics_level: "debug".to_string(),
        }
    }

    /// Quiet configuration writing JSON logs only
    pub fn production() -> Self {
        Self {
            global_level: "warn".to_string(),
            console_output: false,
            log_directory: Some(PathBuf::from("/var/log/offset-finder")),
            include_file_location: false,
            search_level: "info".to_string(),
            diagnostics_level: "warn".to_string(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("search_level", &self.search_level),
            ("diagnostics_level", &self.diagnostics_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Get the effective log level for a specific component
    pub fn component_level(&self, component: &str) -> &str {
        match component {
            "search" | "engine" | "service" => &self.search_level,
            "diagnostics" | "validation" => &self.diagnostics_level,
            _ => &self.global_level,
        }
    }

    /// Filter directive string for `EnvFilter`; the global level also
    /// covers the binary and dependencies
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        format!(
            "{global},{krate}::search={search},{krate}::utils::validation={diag}",
            krate = krate,
            global = self.global_level,
            search = self.search_level,
            diag = self.diagnostics_level,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.global_level, "info");
        assert!(config.console_output);
        assert!(config.log_directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = LoggingConfig::development();
        assert_eq!(dev.search_level, "trace");
        assert!(dev.include_file_location);

        let prod = LoggingConfig::production();
        assert_eq!(prod.global_level, "warn");
        assert!(!prod.console_output);
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoggingConfig::default();
        config.global_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.global_level = "debug".to_string();
        config.diagnostics_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_component_level_selection() {
        let config = LoggingConfig::development();
        assert_eq!(config.component_level("search"), "trace");
        assert_eq!(config.component_level("diagnostics"), "debug");
        assert_eq!(config.component_level("unknown"), "debug");
    }

    #[test]
    fn test_filter_directives() {
        let directives = LoggingConfig::default().filter_directives();
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("offset_finder::search=info"));
    }
}
