//! Coordinator configuration
//!
//! Loaded from TOML, then overridden from environment variables:
//!
//! - `BRUSH_DEFAULT_RESOLUTION`: resolution for dimensions without one (default: 100)
//! - `BRUSH_LOG`: tracing filter directive (default: info)
//! - `BRUSH_LOG_JSON`: emit JSON logs (default: false)

use crate::scale::DEFAULT_RESOLUTION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io(std::io::Error),
    /// Config file is not valid TOML for this schema
    Parse(toml::de::Error),
    /// Values parsed but are not usable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// How a brush event decides which dimensions it can answer from cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Emit every dimension whose two boundaries are cached
    #[default]
    PerDimension,
    /// Emit only when both boundaries are cached for every dimension
    AllDimensions,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub level: String,
    /// JSON output instead of human-readable lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Main coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Resolution for dimensions not listed in `resolutions`
    pub default_resolution: u32,
    /// Per-dimension index-space resolution
    pub resolutions: BTreeMap<String, u32>,
    pub lookup: LookupMode,
    pub logging: LoggingConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            default_resolution: DEFAULT_RESOLUTION,
            resolutions: BTreeMap::new(),
            lookup: LookupMode::PerDimension,
            logging: LoggingConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: CoordinatorConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Apply `BRUSH_*` environment variables on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(resolution) = std::env::var("BRUSH_DEFAULT_RESOLUTION")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.default_resolution = resolution;
        }
        if let Ok(level) = std::env::var("BRUSH_LOG") {
            self.logging.level = level;
        }
        if let Ok(json) = std::env::var("BRUSH_LOG_JSON") {
            self.logging.json = json == "true" || json == "1";
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_resolution == 0 {
            return Err(ConfigError::Invalid(
                "default_resolution must be positive".to_string(),
            ));
        }
        if let Some((name, _)) = self.resolutions.iter().find(|(_, value)| **value == 0) {
            return Err(ConfigError::Invalid(format!(
                "resolution for '{}' must be positive",
                name
            )));
        }
        Ok(())
    }

    /// Resolution configured for `dimension`, if any
    pub fn resolution_for(&self, dimension: &str) -> Option<u32> {
        self.resolutions.get(dimension).copied()
    }

    /// Configuration for tests (quiet logging)
    pub fn test() -> Self {
        CoordinatorConfig {
            logging: LoggingConfig {
                level: "warn".to_string(),
                json: false,
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.default_resolution, 100);
        assert_eq!(config.lookup, LookupMode::PerDimension);
        assert!(config.resolutions.is_empty());
        assert!(!config.logging.json);
    }

    #[test]
    fn test_parse_full_toml() {
        let config = CoordinatorConfig::from_toml_str(
            r#"
            default_resolution = 50
            lookup = "all_dimensions"

            [resolutions]
            delay = 200
            distance = 25

            [logging]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.default_resolution, 50);
        assert_eq!(config.lookup, LookupMode::AllDimensions);
        assert_eq!(config.resolution_for("delay"), Some(200));
        assert_eq!(config.resolution_for("distance"), Some(25));
        assert_eq!(config.resolution_for("time"), None);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = CoordinatorConfig::from_toml_str("lookup = \"per_dimension\"").unwrap();
        assert_eq!(config.default_resolution, DEFAULT_RESOLUTION);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let result = CoordinatorConfig::from_toml_str("[resolutions]\nx = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = CoordinatorConfig::from_toml_str("default_resolution = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = CoordinatorConfig::from_toml_str("lookup = \"sideways\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_resolution = 10").unwrap();
        let config = CoordinatorConfig::load(file.path()).unwrap();
        assert_eq!(config.default_resolution, 10);

        let missing = CoordinatorConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("BRUSH_DEFAULT_RESOLUTION", "40");
        std::env::set_var("BRUSH_LOG_JSON", "1");
        let config = CoordinatorConfig::default().with_env_overrides().unwrap();
        std::env::remove_var("BRUSH_DEFAULT_RESOLUTION");
        std::env::remove_var("BRUSH_LOG_JSON");

        assert_eq!(config.default_resolution, 40);
        assert!(config.logging.json);
    }
}
