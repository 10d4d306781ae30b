//! Configurator configuration
//!
//! Design-time values for the detail page: the color enumeration, the default
//! color, the fade delay and the page addressing used by the browse listing.
//!
//! Sources, lowest precedence first:
//! 1. `ConfiguratorConfig::default()`
//! 2. YAML file (path from `CONFIGURATOR_CONFIG` when using `from_env`)
//! 3. `CONFIGURATOR_*` environment variables

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{default_swatches, ColorSwatch};

/// Default fade-out delay before an image swap commits
pub const DEFAULT_SWAP_DELAY_MS: u64 = 250;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Color enumeration is empty")]
    NoColors,

    #[error("Duplicate color id '{0}'")]
    DuplicateColor(String),

    #[error("swap_delay_ms must be greater than zero")]
    ZeroDelay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfiguratorConfig {
    /// Fade-out duration before the new image is committed
    pub swap_delay_ms: u64,
    /// Fixed color enumeration, in display order
    pub colors: Vec<ColorSwatch>,
    /// Preferred default color label; falls back to the first swatch
    pub default_color: String,
    pub currency_symbol: String,
    /// Page-state key carrying the entity id
    pub identifier_param: String,
    /// Path of the detail page, used for browse links
    pub detail_path: String,
}

impl Default for ConfiguratorConfig {
    fn default() -> Self {
        Self {
            swap_delay_ms: DEFAULT_SWAP_DELAY_MS,
            colors: default_swatches(),
            default_color: "White".to_string(),
            currency_symbol: "₹".to_string(),
            identifier_param: "c__carId".to_string(),
            detail_path: "/car-detail".to_string(),
        }
    }
}

impl ConfiguratorConfig {
    /// Load config from the process environment.
    ///
    /// Reads the YAML file named by `CONFIGURATOR_CONFIG` if set, then applies
    /// the remaining `CONFIGURATOR_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("CONFIGURATOR_CONFIG") {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|var| std::env::var(var).ok())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CONFIGURATOR_*` overrides from an arbitrary lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CONFIGURATOR_SWAP_DELAY_MS") {
            self.swap_delay_ms = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "CONFIGURATOR_SWAP_DELAY_MS",
                value,
            })?;
        }
        if let Some(value) = lookup("CONFIGURATOR_DEFAULT_COLOR") {
            self.default_color = value;
        }
        if let Some(value) = lookup("CONFIGURATOR_CURRENCY_SYMBOL") {
            self.currency_symbol = value;
        }
        if let Some(value) = lookup("CONFIGURATOR_IDENTIFIER_PARAM") {
            self.identifier_param = value;
        }
        if let Some(value) = lookup("CONFIGURATOR_DETAIL_PATH") {
            self.detail_path = value;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.colors.is_empty() {
            return Err(ConfigError::NoColors);
        }
        let mut seen = HashSet::new();
        for swatch in &self.colors {
            if !seen.insert(swatch.id.as_str()) {
                return Err(ConfigError::DuplicateColor(swatch.id.to_string()));
            }
        }
        if self.swap_delay_ms == 0 {
            return Err(ConfigError::ZeroDelay);
        }
        Ok(())
    }

    pub fn swap_delay(&self) -> Duration {
        Duration::from_millis(self.swap_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConfiguratorConfig::default();
        assert_eq!(config.swap_delay(), Duration::from_millis(250));
        assert_eq!(config.colors.len(), 3);
        assert_eq!(config.default_color, "White");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_keeps_defaults() {
        let config = ConfiguratorConfig::from_yaml_str(
            r#"
swap_delay_ms: 400
colors:
  - { id: red, label: Red }
  - { id: blue, label: Blue }
"#,
        )
        .unwrap();
        assert_eq!(config.swap_delay_ms, 400);
        assert_eq!(config.colors[1].label, "Blue");
        assert_eq!(config.currency_symbol, "₹");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "currency_symbol: \"$\"").unwrap();
        let config = ConfiguratorConfig::load(file.path()).unwrap();
        assert_eq!(config.currency_symbol, "$");
    }

    #[test]
    fn test_missing_file() {
        let err = ConfiguratorConfig::load("/nonexistent/configurator.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CONFIGURATOR_SWAP_DELAY_MS", "100"),
            ("CONFIGURATOR_DEFAULT_COLOR", "Black"),
        ]
        .into_iter()
        .collect();
        let config = ConfiguratorConfig::default()
            .with_overrides(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.swap_delay_ms, 100);
        assert_eq!(config.default_color, "Black");
    }

    #[test]
    fn test_bad_override() {
        let err = ConfiguratorConfig::default()
            .with_overrides(|var| (var == "CONFIGURATOR_SWAP_DELAY_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = ConfiguratorConfig {
            colors: vec![],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoColors)));

        config.colors = vec![
            ColorSwatch::new("black", "Black"),
            ColorSwatch::new("black", "Jet"),
        ];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateColor(id)) if id == "black"
        ));

        config.colors = default_swatches();
        config.swap_delay_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroDelay)));
    }
}
