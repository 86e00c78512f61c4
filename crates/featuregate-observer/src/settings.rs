//! Observer settings
//!
//! ```toml
//! known_features = ["APIPriorityAndFairness", "NodeSwap"]
//! config_path = "apiServerArguments.feature-gates"
//! resync_interval_secs = 30
//! ```
//!
//! `config_path` may also be written as an array of segments, which is the
//! only way to address keys that themselves contain a `.`.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::SettingsError;
use crate::observer::FeatureFlagsObserver;

fn default_resync_interval_secs() -> u64 {
    60
}

fn default_config_path() -> Vec<String> {
    vec!["apiServerArguments".to_string(), "feature-gates".to_string()]
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigPath {
    Segments(Vec<String>),
    Dotted(String),
}

fn deserialize_config_path<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ConfigPath::deserialize(deserializer)? {
        ConfigPath::Segments(segments) => segments,
        ConfigPath::Dotted(path) => path.split('.').map(str::to_string).collect(),
    })
}

/// Settings for a [`FeatureFlagsObserver`] and the loop driving it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverSettings {
    /// Feature names the target server understands; empty allows all
    #[serde(default)]
    pub known_features: Vec<String>,
    /// Where in the observed config the flag list lives
    #[serde(
        default = "default_config_path",
        deserialize_with = "deserialize_config_path"
    )]
    pub config_path: Vec<String>,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            known_features: Vec::new(),
            config_path: default_config_path(),
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

impl ObserverSettings {
    /// Parse from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(toml_str)
            .map_err(|e| SettingsError::parse(format!("TOML parse error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse from JSON value
    pub fn from_json(value: serde_json::Value) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_value(value)
            .map_err(|e| SettingsError::parse(format!("JSON parse error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a TOML settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        debug!("Loading observer settings from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.config_path.is_empty() {
            return Err(SettingsError::validation("config_path must not be empty"));
        }
        if self.config_path.iter().any(|segment| segment.is_empty()) {
            return Err(SettingsError::validation(
                "config_path must not contain empty segments",
            ));
        }
        if self.resync_interval_secs == 0 {
            return Err(SettingsError::validation(
                "resync_interval_secs must be > 0",
            ));
        }
        Ok(())
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Build the observer these settings describe
    pub fn build_observer(&self) -> FeatureFlagsObserver {
        FeatureFlagsObserver::new(self.known_features.clone(), self.config_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = ObserverSettings::from_toml("").unwrap();
        assert_eq!(settings, ObserverSettings::default());
        assert_eq!(settings.resync_interval(), Duration::from_secs(60));
        assert!(settings.build_observer().allow_all());
    }

    #[test]
    fn test_dotted_path() {
        let settings = ObserverSettings::from_toml(
            r#"
known_features = ["NodeSwap"]
config_path = "extendedArguments.feature-gates"
resync_interval_secs = 5
"#,
        )
        .unwrap();

        assert_eq!(
            settings.config_path,
            vec!["extendedArguments".to_string(), "feature-gates".to_string()]
        );
        let observer = settings.build_observer();
        assert!(observer.is_allowed("NodeSwap"));
        assert!(!observer.is_allowed("GatewayAPI"));
    }

    #[test]
    fn test_segment_path_keeps_dots() {
        let settings = ObserverSettings::from_json(json!({
            "config_path": ["kubelet", "feature.gates"]
        }))
        .unwrap();
        assert_eq!(settings.config_path, vec!["kubelet", "feature.gates"]);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            ObserverSettings::from_toml("config_path = []"),
            Err(SettingsError::Validation(_))
        ));
        assert!(matches!(
            ObserverSettings::from_toml("config_path = \"a..b\""),
            Err(SettingsError::Validation(_))
        ));
        assert!(matches!(
            ObserverSettings::from_toml("resync_interval_secs = 0"),
            Err(SettingsError::Validation(_))
        ));
        assert!(matches!(
            ObserverSettings::from_toml("known_features = 3"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("observer.toml");
        std::fs::write(&path, "known_features = [\"A\", \"B\"]\n").unwrap();

        let settings = ObserverSettings::from_file(&path).unwrap();
        assert_eq!(settings.known_features, vec!["A", "B"]);

        let missing = ObserverSettings::from_file(temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(SettingsError::Io(_))));
    }
}
