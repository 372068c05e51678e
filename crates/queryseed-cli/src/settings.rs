use std::path::{Path, PathBuf};

use queryseed_ai::GatewayConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "queryseed.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of `queryseed.toml`. Every table and key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub ai: GatewayConfig,
    pub generation: GenerationSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationSettings {
    pub seed: u64,
    pub rows: u64,
    pub max_attempts: u32,
    pub include_parents: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            rows: 10,
            max_attempts: 5,
            include_parents: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputSettings {
    pub run_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from("runs"),
        }
    }
}

/// Load settings from `explicit`, or from `queryseed.toml` when present.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, SettingsError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !path.exists() {
                return Ok(Settings::default());
            }
            path
        }
    };

    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
        path: path.clone(),
        source,
    })?;
    parse_settings(&content).map_err(|source| SettingsError::Toml { path, source })
}

pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.generation.seed, 42);
        assert!(!settings.ai.enabled);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let settings = parse_settings(
            r#"
            [generation]
            rows = 25

            [ai]
            enabled = true

            [[ai.endpoints]]
            model = "gemini-1.5-flash"
            daily_limit = 10
            "#,
        )
        .unwrap();

        assert_eq!(settings.generation.rows, 25);
        assert_eq!(settings.generation.max_attempts, 5);
        assert!(settings.ai.enabled);
        assert_eq!(settings.ai.endpoints.len(), 1);
        assert_eq!(settings.ai.endpoints[0].min_interval_ms, 0);
        assert_eq!(settings.output.run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn bundled_fixture_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/queryseed.toml");
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.ai.api_key_env, "QUERYSEED_AI_API_KEY");
        assert_eq!(settings.ai.endpoints.len(), 2);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_settings(Some(Path::new("/nonexistent/queryseed.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn unknown_value_types_are_rejected() {
        assert!(parse_settings("[generation]\nrows = \"many\"").is_err());
    }
}
