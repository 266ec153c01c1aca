// ⚙️ Settings - TOML configuration with environment overrides
//
// Lookup order: explicit path, ./cohd.toml, built-in defaults.
// COHD_DATABASE and COHD_OXO_URL override whatever was loaded.

use crate::association::DEFAULT_DATASET_ID;
use crate::error::{CohdError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "cohd.toml";
pub const DEFAULT_OXO_URL: &str = "https://www.ebi.ac.uk/spot/oxo/api/search";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite snapshot holding the concept and count tables
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_dataset_id")]
    pub default_dataset_id: i64,

    #[serde(default)]
    pub oxo: GatewaySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_oxo_url")]
    pub url: String,

    /// Bound on each OxO call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// OxO hop distance used when the caller gives none (1-3)
    #[serde(default = "default_distance")]
    pub default_distance: u32,

    #[serde(default)]
    pub input_source: Option<String>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("cohd.db")
}

fn default_dataset_id() -> i64 {
    DEFAULT_DATASET_ID
}

fn default_oxo_url() -> String {
    DEFAULT_OXO_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_distance() -> u32 {
    2
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            url: default_oxo_url(),
            timeout_secs: default_timeout_secs(),
            default_distance: default_distance(),
            input_source: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: default_database_path(),
            default_dataset_id: default_dataset_id(),
            oxo: GatewaySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            CohdError::Config(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| CohdError::Config(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve settings from `path`, ./cohd.toml or defaults, then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                tracing::info!("Loading settings from {}", DEFAULT_CONFIG_FILE);
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Settings::default(),
        };

        settings.apply_overrides(
            std::env::var("COHD_DATABASE").ok(),
            std::env::var("COHD_OXO_URL").ok(),
        );
        settings.validate()?;

        Ok(settings)
    }

    fn apply_overrides(&mut self, database: Option<String>, oxo_url: Option<String>) {
        if let Some(database) = database.filter(|d| !d.is_empty()) {
            self.database_path = PathBuf::from(database);
        }
        if let Some(url) = oxo_url.filter(|u| !u.is_empty()) {
            self.oxo.url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.oxo.url.trim().is_empty() {
            return Err(CohdError::Config("oxo.url must not be empty".to_string()));
        }
        if self.oxo.timeout_secs == 0 {
            return Err(CohdError::Config("oxo.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_toml() {
        let settings = Settings::from_toml("").unwrap();

        assert_eq!(settings.database_path, PathBuf::from("cohd.db"));
        assert_eq!(settings.default_dataset_id, DEFAULT_DATASET_ID);
        assert_eq!(settings.oxo.url, DEFAULT_OXO_URL);
        assert_eq!(settings.oxo.timeout_secs, 30);
        assert_eq!(settings.oxo.default_distance, 2);
    }

    #[test]
    fn test_partial_toml() {
        let settings = Settings::from_toml(
            r#"
            database_path = "/data/cohd.db"

            [oxo]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.database_path, PathBuf::from("/data/cohd.db"));
        assert_eq!(settings.oxo.timeout_secs, 5);
        assert_eq!(settings.oxo.url, DEFAULT_OXO_URL);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(Settings::from_toml("[oxo]\ntimeout_secs = 0").is_err());
        assert!(Settings::from_toml("[oxo]\nurl = \"\"").is_err());
        assert!(Settings::from_toml("default_dataset_id = \"one\"").is_err());
    }

    #[test]
    fn test_from_file_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_dataset_id = 2").unwrap();

        let mut settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.default_dataset_id, 2);

        settings.apply_overrides(Some("/tmp/other.db".to_string()), Some(String::new()));
        assert_eq!(settings.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(settings.oxo.url, DEFAULT_OXO_URL);
    }
}
