// ⚙️ Settings
//
// Read from an optional TOML file; every key has a default. The database
// path can be overridden with ITEM_CONFIG_DB, and the binaries let their
// flags override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DB_ENV_VAR: &str = "ITEM_CONFIG_DB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite registry file
    pub database_path: PathBuf,

    /// Base path icons are resolved under
    pub icon_base: String,

    /// Address the HTTP server binds to
    pub listen_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: PathBuf::from("items.db"),
            icon_base: "../icon".to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse settings")
    }

    /// Load settings from `path` (if given), then apply the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings file {}", path.display()))?;
                Self::from_toml(&text)?
            }
            None => Settings::default(),
        };

        if let Ok(db) = std::env::var(DB_ENV_VAR) {
            if !db.is_empty() {
                settings.database_path = PathBuf::from(db);
            }
        }

        log::debug!("Settings: {:?}", settings);
        Ok(settings)
    }
}
