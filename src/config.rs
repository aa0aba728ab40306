use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use tokio::fs;

use crate::credits::Credits;
use crate::error::PersistenceError;
use crate::store::write_atomic;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiTheme {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for UiTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UiTheme::Light => "light",
            UiTheme::Dark => "dark",
            UiTheme::System => "system",
        })
    }
}

impl FromStr for UiTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(UiTheme::Light),
            "dark" => Ok(UiTheme::Dark),
            "system" => Ok(UiTheme::System),
            other => Err(format!("unknown theme '{other}' (light, dark or system)")),
        }
    }
}

/// Loaded once at startup and handed to whoever needs it. Admin changes produce a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_start_balance: Credits,
    pub admin_users: BTreeSet<String>,
    pub ui_theme: UiTheme,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_start_balance: Credits::whole(100),
            admin_users: BTreeSet::from(["admin".to_string()]),
            ui_theme: UiTheme::System,
        }
    }
}

impl Config {
    pub fn is_admin(&self, username: &str) -> bool {
        self.admin_users.contains(username)
    }

    /// Missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self, PersistenceError> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| PersistenceError::CorruptData {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
            Err(source) => Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Startup path: writes the defaults on first run and falls back to them when the file is unreadable.
    pub async fn load_or_init(path: &Path) -> Self {
        match fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                let config = Config::default();
                match config.save(path).await {
                    Ok(()) => info!("wrote default config to {}", path.display()),
                    Err(e) => warn!("could not write default config: {e}"),
                }
                return config;
            }
            Err(e) => {
                warn!("cannot inspect {}: {e}; using built-in defaults", path.display());
                return Config::default();
            }
        }
        match Config::load(path).await {
            Ok(config) => config,
            Err(e) => {
                warn!("{e}; using built-in defaults");
                Config::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| PersistenceError::CorruptData {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        write_atomic(path, content.as_bytes()).await
    }
}
