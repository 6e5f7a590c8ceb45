use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CLIENTS_COLLECTION: &str = "clients";
pub const DEFAULT_ADMIN_COLLECTION: &str = "admin";
pub const DEFAULT_HEALTH_DOCUMENT: &str = "health_monitor";

/// Dashboard settings, read from a JSON file. Every field is optional in the
/// file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Emails allowed into the admin view
    #[serde(default)]
    pub admin_users: Vec<String>,

    #[serde(default = "default_clients_collection")]
    pub clients_collection: String,

    #[serde(default = "default_admin_collection")]
    pub admin_collection: String,

    /// Id of the health document inside the admin collection
    #[serde(default = "default_health_document")]
    pub health_document: String,

    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,

    #[serde(default = "default_restart_cooldown_secs")]
    pub restart_cooldown_secs: i64,

    /// SQLite file backing the store. In-memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_clients_collection() -> String {
    DEFAULT_CLIENTS_COLLECTION.to_string()
}

fn default_admin_collection() -> String {
    DEFAULT_ADMIN_COLLECTION.to_string()
}

fn default_health_document() -> String {
    DEFAULT_HEALTH_DOCUMENT.to_string()
}

fn default_stale_after_secs() -> i64 {
    70 * 60
}

fn default_restart_cooldown_secs() -> i64 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_users: Vec::new(),
            clients_collection: default_clients_collection(),
            admin_collection: default_admin_collection(),
            health_document: default_health_document(),
            stale_after_secs: default_stale_after_secs(),
            restart_cooldown_secs: default_restart_cooldown_secs(),
            database_path: None,
        }
    }
}

impl Config {
    /// Reads `path`. A missing file yields the defaults; an unreadable or
    /// malformed one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("CONFIG: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))?;
        log::info!("CONFIG: loaded {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn stale_after(&self) -> TimeDelta {
        TimeDelta::seconds(self.stale_after_secs)
    }

    pub fn restart_cooldown(&self) -> TimeDelta {
        TimeDelta::seconds(self.restart_cooldown_secs)
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_users
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config::load(temp_dir.path().join("stockdesk.json"))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.stale_after(), TimeDelta::minutes(70));
        assert_eq!(config.restart_cooldown(), TimeDelta::seconds(20));
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("stockdesk.json");
        fs::write(&path, r#"{ "adminUsers": ["Root@Example.com"], "restartCooldownSecs": 5 }"#)?;

        let config = Config::load(&path)?;
        assert!(config.is_admin("root@example.com"));
        assert!(!config.is_admin("alice@example.com"));
        assert_eq!(config.restart_cooldown_secs, 5);
        assert_eq!(config.clients_collection, "clients");
        Ok(())
    }

    #[test]
    fn malformed_file_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("stockdesk.json");
        fs::write(&path, "{ adminUsers: ")?;
        assert!(Config::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn save_then_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("stockdesk.json");
        let config = Config {
            database_path: Some(temp_dir.path().join("stockdesk.sqlite")),
            ..Config::default()
        };
        config.save(&path)?;
        assert_eq!(Config::load(&path)?, config);
        Ok(())
    }
}
