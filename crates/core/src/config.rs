//! Application configuration loaded from `config.toml` and `SHIPYARD_*` variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{availability::AvailabilityToggles, catalog::designs, save::PersistentDesignStore};

/// Directory under the user's config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "shipyard";

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "config.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "SHIPYARD";

const DEFAULT_CONFIG: &str = r#"# shipyard configuration
#
# Every key may be overridden with an environment variable, e.g.
# SHIPYARD_DESIGNS_DIR=/tmp/designs or SHIPYARD_AVAILABILITY__SHOW_FUTURE=true.

# Directory holding saved design files and their order manifest.
# designs_dir = "/home/me/.local/share/shipyard/designs"

# Catalog snapshot written at the end of a session.
# session_path = "/home/me/.local/share/shipyard/catalog.json"

# Directory for log files.
# log_dir = "/home/me/.local/share/shipyard/logs"

[availability]
show_obsolete = false
show_available = true
show_future = false
"#;

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding saved design files and their manifest.
    pub designs_dir: PathBuf,
    /// Catalog snapshot file for the session.
    pub session_path: PathBuf,
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Initial state of the availability toggles.
    #[serde(default)]
    pub availability: AvailabilityToggles,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR);
        Self {
            designs_dir: PersistentDesignStore::default_root(),
            session_path: designs::default_snapshot_path(),
            log_dir: data_root.join("logs"),
            availability: AvailabilityToggles::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path`, falling back to defaults for missing keys.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("designs_dir", path_value(&defaults.designs_dir))?
            .set_default("session_path", path_value(&defaults.session_path))?
            .set_default("log_dir", path_value(&defaults.log_dir))?
            .set_default("availability.show_obsolete", defaults.availability.show_obsolete)?
            .set_default("availability.show_available", defaults.availability.show_available)?
            .set_default("availability.show_future", defaults.availability.show_future)?
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }
}

/// Default configuration file path.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write a commented default configuration file if none exists.
pub fn ensure_default_config() -> Result<()> {
    ensure_default_config_at(config_path())
}

/// Write a commented default configuration file at `path` if none exists.
pub fn ensure_default_config_at(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
