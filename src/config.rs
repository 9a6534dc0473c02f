// ⚙️ Configuration - Environment settings + persisted service toggle
//
// Two layers:
// - ListenerConfig: read-only, from environment / .env
// - ServiceSettings: small JSON file the user flips (enabled/disabled) and
//   where the per-install device id lives

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Package name of the Yape Android app
pub const YAPE_PACKAGE: &str = "com.bcp.innovacxion.yapeapp";

fn default_db_path() -> PathBuf {
    PathBuf::from("yape_transactions.db")
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("yape_config.json")
}

fn default_server_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_enabled() -> bool {
    true
}

// ============================================================================
// LISTENER CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Only notifications from this package are parsed
    pub source_package: String,

    /// SQLite file used by the sink
    pub db_path: PathBuf,

    /// JSON file holding ServiceSettings
    pub settings_path: PathBuf,

    /// Overrides the device id stored in the settings file
    pub device_id: Option<String>,

    /// Optional JSON file with custom category rules
    pub rules_path: Option<PathBuf>,

    /// Bind address for the REST server
    pub server_addr: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            source_package: YAPE_PACKAGE.to_string(),
            db_path: default_db_path(),
            settings_path: default_settings_path(),
            device_id: None,
            rules_path: None,
            server_addr: default_server_addr(),
        }
    }
}

impl ListenerConfig {
    /// Load `.env` (if any) and read YAPE_* variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing or blank keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = ListenerConfig::default();
        let config = ListenerConfig {
            source_package: get("YAPE_SOURCE_PACKAGE").unwrap_or(defaults.source_package),
            db_path: get("YAPE_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            settings_path: get("YAPE_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_path),
            device_id: get("YAPE_DEVICE_ID"),
            rules_path: get("YAPE_RULES_PATH").map(PathBuf::from),
            server_addr: get("YAPE_SERVER_ADDR").unwrap_or(defaults.server_addr),
        };

        config.validate()?;
        debug!(?config, "listener config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_package.contains(char::is_whitespace) {
            return Err(anyhow!(
                "Configuration error: YAPE_SOURCE_PACKAGE must not contain whitespace: {:?}",
                self.source_package
            ));
        }

        if !self.server_addr.contains(':') {
            return Err(anyhow!(
                "Configuration error: YAPE_SERVER_ADDR must be host:port, got {:?}",
                self.server_addr
            ));
        }

        Ok(())
    }
}

// ============================================================================
// SERVICE SETTINGS (persisted toggle)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Capture on/off. Missing means on.
    #[serde(default = "default_enabled")]
    pub service_enabled: bool,

    /// Stable per-install identifier, generated once
    #[serde(default)]
    pub device_id: String,
}

impl ServiceSettings {
    /// Fresh settings: enabled, with a new random device id
    pub fn new() -> Self {
        ServiceSettings {
            service_enabled: default_enabled(),
            device_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Read the settings file, creating it on first use.
    /// A file without a device id gets one and is rewritten.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = ServiceSettings::new();
            settings.save(path)?;
            info!(path = %path.display(), device_id = %settings.device_id, "settings file created");
            return Ok(settings);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file at {}", path.display()))?;

        let mut settings: ServiceSettings = serde_json::from_str(&content)
            .with_context(|| format!("Settings file {} contains invalid JSON", path.display()))?;

        if settings.device_id.trim().is_empty() {
            settings.device_id = uuid::Uuid::new_v4().to_string();
            settings.save(path)?;
        }

        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory at {}", parent.display()))?;
            }
        }

        fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        Ok(())
    }

    /// Flip the toggle and persist it
    pub fn set_enabled(&mut self, enabled: bool, path: &Path) -> Result<()> {
        self.service_enabled = enabled;
        self.save(path)?;

        if enabled {
            info!("✅ Captura activada");
        } else {
            info!("⏸️ Captura pausada");
        }

        Ok(())
    }

    /// Device id to stamp on records: config override first, then settings
    pub fn effective_device_id(&self, config: &ListenerConfig) -> String {
        config
            .device_id
            .clone()
            .unwrap_or_else(|| self.device_id.clone())
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
