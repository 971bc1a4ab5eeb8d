//! Daemon settings
//!
//! Optional JSON file at /etc/ibfan/config.json (or `$IBFAN_CONFIG`). Every
//! field has a default, so a missing file or an empty object is valid. Fan
//! curves are compiled in and cannot be changed here; only the profile
//! selection can be pinned.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::{paths, timing, wmi};
use crate::error::{IbfanError, Result};
use crate::profile::ProfileKind;

/// Which actuator backend discovery may pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Auto,
    Ec,
    Module,
    Hwmon,
}

/// When to draw the in-place status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLine {
    /// Only when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: Backend,

    /// Pin a hardware profile instead of taking the actuator's own
    #[serde(default)]
    pub profile: Option<ProfileKind>,

    #[serde(default = "default_acpi_method")]
    pub acpi_method: String,

    #[serde(default = "default_acpi_call_path")]
    pub acpi_call_path: PathBuf,

    #[serde(default = "default_hwmon_root")]
    pub hwmon_root: PathBuf,

    #[serde(default = "default_module_root")]
    pub module_root: PathBuf,

    /// Control loop period in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub status_line: StatusLine,
}

fn default_acpi_method() -> String {
    wmi::DEFAULT_METHOD.to_string()
}

fn default_acpi_call_path() -> PathBuf {
    PathBuf::from(paths::ACPI_CALL)
}

fn default_hwmon_root() -> PathBuf {
    PathBuf::from(paths::HWMON_BASE)
}

fn default_module_root() -> PathBuf {
    PathBuf::from(paths::MODULE_CLASS_DIR)
}

fn default_poll_interval() -> u64 {
    timing::DEFAULT_POLL_INTERVAL_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            profile: None,
            acpi_method: default_acpi_method(),
            acpi_call_path: default_acpi_call_path(),
            hwmon_root: default_hwmon_root(),
            module_root: default_module_root(),
            poll_interval_ms: default_poll_interval(),
            status_line: StatusLine::default(),
        }
    }
}

impl Settings {
    /// Settings file location, honouring `IBFAN_CONFIG`
    pub fn path() -> PathBuf {
        std::env::var_os(paths::CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(paths::CONFIG_FILE))
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// Load and validate. A missing file yields defaults; an unreadable or
    /// malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            IbfanError::invalid_config(path.display().to_string(), format!("cannot read: {}", e))
        })?;

        let settings: Settings = serde_json::from_str(&content).map_err(|e| {
            IbfanError::invalid_config(path.display().to_string(), format!("cannot parse: {}", e))
        })?;

        settings.validate()?;
        info!(path = %path.display(), backend = ?settings.backend, "Loaded settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(timing::MIN_POLL_INTERVAL_MS..=timing::MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(IbfanError::invalid_config(
                "poll_interval_ms",
                format!(
                    "{} is outside {}..={}",
                    self.poll_interval_ms,
                    timing::MIN_POLL_INTERVAL_MS,
                    timing::MAX_POLL_INTERVAL_MS
                ),
            ));
        }
        if self.acpi_method.trim().is_empty() {
            return Err(IbfanError::invalid_config("acpi_method", "must not be empty"));
        }
        Ok(())
    }
}
