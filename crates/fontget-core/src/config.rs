//! Configuration management for fontget
//!
//! Settings come from environment variables with sensible per-platform
//! defaults. The source manifest lives in the app directory resolved here.

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{FontError, FontResult, InstallationScope};

/// Global configuration for fontget operations
#[derive(Debug, Clone)]
pub struct FontgetConfig {
    /// App and font directory locations
    pub paths: Paths,
    /// HTTP behaviour
    pub network: Network,
    /// Forced elevation result (FONTGET_ASSUME_ELEVATED)
    pub assume_elevated: Option<bool>,
}

/// Directory configuration
#[derive(Debug, Clone)]
pub struct Paths {
    /// App directory holding manifest.json and sources/ (FONTGET_CONFIG_DIR)
    pub config_dir: PathBuf,
    /// Override user font directory (FONTGET_USER_FONT_DIR)
    pub user_font_dir_override: Option<PathBuf>,
    /// Override machine font directory (FONTGET_MACHINE_FONT_DIR)
    pub machine_font_dir_override: Option<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone)]
pub struct Network {
    /// Timeout for catalog fetches in seconds
    pub request_timeout_secs: u64,
    /// Timeout for font downloads in seconds
    pub download_timeout_secs: u64,
    /// Use cached catalogs only
    pub offline: bool,
}

impl Default for FontgetConfig {
    fn default() -> Self {
        Self::from_env().unwrap_or_else(|_| Self::minimal())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Unset is `None`; a value that does not parse is an error naming the variable
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_value(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{key}={raw:?} is not a valid value")),
        None => Ok(None),
    }
}

/// Accepts true/false, 1/0, yes/no and on/off in any case
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag(key: &str) -> Result<Option<bool>> {
    match env_value(key) {
        Some(raw) => parse_flag(&raw)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("{key}={raw:?} is not a boolean (use true or false)")),
        None => Ok(None),
    }
}

impl FontgetConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            paths: Paths::from_env()?,
            network: Network::from_env()?,
            assume_elevated: env_flag("FONTGET_ASSUME_ELEVATED")?,
        })
    }

    /// Create minimal default configuration
    pub fn minimal() -> Self {
        Self {
            paths: Paths::minimal(),
            network: Network::minimal(),
            assume_elevated: None,
        }
    }

    /// Configuration rooted in a single directory; font dirs live beneath it
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            paths: Paths {
                config_dir: root.join("config"),
                user_font_dir_override: Some(root.join("user-fonts")),
                machine_font_dir_override: Some(root.join("machine-fonts")),
            },
            network: Network::minimal(),
            assume_elevated: Some(false),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.paths.config_dir.join("manifest.json")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.paths.config_dir.join("sources")
    }

    /// Effective font directory for a scope
    pub fn font_dir(&self, scope: InstallationScope) -> Option<PathBuf> {
        let override_path = match scope {
            InstallationScope::User => &self.paths.user_font_dir_override,
            InstallationScope::Machine => &self.paths.machine_font_dir_override,
        };
        override_path
            .clone()
            .or_else(|| crate::scope::default_font_dir(scope))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.network.download_timeout_secs)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.paths.config_dir.as_os_str().is_empty() {
            anyhow::bail!("Config directory must not be empty");
        }

        for (name, path) in [
            ("FONTGET_USER_FONT_DIR", &self.paths.user_font_dir_override),
            ("FONTGET_MACHINE_FONT_DIR", &self.paths.machine_font_dir_override),
        ] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    anyhow::bail!("{name} must not be empty");
                }
            }
        }

        if self.network.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }

        if self.network.download_timeout_secs == 0 {
            anyhow::bail!("Download timeout must be greater than 0");
        }

        Ok(())
    }

    /// Validate and convert failures into the library error type
    pub fn checked(self) -> FontResult<Self> {
        self.validate().map_err(|e| FontError::Configuration {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;
        Ok(self)
    }
}

impl Paths {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            config_dir: env_path("FONTGET_CONFIG_DIR").unwrap_or_else(default_config_dir),
            user_font_dir_override: env_path("FONTGET_USER_FONT_DIR"),
            machine_font_dir_override: env_path("FONTGET_MACHINE_FONT_DIR"),
        })
    }

    pub fn minimal() -> Self {
        Self {
            config_dir: default_config_dir(),
            user_font_dir_override: None,
            machine_font_dir_override: None,
        }
    }
}

impl Network {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            request_timeout_secs: env_parse("FONTGET_REQUEST_TIMEOUT_SECS")?.unwrap_or(10),
            download_timeout_secs: env_parse("FONTGET_DOWNLOAD_TIMEOUT_SECS")?.unwrap_or(30),
            offline: env_flag("FONTGET_OFFLINE")?.unwrap_or(false),
        })
    }

    pub fn minimal() -> Self {
        Self {
            request_timeout_secs: 10,
            download_timeout_secs: 30,
            offline: false,
        }
    }
}

/// Default app directory (~/.fontget)
fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".fontget"))
        .unwrap_or_else(|| PathBuf::from(".fontget"))
}
