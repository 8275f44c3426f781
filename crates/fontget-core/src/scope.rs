//! Installation scope resolution
//!
//! Maps `user`/`machine` to concrete font directories and decides which
//! scopes the current process may read or write.

use std::path::PathBuf;

use crate::config::FontgetConfig;
use crate::{FontError, FontResult, InstallationScope};

/// Resolves scopes to directories and enforces elevation for machine writes
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    user_dir: Option<PathBuf>,
    machine_dir: Option<PathBuf>,
    elevated: bool,
}

impl ScopeResolver {
    pub fn new(user_dir: Option<PathBuf>, machine_dir: Option<PathBuf>, elevated: bool) -> Self {
        Self {
            user_dir,
            machine_dir,
            elevated,
        }
    }

    /// Build from configuration, probing the OS unless elevation is forced
    pub fn from_config(config: &FontgetConfig) -> Self {
        let elevated = config.assume_elevated.unwrap_or_else(is_process_elevated);
        log::debug!("elevated: {elevated}");
        Self::new(
            config.font_dir(InstallationScope::User),
            config.font_dir(InstallationScope::Machine),
            elevated,
        )
    }

    /// `{user}` when unprivileged, `{user, machine}` when elevated
    pub fn accessible_scopes(is_elevated: bool) -> Vec<InstallationScope> {
        if is_elevated {
            vec![InstallationScope::User, InstallationScope::Machine]
        } else {
            vec![InstallationScope::User]
        }
    }

    /// Accessible scopes for this process
    pub fn scopes(&self) -> Vec<InstallationScope> {
        Self::accessible_scopes(self.elevated)
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    /// Machine scope when elevated, user scope otherwise
    pub fn auto_scope(&self) -> InstallationScope {
        if self.elevated {
            InstallationScope::Machine
        } else {
            InstallationScope::User
        }
    }

    /// Map a scope to its font directory
    pub fn resolve(&self, scope: InstallationScope) -> FontResult<PathBuf> {
        let dir = match scope {
            InstallationScope::User => self.user_dir.clone(),
            InstallationScope::Machine => self.machine_dir.clone(),
        };
        dir.ok_or(FontError::ScopeUnsupported(scope))
    }

    /// Must run before any machine-scope mutation
    pub fn require_elevation(&self, scope: InstallationScope) -> FontResult<()> {
        if scope == InstallationScope::Machine && !self.elevated {
            return Err(FontError::ElevationRequired(scope));
        }
        Ok(())
    }
}

/// Default font directory for a scope on this platform
pub fn default_font_dir(scope: InstallationScope) -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        match scope {
            InstallationScope::User => dirs::home_dir().map(|home| home.join("Library").join("Fonts")),
            InstallationScope::Machine => Some(PathBuf::from("/Library/Fonts")),
        }
    }

    #[cfg(target_os = "windows")]
    {
        match scope {
            InstallationScope::User => dirs::data_local_dir()
                .map(|local| local.join("Microsoft").join("Windows").join("Fonts")),
            InstallationScope::Machine => Some(PathBuf::from("C:\\Windows\\Fonts")),
        }
    }

    #[cfg(target_os = "linux")]
    {
        match scope {
            InstallationScope::User => dirs::home_dir()
                .map(|home| home.join(".local").join("share").join("fonts")),
            InstallationScope::Machine => Some(PathBuf::from("/usr/local/share/fonts")),
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        match scope {
            InstallationScope::User => dirs::font_dir(),
            InstallationScope::Machine => None,
        }
    }
}

/// Check if current process has administrator/root privileges
pub fn is_process_elevated() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    {
        // Without a token query we cannot tell; callers fall back to user scope.
        false
    }
}
