//! fontget-core - Catalog matching and installation engine for fontget
//!
//! This library maps installed font files to canonical catalog entries across
//! prioritized sources, plans and executes idempotent installs against a
//! scope-aware font directory, and reconciles export/import/backup manifests.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod backup;
pub mod catalog;
pub mod config;
pub mod export;
pub mod fetch;
pub mod import;
pub mod manifest;
pub mod matcher;
pub mod planner;
pub mod progress;
pub mod protection;
pub mod scanner;
pub mod scope;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogEntry, CatalogIndex, FontFile};
pub use fetch::{FetchError, SourceFetcher};
pub use manifest::{Manifest, SourceConfig};
pub use matcher::{FontMatcher, InstalledFontMatch};
pub use progress::{BatchReport, CancellationFlag, ProgressSink, ProgressUpdate};
pub use scanner::ParsedFont;
pub use scope::ScopeResolver;

/// Core errors for font management operations
#[derive(Error, Debug)]
pub enum FontError {
    #[error("Font not found: {0}\n→ Suggestion: Check the font ID with 'fontget search' or refresh sources with 'fontget sources update'")]
    FontNotFound(String),

    #[error("Invalid format: {0}\n→ Suggestion: Ensure the file was produced by 'fontget export' or is a valid source catalog")]
    InvalidFormat(String),

    #[error("Configuration error in '{field}': {message}\n→ Suggestion: Check FONTGET_* environment variables and manifest.json")]
    Configuration { field: String, message: String },

    #[error("Source unavailable: {source_name}: {reason}\n→ Suggestion: Check your network connection or run 'fontget sources update'")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Network error: {0}\n→ Suggestion: Check your network connection and re-run the command")]
    Fetch(#[from] FetchError),

    #[error("Cannot read {scope} font directory: {reason}\n→ Suggestion: Check directory permissions")]
    ScopeUnreadable {
        scope: InstallationScope,
        reason: String,
    },

    #[error("No font directory is defined for {0} scope on this platform\n→ Suggestion: Set FONTGET_USER_FONT_DIR or FONTGET_MACHINE_FONT_DIR")]
    ScopeUnsupported(InstallationScope),

    #[error("Elevation required for {0} scope\n→ Suggestion: Run as administrator on Windows or use sudo on macOS and Linux")]
    ElevationRequired(InstallationScope),

    #[error("Source '{0}' is built in and cannot be removed\n→ Suggestion: Use 'fontget sources disable' instead")]
    BuiltinSourceProtected(String),

    #[error("Source already exists: {0}\n→ Suggestion: Pick a different name and prefix")]
    DuplicateSource(String),

    #[error("Unknown source: {0}\n→ Suggestion: List configured sources with 'fontget sources list'")]
    UnknownSource(String),

    #[error("Options {0} and {1} cannot be used together\n→ Suggestion: Choose only one of them")]
    MutuallyExclusive(&'static str, &'static str),

    #[error("System font protection: refusing to modify {0}\n→ Suggestion: System fonts are protected for stability")]
    SystemFontProtection(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("All {attempted} attempted operations failed ({failed} failures)\n→ Suggestion: Re-run with --verbose for per-item details")]
    BatchFailed { failed: usize, attempted: usize },

    #[error("IO error: {0}\n→ Suggestion: Check file permissions and disk space")]
    IoError(#[from] std::io::Error),

    #[error("Archive error: {0}\n→ Suggestion: Check free disk space at the archive destination")]
    Archive(String),
}

impl FontError {
    /// Cancellation is reported to the user, not treated as a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FontError::Cancelled)
    }
}

/// Result type for font operations
pub type FontResult<T> = Result<T, FontError>;

/// Font installation scope
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InstallationScope {
    /// Current user only
    User,
    /// System-wide, requires elevation
    Machine,
}

impl InstallationScope {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallationScope::User => "user",
            InstallationScope::Machine => "machine",
        }
    }

    /// Get a human-readable description
    pub fn description(self) -> &'static str {
        match self {
            InstallationScope::User => "current user",
            InstallationScope::Machine => "all users",
        }
    }
}

impl fmt::Display for InstallationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallationScope {
    type Err = FontError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(InstallationScope::User),
            "machine" => Ok(InstallationScope::Machine),
            other => Err(FontError::InvalidFormat(format!(
                "Unknown scope '{other}' (expected 'user' or 'machine')"
            ))),
        }
    }
}

/// Font file helpers
pub mod validation {
    use std::path::Path;

    /// Extensions recognised as installed font files
    pub const FONT_EXTENSIONS: &[&str] = &[
        "ttf", "otf", "ttc", "otc", "pfb", "pfm", "pfa", "bdf", "pcf", "psf", "psfu",
    ];

    /// Extensions whose headers can be parsed for name metadata
    pub const SFNT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc", "otc"];

    fn lower_extension(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Check if file has a recognised font extension
    pub fn is_valid_font_extension(path: &Path) -> bool {
        lower_extension(path)
            .map(|ext| FONT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    pub fn is_sfnt(path: &Path) -> bool {
        lower_extension(path)
            .map(|ext| SFNT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Upper-case extension used as the display type ("TTF", "OTF")
    pub fn font_type(path: &Path) -> String {
        lower_extension(path)
            .map(|ext| ext.to_uppercase())
            .unwrap_or_default()
    }

    /// Insert a space wherever a lower-case letter is followed by an upper-case one
    fn expand_camel_case(name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 4);
        let mut prev_lower = false;
        for ch in name.chars() {
            if prev_lower && ch.is_uppercase() {
                out.push(' ');
            }
            prev_lower = ch.is_lowercase();
            out.push(ch);
        }
        out
    }

    fn title_case(word: &str) -> String {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Derive (family, style) from a font filename when header metadata is unavailable
    pub fn parse_font_filename(filename: &str) -> (String, String) {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);

        // Variable font axes: "Inter[wght].ttf"
        let stem = match stem.find('[') {
            Some(idx) => &stem[..idx],
            None => stem,
        };
        let stem = stem.strip_suffix("-webfont").unwrap_or(stem).trim();

        let (family, style) = match stem.rfind('-') {
            Some(pos) if pos > 0 && pos + 1 < stem.len() => {
                (&stem[..pos], expand_camel_case(&title_case(stem[pos + 1..].trim())))
            }
            _ => (stem, "Regular".to_string()),
        };

        let family = expand_camel_case(family.trim());
        if family.is_empty() {
            return ("Unknown".to_string(), style);
        }
        (family, style)
    }
}
