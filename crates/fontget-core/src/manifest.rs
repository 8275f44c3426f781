//! Source manifest: configured catalog sources and their sync metadata
//!
//! The manifest is an explicit value passed to every component that needs
//! source information. Only [`load_manifest`] and [`save_manifest`] touch
//! the file on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{FontError, FontResult};

/// Manifest schema version written by this build
pub const MANIFEST_VERSION: &str = "2.0";

/// Custom sources start here so built-ins always win ties
pub const CUSTOM_PRIORITY_BASE: i32 = 100;

const BUILTIN_SOURCE_BASE_URL: &str =
    "https://raw.githubusercontent.com/Graphixa/FontGet-Sources/main/sources";

/// The closed set of built-in sources: (name, prefix, priority, filename)
pub const BUILTIN_SOURCES: [(&str, &str, i32, &str); 3] = [
    ("Google Fonts", "google", 1, "google-fonts.json"),
    ("Nerd Fonts", "nerd", 2, "nerd-fonts.json"),
    ("Font Squirrel", "squirrel", 3, "font-squirrel.json"),
];

/// A configured catalog source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Populated from the manifest map key
    #[serde(skip)]
    pub name: String,
    pub url: String,
    pub prefix: String,
    pub enabled: bool,
    pub filename: String,
    /// Lower value wins
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default)]
    pub font_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SourceConfig {
    pub fn is_builtin(&self) -> bool {
        is_builtin_source(&self.name)
    }
}

/// When cached catalogs are considered stale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub auto_update_days: u32,
    pub check_on_startup: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            auto_update_days: 7,
            check_on_startup: false,
        }
    }
}

/// Persisted source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub fontget_version: String,
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub cache_policy: CachePolicy,
}

/// True for one of the three built-in source names (case-insensitive)
pub fn is_builtin_source(name: &str) -> bool {
    BUILTIN_SOURCES
        .iter()
        .any(|(builtin, ..)| builtin.eq_ignore_ascii_case(name.trim()))
}

fn builtin_source(name: &str, prefix: &str, priority: i32, filename: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: format!("{BUILTIN_SOURCE_BASE_URL}/{filename}"),
        prefix: prefix.to_string(),
        enabled: true,
        filename: filename.to_string(),
        priority,
        last_synced: None,
        font_count: 0,
        version: None,
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn config_error(field: impl Into<String>, message: impl Into<String>) -> FontError {
    FontError::Configuration {
        field: field.into(),
        message: message.into(),
    }
}

impl Manifest {
    /// Fresh manifest containing the built-in sources
    pub fn with_builtin_sources(now: DateTime<Utc>) -> Self {
        let sources = BUILTIN_SOURCES
            .iter()
            .map(|(name, prefix, priority, filename)| {
                (
                    name.to_string(),
                    builtin_source(name, prefix, *priority, filename),
                )
            })
            .collect();

        Self {
            version: MANIFEST_VERSION.to_string(),
            created: now,
            last_updated: now,
            fontget_version: env!("CARGO_PKG_VERSION").to_string(),
            sources,
            cache_policy: CachePolicy::default(),
        }
    }

    /// Parse manifest JSON, filling derived fields and checking every source
    pub fn from_json(content: &str) -> FontResult<Self> {
        let mut manifest: Manifest = serde_json::from_str(content)
            .map_err(|e| config_error("manifest.json", format!("malformed manifest: {e}")))?;

        for (name, source) in manifest.sources.iter_mut() {
            source.name = name.clone();
        }

        // Built-ins are a closed set that must always be present.
        for (name, prefix, priority, filename) in BUILTIN_SOURCES {
            if manifest.source(name).is_none() {
                manifest.sources.insert(
                    name.to_string(),
                    builtin_source(name, prefix, priority, filename),
                );
            }
        }

        manifest.validate()?;
        Ok(manifest)
    }

    /// Field-level validation of every source entry
    pub fn validate(&self) -> FontResult<()> {
        for (name, source) in &self.sources {
            if source.url.trim().is_empty() {
                return Err(config_error(format!("sources.{name}.url"), "URL is empty"));
            }
            if source.prefix.trim().is_empty() {
                return Err(config_error(
                    format!("sources.{name}.prefix"),
                    "prefix is empty",
                ));
            }
            if source.filename.trim().is_empty() {
                return Err(config_error(
                    format!("sources.{name}.filename"),
                    "filename is empty",
                ));
            }
        }
        Ok(())
    }

    /// Look up a source by name (case-insensitive)
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        let name = name.trim();
        self.sources
            .get(name)
            .or_else(|| {
                self.sources
                    .values()
                    .find(|source| source.name.eq_ignore_ascii_case(name))
            })
    }

    fn source_key(&self, name: &str) -> Option<String> {
        self.source(name).map(|source| source.name.clone())
    }

    pub fn source_by_prefix(&self, prefix: &str) -> Option<&SourceConfig> {
        self.sources
            .values()
            .find(|source| source.prefix.eq_ignore_ascii_case(prefix.trim()))
    }

    /// All sources ordered by (priority, name)
    pub fn all_sources(&self) -> Vec<&SourceConfig> {
        let mut sources: Vec<&SourceConfig> = self.sources.values().collect();
        sources.sort_by(|a, b| (a.priority, &a.name).cmp(&(b.priority, &b.name)));
        sources
    }

    /// Enabled sources ordered by (priority, name)
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        self.all_sources()
            .into_iter()
            .filter(|source| source.enabled)
            .collect()
    }

    /// Source name for a prefix, or the title-cased prefix when unknown
    pub fn source_name_for_prefix(&self, prefix: &str) -> String {
        self.source_by_prefix(prefix)
            .map(|source| source.name.clone())
            .unwrap_or_else(|| title_case(prefix.trim()))
    }

    /// Display source name for a font ID based on its prefix
    pub fn source_name_for_id(&self, font_id: &str) -> String {
        match font_id.split_once('.') {
            Some((prefix, _)) if !prefix.is_empty() => self.source_name_for_prefix(prefix),
            _ => "Unknown Source".to_string(),
        }
    }

    /// Register a custom source in the priority band starting at 100
    pub fn add_custom_source(&mut self, name: &str, url: &str, prefix: &str) -> FontResult<&SourceConfig> {
        let name = name.trim();
        let url = url.trim();
        let prefix = prefix.trim().to_ascii_lowercase();

        if name.is_empty() {
            return Err(config_error("name", "source name is empty"));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(config_error("url", format!("'{url}' is not an http(s) URL")));
        }
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(config_error(
                "prefix",
                format!("'{prefix}' must be letters, digits, '-' or '_'"),
            ));
        }
        if is_builtin_source(name) || self.source(name).is_some() {
            return Err(FontError::DuplicateSource(name.to_string()));
        }
        if self.source_by_prefix(&prefix).is_some() {
            return Err(FontError::DuplicateSource(format!("prefix '{prefix}'")));
        }

        let priority = self
            .sources
            .values()
            .filter(|source| !source.is_builtin())
            .map(|source| source.priority + 1)
            .max()
            .unwrap_or(CUSTOM_PRIORITY_BASE)
            .max(CUSTOM_PRIORITY_BASE);

        let filename = format!(
            "{}.json",
            name.to_ascii_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect::<String>()
        );

        let source = SourceConfig {
            name: name.to_string(),
            url: url.to_string(),
            prefix,
            enabled: true,
            filename,
            priority,
            last_synced: None,
            font_count: 0,
            version: None,
        };
        self.sources.insert(name.to_string(), source);
        self.last_updated = Utc::now();

        self.sources
            .get(name)
            .ok_or_else(|| FontError::UnknownSource(name.to_string()))
    }

    /// Remove a custom source; built-ins can only be disabled
    pub fn remove_source(&mut self, name: &str) -> FontResult<SourceConfig> {
        if is_builtin_source(name) {
            return Err(FontError::BuiltinSourceProtected(name.trim().to_string()));
        }
        let key = self
            .source_key(name)
            .ok_or_else(|| FontError::UnknownSource(name.to_string()))?;
        let removed = self
            .sources
            .remove(&key)
            .ok_or_else(|| FontError::UnknownSource(name.to_string()))?;
        self.last_updated = Utc::now();
        Ok(removed)
    }

    /// Enable or disable a source; returns the previous state
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> FontResult<bool> {
        let key = self
            .source_key(name)
            .ok_or_else(|| FontError::UnknownSource(name.to_string()))?;
        let source = self
            .sources
            .get_mut(&key)
            .ok_or_else(|| FontError::UnknownSource(name.to_string()))?;
        let previous = source.enabled;
        source.enabled = enabled;
        self.last_updated = Utc::now();
        Ok(previous)
    }

    /// Record a successful sync of a source's catalog
    pub fn record_sync(
        &mut self,
        name: &str,
        font_count: usize,
        version: Option<String>,
        synced_at: DateTime<Utc>,
    ) -> FontResult<()> {
        let key = self
            .source_key(name)
            .ok_or_else(|| FontError::UnknownSource(name.to_string()))?;
        if let Some(source) = self.sources.get_mut(&key) {
            source.font_count = font_count;
            source.version = version.filter(|v| !v.is_empty());
            source.last_synced = Some(synced_at);
        }
        self.last_updated = synced_at;
        Ok(())
    }
}

/// Load the manifest, creating and persisting the default one when absent
pub fn load_manifest(path: &Path) -> FontResult<Manifest> {
    if !path.exists() {
        log::info!("Creating default source manifest at {}", path.display());
        let manifest = Manifest::with_builtin_sources(Utc::now());
        save_manifest(path, &manifest)?;
        return Ok(manifest);
    }

    let content = fs::read_to_string(path).map_err(|e| {
        FontError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to read manifest {}: {e}", path.display()),
        ))
    })?;

    Manifest::from_json(&content)
}

/// Save the manifest to disk (atomic write)
pub fn save_manifest(path: &Path, manifest: &Manifest) -> FontResult<()> {
    let content = serde_json::to_string_pretty(manifest)
        .map_err(|e| FontError::InvalidFormat(format!("Failed to serialize manifest: {e}")))?;
    write_atomic(path, content.as_bytes())
}

/// Write through a `.tmp` sibling and rename over the destination
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> FontResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(FontError::IoError)?;
        }
    }

    let temp_path = temp_sibling(path);
    fs::write(&temp_path, content).map_err(|e| {
        FontError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to write {}: {e}", temp_path.display()),
        ))
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        FontError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to replace {}: {e}", path.display()),
        ))
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
