//! Catalog index: merged view of every enabled source's font catalog
//!
//! Each source publishes a JSON catalog. Catalogs are fetched over HTTP or
//! read from the on-disk cache, then merged into one `FontID -> CatalogEntry`
//! map where the lowest-priority-value source wins on conflicting IDs.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::SourceFetcher;
use crate::manifest::{write_atomic, Manifest, SourceConfig};
use crate::progress::{BatchReport, CancellationFlag, ProgressSink, ProgressStatus, ProgressUpdate};
use crate::protection::normalize_font_name;
use crate::{FontError, FontResult};

/// Desktop formats in order of preference
const PREFERRED_FORMATS: [&str; 4] = ["ttf", "otf", "ttc", "otc"];

/// Metadata block at the top of a source catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceInfo {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub last_updated: String,
    pub total_fonts: usize,
}

/// One variant as published by a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantRecord {
    pub name: String,
    pub weight: u32,
    pub style: String,
    pub subsets: Vec<String>,
    /// format -> download URL
    pub files: BTreeMap<String, String>,
}

/// One font as published by a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFontRecord {
    pub name: String,
    pub family: String,
    pub license: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub popularity: u32,
    pub variants: Vec<VariantRecord>,
}

/// A complete source catalog file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCatalog {
    pub source_info: SourceInfo,
    pub fonts: BTreeMap<String, CatalogFontRecord>,
}

impl SourceCatalog {
    pub fn from_slice(bytes: &[u8]) -> FontResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| FontError::InvalidFormat(format!("invalid source catalog: {e}")))
    }
}

/// How a variant's file is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Direct font file download
    Font,
    /// Zip archive whose font members are extracted
    ZipArchive,
    /// tar.xz archive; listed but not installable
    TarXzArchive,
}

/// One physical font variant of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontFile {
    /// Style label, e.g. "Bold Italic"
    pub variant: String,
    /// Filename as installed
    pub name: String,
    pub url: String,
    pub kind: FileKind,
}

/// One installable font as known to a source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub font_id: String,
    pub name: String,
    pub family: String,
    pub source: String,
    pub source_priority: i32,
    pub license: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub popularity: u32,
    pub variants: Vec<FontFile>,
}

impl CatalogEntry {
    /// ID without its source prefix ("google.roboto" -> "roboto")
    pub fn short_id(&self) -> &str {
        self.font_id
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or(&self.font_id)
    }
}

/// A source that contributed to the index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedSource {
    pub name: String,
    pub prefix: String,
    pub priority: i32,
    pub font_count: usize,
    pub from_cache: bool,
}

/// A source that could not be loaded, with the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnavailableSource {
    pub name: String,
    pub reason: String,
}

/// Options controlling where catalogs come from
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub timeout: Duration,
    /// Ignore cache freshness and re-fetch
    pub refresh: bool,
    /// Never touch the network
    pub offline: bool,
    /// Cached catalogs older than this are refreshed when possible
    pub max_age: Option<chrono::Duration>,
}

impl LoadOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            refresh: false,
            offline: false,
            max_age: None,
        }
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age = Some(chrono::Duration::days(i64::from(days)));
        self
    }
}

/// On-disk cache of fetched source catalogs (`<config_dir>/sources`)
#[derive(Debug, Clone)]
pub struct SourceCache {
    dir: PathBuf,
}

/// A catalog read back from the cache
#[derive(Debug, Clone)]
pub struct CachedCatalog {
    pub catalog: SourceCatalog,
    pub modified: Option<DateTime<Utc>>,
}

impl SourceCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: &SourceConfig) -> PathBuf {
        self.dir.join(&source.filename)
    }

    /// Read a cached catalog; unreadable or corrupt files count as absent
    pub fn read(&self, source: &SourceConfig) -> Option<CachedCatalog> {
        let path = self.path_for(source);
        let bytes = fs::read(&path).ok()?;
        match SourceCatalog::from_slice(&bytes) {
            Ok(catalog) => {
                let modified = fs::metadata(&path)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .map(DateTime::<Utc>::from);
                Some(CachedCatalog { catalog, modified })
            }
            Err(e) => {
                log::warn!("Ignoring corrupt cache {}: {e}", path.display());
                None
            }
        }
    }

    pub fn write(&self, source: &SourceConfig, bytes: &[u8]) -> FontResult<()> {
        write_atomic(&self.path_for(source), bytes)
    }
}

/// Merged catalog of all enabled sources
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    entries: BTreeMap<String, CatalogEntry>,
    sources: Vec<LoadedSource>,
    unavailable: Vec<UnavailableSource>,
}

impl CatalogIndex {
    /// Merge already-parsed catalogs; disabled sources contribute nothing
    pub fn from_catalogs(catalogs: Vec<(SourceConfig, SourceCatalog)>) -> Self {
        Self::merge(
            catalogs
                .into_iter()
                .map(|(source, catalog)| (source, catalog, false))
                .collect(),
        )
    }

    fn merge(mut catalogs: Vec<(SourceConfig, SourceCatalog, bool)>) -> Self {
        catalogs.retain(|(source, ..)| source.enabled);
        catalogs.sort_by(|(a, ..), (b, ..)| (a.priority, &a.name).cmp(&(b.priority, &b.name)));

        let mut index = CatalogIndex::default();
        for (source, catalog, from_cache) in catalogs {
            let entries = entries_from_catalog(&source, &catalog);
            let font_count = entries.len();
            for entry in entries {
                // Sorted by priority, so the first source to claim an ID keeps it.
                index
                    .entries
                    .entry(entry.font_id.clone())
                    .or_insert(entry);
            }
            index.sources.push(LoadedSource {
                name: source.name.clone(),
                prefix: source.prefix.clone(),
                priority: source.priority,
                font_count,
                from_cache,
            });
        }
        index
    }

    /// Load every enabled source from cache or network and merge them
    ///
    /// Sources that cannot be loaded are recorded in [`Self::unavailable`];
    /// the call only fails when no enabled source could be loaded at all.
    pub async fn load(
        sources: &[&SourceConfig],
        cache: &SourceCache,
        fetcher: &dyn SourceFetcher,
        options: &LoadOptions,
        cancel: &CancellationFlag,
    ) -> FontResult<Self> {
        let mut loaded = Vec::new();
        let mut unavailable = Vec::new();

        for source in sources.iter().filter(|source| source.enabled) {
            cancel.check()?;
            match load_source(source, cache, fetcher, options).await {
                Ok((catalog, from_cache)) => {
                    log::debug!(
                        "Loaded {} ({} fonts{})",
                        source.name,
                        catalog.fonts.len(),
                        if from_cache { ", cached" } else { "" }
                    );
                    loaded.push(((*source).clone(), catalog, from_cache));
                }
                Err(reason) => {
                    log::warn!("Source {} unavailable: {reason}", source.name);
                    unavailable.push(UnavailableSource {
                        name: source.name.clone(),
                        reason,
                    });
                }
            }
        }

        if loaded.is_empty() {
            if let Some(first) = unavailable.first() {
                return Err(FontError::SourceUnavailable {
                    source_name: unavailable
                        .iter()
                        .map(|s| s.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    reason: first.reason.clone(),
                });
            }
        }

        let mut index = Self::merge(loaded);
        index.unavailable = unavailable;
        Ok(index)
    }

    /// Case-insensitive lookup by FontID
    pub fn lookup(&self, font_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(&font_id.trim().to_ascii_lowercase())
    }

    /// All entries ordered by FontID
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sources(&self) -> &[LoadedSource] {
        &self.sources
    }

    pub fn unavailable(&self) -> &[UnavailableSource] {
        &self.unavailable
    }

    /// True once at least one source contributed
    pub fn is_loaded(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Entries whose display name normalizes to `name`, best source first
    pub fn find_by_name(&self, name: &str) -> Vec<&CatalogEntry> {
        let wanted = normalize_font_name(name);
        let mut found: Vec<&CatalogEntry> = self
            .entries
            .values()
            .filter(|entry| normalize_font_name(&entry.name) == wanted)
            .collect();
        found.sort_by(|a, b| (a.source_priority, &a.font_id).cmp(&(b.source_priority, &b.font_id)));
        found
    }

    /// Case-insensitive substring search over FontID, name and categories
    pub fn search(&self, query: &str) -> Vec<&CatalogEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<&CatalogEntry> = self
            .entries
            .values()
            .filter(|entry| {
                entry.font_id.contains(&needle)
                    || entry.name.to_lowercase().contains(&needle)
                    || entry
                        .categories
                        .iter()
                        .any(|category| category.to_lowercase().contains(&needle))
            })
            .collect();

        results.sort_by_key(|entry| {
            (
                !entry.name.eq_ignore_ascii_case(query.trim()),
                entry.source_priority,
                entry.font_id.clone(),
            )
        });
        results
    }
}

async fn load_source(
    source: &SourceConfig,
    cache: &SourceCache,
    fetcher: &dyn SourceFetcher,
    options: &LoadOptions,
) -> Result<(SourceCatalog, bool), String> {
    let cached = cache.read(source);

    let is_fresh = cached.as_ref().is_some_and(|cached| {
        match (options.max_age, cached.modified) {
            (Some(max_age), Some(modified)) => Utc::now() - modified <= max_age,
            _ => true,
        }
    });

    if options.offline || (is_fresh && !options.refresh) {
        return match cached {
            Some(cached) => Ok((cached.catalog, true)),
            None => Err("no cached catalog and network is disabled".to_string()),
        };
    }

    let fetched = match fetcher.fetch(&source.url, options.timeout).await {
        Ok(bytes) => SourceCatalog::from_slice(&bytes)
            .map(|catalog| (catalog, bytes))
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match (fetched, cached) {
        (Ok((catalog, bytes)), _) => {
            if let Err(e) = cache.write(source, &bytes) {
                log::warn!("Could not cache {}: {e}", source.name);
            }
            Ok((catalog, false))
        }
        (Err(reason), Some(cached)) => {
            log::warn!("Refreshing {} failed ({reason}); using cached catalog", source.name);
            Ok((cached.catalog, true))
        }
        (Err(reason), None) => Err(reason),
    }
}

/// Re-fetch every enabled source, refresh the cache and record sync metadata
pub async fn update_sources(
    manifest: &mut Manifest,
    cache: &SourceCache,
    fetcher: &dyn SourceFetcher,
    timeout: Duration,
    cancel: &CancellationFlag,
    progress: &dyn ProgressSink,
) -> FontResult<BatchReport> {
    let sources: Vec<SourceConfig> = manifest.enabled_sources().into_iter().cloned().collect();
    let total = sources.len();
    let mut report = BatchReport::new();

    for (index, source) in sources.iter().enumerate() {
        cancel.check()?;
        progress.update(ProgressUpdate::new(
            index,
            ProgressStatus::Started,
            format!("Updating {}", source.name),
        ));

        let result = match fetcher.fetch(&source.url, timeout).await {
            Ok(bytes) => SourceCatalog::from_slice(&bytes).and_then(|catalog| {
                cache.write(source, &bytes)?;
                Ok(catalog)
            }),
            Err(e) => Err(FontError::Fetch(e)),
        };

        match result {
            Ok(catalog) => {
                let font_count = catalog.fonts.len();
                manifest.record_sync(
                    &source.name,
                    font_count,
                    Some(catalog.source_info.version.clone()),
                    Utc::now(),
                )?;
                report.record_success();
                progress.update(
                    ProgressUpdate::new(
                        index,
                        ProgressStatus::Completed,
                        format!("{}: {font_count} fonts", source.name),
                    )
                    .with_percent(index + 1, total),
                );
            }
            Err(e) => {
                let detail = match &e {
                    FontError::Fetch(fetch) => format!("{}: {fetch}", source.name),
                    other => format!("{}: {other}", source.name),
                };
                log::warn!("{detail}");
                report.record_failure(detail.clone());
                progress.update(
                    ProgressUpdate::new(index, ProgressStatus::Failed, detail)
                        .with_percent(index + 1, total),
                );
            }
        }
    }

    Ok(report)
}

fn entries_from_catalog(source: &SourceConfig, catalog: &SourceCatalog) -> Vec<CatalogEntry> {
    catalog
        .fonts
        .iter()
        .map(|(id, record)| {
            let font_id = qualify_font_id(id, &source.prefix);
            let short = font_id.split_once('.').map(|(_, rest)| rest).unwrap_or(&font_id);
            let name = [record.name.trim(), record.family.trim()]
                .into_iter()
                .find(|name| !name.is_empty())
                .unwrap_or(short)
                .to_string();

            let mut seen_urls = BTreeSet::new();
            let variants = record
                .variants
                .iter()
                .filter_map(select_file)
                .filter(|file| seen_urls.insert(file.url.clone()))
                .collect();

            let categories: BTreeSet<String> = record
                .categories
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();

            CatalogEntry {
                name,
                family: record.family.clone(),
                source: source.name.clone(),
                source_priority: source.priority,
                license: record.license.clone(),
                categories: categories.into_iter().collect(),
                tags: record.tags.clone(),
                popularity: record.popularity,
                variants,
                font_id,
            }
        })
        .collect()
}

/// Lower-case the ID and apply the source prefix when it has none
fn qualify_font_id(id: &str, prefix: &str) -> String {
    let id = id.trim().to_ascii_lowercase();
    if id.contains('.') || prefix.is_empty() {
        id
    } else {
        format!("{}.{id}", prefix.to_ascii_lowercase())
    }
}

fn has_extension(url: &str, ext: &str) -> bool {
    strip_query(url)
        .to_ascii_lowercase()
        .ends_with(&format!(".{ext}"))
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Pick one desktop-installable file for a variant; web-only formats yield none
fn select_file(variant: &VariantRecord) -> Option<FontFile> {
    let find = |ext: &str| {
        variant
            .files
            .iter()
            .find(|(format, url)| format.eq_ignore_ascii_case(ext) || has_extension(url, ext))
            .map(|(_, url)| url.as_str())
    };

    let (kind, url) = PREFERRED_FORMATS
        .iter()
        .find_map(|ext| find(ext).map(|url| (FileKind::Font, url)))
        .or_else(|| find("zip").map(|url| (FileKind::ZipArchive, url)))
        .or_else(|| find("tar.xz").map(|url| (FileKind::TarXzArchive, url)))?;

    let label = if variant.name.trim().is_empty() {
        "Regular".to_string()
    } else {
        variant.name.trim().to_string()
    };

    Some(FontFile {
        variant: label,
        name: file_name_from_url(url),
        url: url.to_string(),
        kind,
    })
}

/// Last path segment of a URL, query stripped and percent-escapes decoded
pub fn file_name_from_url(url: &str) -> String {
    let path = strip_query(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
