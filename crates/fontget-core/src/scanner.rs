//! Installed font discovery
//!
//! Walks each scope's font directory, reads family/style from the font's
//! `name` table and falls back to the filename when the header cannot be
//! parsed. A filename seen in an earlier scope hides later duplicates.

use chrono::{DateTime, Utc};
use read_fonts::tables::name::NameId;
use read_fonts::{FileRef, TableProvider};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::protection::is_critical_system_font;
use crate::scope::ScopeResolver;
use crate::validation;
use crate::{FontError, InstallationScope};

/// A single font file found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedFont {
    /// Filename as installed
    pub name: String,
    pub path: PathBuf,
    pub family: String,
    pub style: String,
    /// Upper-case extension ("TTF", "OTF")
    pub font_type: String,
    pub scope: InstallationScope,
    pub modified: Option<DateTime<Utc>>,
}

impl ParsedFont {
    pub fn from_path(path: &Path, scope: InstallationScope) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (family, style) = if validation::is_sfnt(path) {
            read_name_table(path).unwrap_or_else(|| validation::parse_font_filename(&name))
        } else {
            validation::parse_font_filename(&name)
        };

        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Self {
            font_type: validation::font_type(path),
            path: path.to_path_buf(),
            name,
            family,
            style,
            scope,
            modified,
        }
    }
}

/// Fonts found plus per-scope problems that did not stop the scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub fonts: Vec<ParsedFont>,
    pub warnings: Vec<FontError>,
}

/// Scans the font directories of one or more scopes
pub struct InstalledFontScanner<'a> {
    resolver: &'a ScopeResolver,
}

impl<'a> InstalledFontScanner<'a> {
    pub fn new(resolver: &'a ScopeResolver) -> Self {
        Self { resolver }
    }

    /// Scan scopes in user-then-machine order; unreadable scopes become warnings
    pub fn scan(&self, scopes: &[InstallationScope]) -> ScanReport {
        let ordered: BTreeSet<InstallationScope> = scopes.iter().copied().collect();
        let mut report = ScanReport::default();
        let mut seen = BTreeSet::new();

        for scope in ordered {
            let dir = match self.resolver.resolve(scope) {
                Ok(dir) => dir,
                Err(e) => {
                    log::warn!("Skipping {scope} scope: no font directory");
                    report.warnings.push(e);
                    continue;
                }
            };

            match scan_directory(&dir, scope) {
                Ok(fonts) => {
                    log::debug!("{} fonts in {}", fonts.len(), dir.display());
                    for font in fonts {
                        if seen.insert(font.name.to_lowercase()) {
                            report.fonts.push(font);
                        } else {
                            log::debug!("Duplicate {} in {scope} scope ignored", font.name);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Cannot read {}: {e}", dir.display());
                    report.warnings.push(FontError::ScopeUnreadable {
                        scope,
                        reason: format!("{}: {e}", dir.display()),
                    });
                }
            }
        }

        report
    }
}

/// Recursively collect font files below `dir`; a missing directory is empty
pub fn scan_directory(dir: &Path, scope: InstallationScope) -> io::Result<Vec<ParsedFont>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_font_files(dir, &mut files, true)?;
    files.sort();

    Ok(files
        .iter()
        .map(|path| ParsedFont::from_path(path, scope))
        .collect())
}

fn collect_font_files(dir: &Path, found: &mut Vec<PathBuf>, is_root: bool) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if is_root => return Err(e),
        Err(e) => {
            log::warn!("Skipping {}: {e}", dir.display());
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, found, false)?;
        } else if path.is_file() && validation::is_valid_font_extension(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Family and style from the name table, typographic IDs first
fn read_name_table(path: &Path) -> Option<(String, String)> {
    let data = fs::read(path).ok()?;
    let font = match FileRef::new(&data).ok()? {
        FileRef::Font(f) => f,
        FileRef::Collection(c) => c.get(0).ok()?,
    };
    let name_table = font.name().ok()?;

    let find_name = |id: u16| -> Option<String> {
        name_table
            .name_record()
            .iter()
            .find(|r| r.name_id() == NameId::new(id))
            .and_then(|r| r.string(name_table.string_data()).ok())
            .map(|s| s.to_string().trim().to_string())
            .filter(|s| !s.is_empty())
    };

    // 16/17 = typographic family/subfamily, 1/2 = legacy family/subfamily
    let family = find_name(16).or_else(|| find_name(1))?;
    let style = find_name(17)
        .or_else(|| find_name(2))
        .unwrap_or_else(|| "Regular".to_string());
    Some((family, style))
}

/// Drop fonts whose family or filename is a critical system font
pub fn exclude_system_fonts(fonts: Vec<ParsedFont>) -> Vec<ParsedFont> {
    fonts
        .into_iter()
        .filter(|font| !is_critical_system_font(&font.family) && !is_critical_system_font(&font.name))
        .collect()
}

/// Group fonts by family name; keys iterate in sorted order
pub fn group_by_family(fonts: &[ParsedFont]) -> BTreeMap<String, Vec<ParsedFont>> {
    let mut families: BTreeMap<String, Vec<ParsedFont>> = BTreeMap::new();
    for font in fonts {
        families
            .entry(font.family.clone())
            .or_default()
            .push(font.clone());
    }
    families
}
