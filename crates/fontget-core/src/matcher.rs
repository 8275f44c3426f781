//! Maps installed family names to catalog entries

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::catalog::{CatalogEntry, CatalogIndex};
use crate::protection::normalize_font_name;
use crate::{FontError, FontResult};

const NERD_FONTS_SOURCE: &str = "Nerd Fonts";

/// Patterns marking a Nerd Font patched family, searched case-insensitively
const NERD_PATTERNS: [&str; 3] = [" nerd font", "nerdfont", " nerd"];

/// Variant suffixes absent from catalog IDs ("JetBrainsMonoNL" -> "JetBrainsMono")
const VARIANT_SUFFIXES: [&str; 3] = ["NL", "Propo", "Proportional"];

/// An installed family name associated with a catalog FontID
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledFontMatch {
    pub family_name: String,
    pub font_id: String,
    /// Catalog display name
    pub name: String,
    pub source: String,
    pub license: String,
    pub categories: Vec<String>,
}

impl InstalledFontMatch {
    fn new(family_name: &str, entry: &CatalogEntry) -> Self {
        Self {
            family_name: family_name.to_string(),
            font_id: entry.font_id.clone(),
            name: entry.name.clone(),
            source: entry.source.clone(),
            license: entry.license.clone(),
            categories: entry.categories.clone(),
        }
    }
}

/// Lookup indexes over a loaded catalog
pub struct FontMatcher<'a> {
    index: &'a CatalogIndex,
    by_name: HashMap<String, Vec<&'a CatalogEntry>>,
    by_id_name: HashMap<String, Vec<&'a CatalogEntry>>,
}

impl<'a> FontMatcher<'a> {
    pub fn new(index: &'a CatalogIndex) -> Self {
        let mut by_name: HashMap<String, Vec<&CatalogEntry>> = HashMap::new();
        let mut by_id_name: HashMap<String, Vec<&CatalogEntry>> = HashMap::new();

        for entry in index.entries() {
            by_name
                .entry(normalize_font_name(&entry.name))
                .or_default()
                .push(entry);
            by_id_name
                .entry(normalize_font_name(entry.short_id()))
                .or_default()
                .push(entry);
        }

        // Candidate order decides ties: lowest priority value, then FontID.
        for candidates in by_name.values_mut().chain(by_id_name.values_mut()) {
            candidates.sort_by(|a, b| {
                (a.source_priority, &a.font_id).cmp(&(b.source_priority, &b.font_id))
            });
        }

        Self {
            index,
            by_name,
            by_id_name,
        }
    }

    /// Match one family name; `None` means a font outside every catalog
    pub fn match_family(&self, family_name: &str) -> Option<InstalledFontMatch> {
        let normalized = normalize_font_name(family_name);
        if normalized.is_empty() {
            return None;
        }

        let base = extract_base_font_name(family_name);
        let has_suffix = base != family_name.trim();
        let expected_source = (has_suffix && family_name.to_lowercase().contains("nerd"))
            .then_some(NERD_FONTS_SOURCE);

        let pick = |candidates: Option<&Vec<&'a CatalogEntry>>, strict: bool| {
            let candidates = candidates?;
            if let Some(expected) = expected_source {
                if let Some(entry) = candidates.iter().find(|e| e.source == expected) {
                    return Some(*entry);
                }
                if strict {
                    return None;
                }
            }
            candidates.first().copied()
        };

        let entry = pick(self.by_name.get(&normalized), false)
            .or_else(|| pick(self.by_id_name.get(&normalized), false))
            .or_else(|| {
                if !has_suffix {
                    return None;
                }
                let normalized_base = normalize_font_name(&base);
                pick(self.by_id_name.get(&normalized_base), true)
                    .or_else(|| pick(self.by_name.get(&normalized_base), true))
            })?;

        Some(InstalledFontMatch::new(family_name, entry))
    }

    /// Match every family name, skipping system fonts
    ///
    /// Unmatched names have no map entry. Fails only when the catalog never
    /// loaded any source.
    pub fn match_all(
        &self,
        family_names: &[String],
        is_system_font: impl Fn(&str) -> bool,
    ) -> FontResult<BTreeMap<String, InstalledFontMatch>> {
        if !self.index.is_loaded() {
            return Err(FontError::SourceUnavailable {
                source_name: "catalog".to_string(),
                reason: "no source catalog is loaded".to_string(),
            });
        }

        let mut matches = BTreeMap::new();
        for family in family_names {
            if is_system_font(family) {
                continue;
            }
            if let Some(found) = self.match_family(family) {
                log::debug!("{family} -> {}", found.font_id);
                matches.insert(family.clone(), found);
            }
        }
        Ok(matches)
    }
}

/// Strip Nerd Font markers and variant suffixes from a family name
///
/// "JetBrainsMonoNL Nerd Font" -> "JetBrainsMono"; names without a marker
/// only lose variant suffixes.
pub fn extract_base_font_name(family_name: &str) -> String {
    let family_name = family_name.trim();
    let lower = family_name.to_ascii_lowercase();

    let mut base = NERD_PATTERNS
        .iter()
        .filter_map(|pattern| lower.find(pattern))
        .find(|idx| *idx > 0)
        .map(|idx| family_name[..idx].trim())
        .unwrap_or(family_name)
        .to_string();

    for suffix in VARIANT_SUFFIXES {
        let base_lower = base.to_ascii_lowercase();
        if base_lower.len() > suffix.len() && base_lower.ends_with(&suffix.to_ascii_lowercase()) {
            base.truncate(base.len() - suffix.len());
            base = base.trim().to_string();
        }
    }

    base
}
