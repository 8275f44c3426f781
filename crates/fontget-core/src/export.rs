//! Export manifest reconciliation
//!
//! Turns matched installed families into a deduplicated, deterministic
//! manifest keyed by FontID. Families sharing an ID are merged into one
//! entry so a re-import installs each font once.

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::manifest::write_atomic;
use crate::matcher::InstalledFontMatch;
use crate::scanner::ParsedFont;
use crate::{FontError, FontResult, InstallationScope};

pub const EXPORT_VERSION: &str = "1.0";
pub const EXPORTED_BY: &str = "fontget";

/// Which installed families end up in the export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFilters {
    /// Substring of family name or FontID
    pub match_filter: Option<String>,
    /// Substring of the matched source name
    pub source_filter: Option<String>,
    /// Include families without a catalog match
    pub export_all: bool,
    pub only_matched: bool,
}

impl ExportFilters {
    pub fn with_match(mut self, filter: impl Into<String>) -> Self {
        self.match_filter = Some(filter.into());
        self
    }

    pub fn with_source(mut self, filter: impl Into<String>) -> Self {
        self.source_filter = Some(filter.into());
        self
    }

    pub fn with_all(mut self, export_all: bool) -> Self {
        self.export_all = export_all;
        self
    }

    pub fn with_only_matched(mut self, only_matched: bool) -> Self {
        self.only_matched = only_matched;
        self
    }

    /// Reject contradictory combinations before any scanning happens
    pub fn validate(&self) -> FontResult<()> {
        if non_empty(&self.match_filter).is_some() && non_empty(&self.source_filter).is_some() {
            return Err(FontError::MutuallyExclusive("--match", "--source"));
        }
        if self.export_all && self.only_matched {
            return Err(FontError::MutuallyExclusive("--all", "--matched"));
        }
        Ok(())
    }

    /// "Only matched" unless everything was requested
    pub fn effective_only_matched(&self) -> bool {
        !self.export_all
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// One font (possibly spanning several families) in an export manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawExportedFont")]
pub struct ExportedFont {
    /// Empty when the font matched no catalog entry
    pub font_id: String,
    pub family_names: Vec<String>,
    pub source: String,
    pub license: String,
    pub categories: Vec<String>,
    pub variants: Vec<String>,
    pub scope: InstallationScope,
}

impl ExportedFont {
    pub fn is_matched(&self) -> bool {
        !self.font_id.is_empty()
    }
}

/// Wire shape accepted on import, including the singular `family_name` field
#[derive(Deserialize)]
struct RawExportedFont {
    #[serde(default)]
    font_id: String,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    family_names: Vec<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    license: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    variants: Vec<String>,
    #[serde(default)]
    scope: Option<InstallationScope>,
}

impl From<RawExportedFont> for ExportedFont {
    fn from(raw: RawExportedFont) -> Self {
        let mut family_names: Vec<String> = raw
            .family_names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if family_names.is_empty() {
            family_names.extend(
                raw.family_name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty()),
            );
        }

        Self {
            font_id: raw.font_id.trim().to_string(),
            family_names,
            source: raw.source,
            license: raw.license,
            categories: raw.categories,
            variants: raw.variants,
            scope: raw.scope.unwrap_or(InstallationScope::User),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportMetadata {
    pub total_fonts: usize,
    pub total_variants: usize,
    pub filter_by_match: String,
    pub filter_by_source: String,
    pub only_matched: bool,
}

/// The interchange file written by export and read by import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub version: String,
    pub exported_at: String,
    #[serde(default)]
    pub exported_by: String,
    #[serde(default)]
    pub fonts: Vec<ExportedFont>,
    #[serde(default)]
    pub metadata: ExportMetadata,
}

/// Manifest plus counts of what was left out
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub manifest: ExportManifest,
    pub skipped_system: usize,
    pub skipped_unmatched: usize,
    pub skipped_by_filter: usize,
}

struct FontGroup {
    font_id: String,
    family_names: BTreeSet<String>,
    source: String,
    license: String,
    categories: Vec<String>,
    variants: BTreeSet<String>,
    scope: InstallationScope,
}

pub struct ExportReconciler;

impl ExportReconciler {
    /// Group installed families into export entries
    ///
    /// System fonts are always excluded, whatever the filters say.
    pub fn build(
        matches: &BTreeMap<String, InstalledFontMatch>,
        families: &BTreeMap<String, Vec<ParsedFont>>,
        filters: &ExportFilters,
        is_system_font: impl Fn(&str) -> bool,
    ) -> FontResult<ExportResult> {
        filters.validate()?;
        let only_matched = filters.effective_only_matched();
        let match_filter = non_empty(&filters.match_filter).map(str::to_lowercase);
        let source_filter = non_empty(&filters.source_filter).map(str::to_lowercase);

        let mut groups: BTreeMap<String, FontGroup> = BTreeMap::new();
        let mut skipped_system = 0;
        let mut skipped_unmatched = 0;
        let mut skipped_by_filter = 0;

        // BTreeMap keys iterate in sorted family order.
        for (family, fonts) in families {
            if is_system_font(family) {
                skipped_system += 1;
                continue;
            }
            let Some(first) = fonts.first() else {
                continue;
            };

            let matched = matches.get(family);
            if matched.is_none() && only_matched {
                skipped_unmatched += 1;
                continue;
            }

            if let Some(filter) = &match_filter {
                let hit = family.to_lowercase().contains(filter)
                    || matched.is_some_and(|m| m.font_id.to_lowercase().contains(filter));
                if !hit {
                    skipped_by_filter += 1;
                    continue;
                }
            }

            if let Some(filter) = &source_filter {
                let hit = matched.is_some_and(|m| m.source.to_lowercase().contains(filter));
                if !hit {
                    skipped_by_filter += 1;
                    continue;
                }
            }

            // Matched families group by FontID; the prefix keeps the key spaces apart.
            let key = match matched {
                Some(m) => format!("id:{}", m.font_id),
                None => format!("family:{family}"),
            };
            let group = groups.entry(key).or_insert_with(|| FontGroup {
                font_id: matched.map(|m| m.font_id.clone()).unwrap_or_default(),
                family_names: BTreeSet::new(),
                source: matched.map(|m| m.source.clone()).unwrap_or_default(),
                license: matched.map(|m| m.license.clone()).unwrap_or_default(),
                categories: matched.map(|m| m.categories.clone()).unwrap_or_default(),
                variants: BTreeSet::new(),
                scope: first.scope,
            });

            group.family_names.insert(family.clone());
            group.variants.extend(
                fonts
                    .iter()
                    .map(|font| font.style.trim())
                    .filter(|style| !style.is_empty())
                    .map(str::to_string),
            );
        }

        let mut fonts: Vec<ExportedFont> = groups
            .into_values()
            .map(|group| ExportedFont {
                font_id: group.font_id,
                family_names: group.family_names.into_iter().collect(),
                source: group.source,
                license: group.license,
                categories: group.categories,
                variants: group.variants.into_iter().collect(),
                scope: group.scope,
            })
            .collect();

        // Matched before unmatched, then by FontID or first family name.
        fonts.sort_by(|a, b| {
            let key = |font: &ExportedFont| {
                (
                    !font.is_matched(),
                    if font.is_matched() {
                        font.font_id.clone()
                    } else {
                        font.family_names.first().cloned().unwrap_or_default()
                    },
                )
            };
            key(a).cmp(&key(b))
        });

        let total_variants = fonts.iter().map(|font| font.variants.len()).sum();
        log::debug!(
            "Export: {} fonts, skipped {skipped_system} system, {skipped_unmatched} unmatched, {skipped_by_filter} filtered",
            fonts.len()
        );

        let manifest = ExportManifest {
            version: EXPORT_VERSION.to_string(),
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            exported_by: EXPORTED_BY.to_string(),
            metadata: ExportMetadata {
                total_fonts: fonts.len(),
                total_variants,
                filter_by_match: match_filter.unwrap_or_default(),
                filter_by_source: source_filter.unwrap_or_default(),
                only_matched,
            },
            fonts,
        };

        Ok(ExportResult {
            manifest,
            skipped_system,
            skipped_unmatched,
            skipped_by_filter,
        })
    }
}

/// `fontget-export-YYYY-MM-DD.json`
pub fn default_export_filename(date: NaiveDate) -> String {
    format!("fontget-export-{}.json", date.format("%Y-%m-%d"))
}

pub fn write_export(path: &Path, manifest: &ExportManifest) -> FontResult<()> {
    let content = serde_json::to_string_pretty(manifest)
        .map_err(|e| FontError::InvalidFormat(format!("Failed to serialize export: {e}")))?;
    write_atomic(path, content.as_bytes())
}

pub fn read_export(path: &Path) -> FontResult<ExportManifest> {
    let content = fs::read_to_string(path)?;
    parse_export(&content)
}

pub fn parse_export(content: &str) -> FontResult<ExportManifest> {
    serde_json::from_str(content)
        .map_err(|e| FontError::InvalidFormat(format!("not a fontget export manifest: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protection::is_critical_system_font;
    use std::path::PathBuf;

    fn font(family: &str, style: &str, scope: InstallationScope) -> ParsedFont {
        ParsedFont {
            name: format!("{}-{}.ttf", family.replace(' ', ""), style.replace(' ', "")),
            path: PathBuf::from(format!("/fonts/{family}-{style}.ttf")),
            family: family.to_string(),
            style: style.to_string(),
            font_type: "TTF".to_string(),
            scope,
            modified: None,
        }
    }

    fn matched(family: &str, font_id: &str, source: &str) -> (String, InstalledFontMatch) {
        (
            family.to_string(),
            InstalledFontMatch {
                family_name: family.to_string(),
                font_id: font_id.to_string(),
                name: family.to_string(),
                source: source.to_string(),
                license: "OFL".to_string(),
                categories: vec!["Monospace".to_string()],
            },
        )
    }

    fn families(fonts: Vec<ParsedFont>) -> BTreeMap<String, Vec<ParsedFont>> {
        crate::scanner::group_by_family(&fonts)
    }

    #[test]
    fn families_sharing_an_id_merge_into_one_entry() {
        let installed = families(vec![
            font("Fira Code", "Regular", InstallationScope::User),
            font("Fira Code", "Bold", InstallationScope::User),
            font("FiraCode Nerd Font", "Regular", InstallationScope::User),
            font("FiraCode Nerd Font", "Retina", InstallationScope::User),
        ]);
        let matches = BTreeMap::from([
            matched("Fira Code", "nerd.fira-code", "Nerd Fonts"),
            matched("FiraCode Nerd Font", "nerd.fira-code", "Nerd Fonts"),
        ]);

        let result = ExportReconciler::build(
            &matches,
            &installed,
            &ExportFilters::default(),
            is_critical_system_font,
        )
        .expect("build");

        let fonts = &result.manifest.fonts;
        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts[0].font_id, "nerd.fira-code");
        assert_eq!(fonts[0].family_names, vec!["Fira Code", "FiraCode Nerd Font"]);
        assert_eq!(fonts[0].variants, vec!["Bold", "Regular", "Retina"]);
        assert_eq!(result.manifest.metadata.total_variants, 3);
        assert!(result.manifest.metadata.only_matched);
    }

    #[test]
    fn matched_entries_sort_before_unmatched() {
        let installed = families(vec![
            font("Aardvark Sans", "Regular", InstallationScope::User),
            font("Roboto", "Regular", InstallationScope::User),
            font("Lato", "Regular", InstallationScope::Machine),
        ]);
        let matches = BTreeMap::from([
            matched("Roboto", "google.roboto", "Google Fonts"),
            matched("Lato", "google.lato", "Google Fonts"),
        ]);

        let result = ExportReconciler::build(
            &matches,
            &installed,
            &ExportFilters::default().with_all(true),
            is_critical_system_font,
        )
        .expect("build");

        let order: Vec<(&str, &str)> = result
            .manifest
            .fonts
            .iter()
            .map(|f| (f.font_id.as_str(), f.family_names[0].as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("google.lato", "Lato"),
                ("google.roboto", "Roboto"),
                ("", "Aardvark Sans"),
            ]
        );
        assert_eq!(result.manifest.fonts[0].scope, InstallationScope::Machine);
    }

    #[test]
    fn default_policy_drops_unmatched_and_system_fonts() {
        let installed = families(vec![
            font("Arial", "Regular", InstallationScope::User),
            font("My Font", "Regular", InstallationScope::User),
            font("Roboto", "Regular", InstallationScope::User),
        ]);
        // A system font that somehow matched must still be excluded.
        let matches = BTreeMap::from([
            matched("Roboto", "google.roboto", "Google Fonts"),
            matched("Arial", "squirrel.arial", "Font Squirrel"),
        ]);

        let result = ExportReconciler::build(
            &matches,
            &installed,
            &ExportFilters::default().with_all(true),
            is_critical_system_font,
        )
        .expect("build");

        assert!(result
            .manifest
            .fonts
            .iter()
            .all(|f| f.family_names.iter().all(|n| !is_critical_system_font(n))));
        assert_eq!(result.skipped_system, 1);

        let matched_only = ExportReconciler::build(
            &matches,
            &installed,
            &ExportFilters::default(),
            is_critical_system_font,
        )
        .expect("build");
        assert_eq!(matched_only.manifest.fonts.len(), 1);
        assert_eq!(matched_only.skipped_unmatched, 1);
    }

    #[test]
    fn match_and_source_filters_narrow_the_export() {
        let installed = families(vec![
            font("Roboto", "Regular", InstallationScope::User),
            font("JetBrainsMono Nerd Font", "Regular", InstallationScope::User),
        ]);
        let matches = BTreeMap::from([
            matched("Roboto", "google.roboto", "Google Fonts"),
            matched("JetBrainsMono Nerd Font", "nerd.jetbrains-mono", "Nerd Fonts"),
        ]);

        let by_source = ExportReconciler::build(
            &matches,
            &installed,
            &ExportFilters::default().with_source("nerd"),
            |_| false,
        )
        .expect("build");
        assert_eq!(by_source.manifest.fonts.len(), 1);
        assert_eq!(by_source.manifest.metadata.filter_by_source, "nerd");

        let by_match = ExportReconciler::build(
            &matches,
            &installed,
            &ExportFilters::default().with_match("google.rob"),
            |_| false,
        )
        .expect("build");
        assert_eq!(by_match.manifest.fonts[0].font_id, "google.roboto");
        assert_eq!(by_match.skipped_by_filter, 1);
    }

    #[test]
    fn contradictory_filters_are_rejected() {
        let both = ExportFilters::default().with_match("x").with_source("y");
        assert!(matches!(
            both.validate(),
            Err(FontError::MutuallyExclusive("--match", "--source"))
        ));

        let all_and_matched = ExportFilters::default().with_all(true).with_only_matched(true);
        assert!(matches!(
            ExportReconciler::build(&BTreeMap::new(), &BTreeMap::new(), &all_and_matched, |_| false),
            Err(FontError::MutuallyExclusive("--all", "--matched"))
        ));
    }

    #[test]
    fn legacy_family_name_is_read() {
        let manifest = parse_export(
            r#"{
                "version": "1.0",
                "exported_at": "2024-05-01T10:00:00Z",
                "exported_by": "fontget",
                "fonts": [
                    {"font_id": "google.roboto", "family_name": "Roboto",
                     "source": "Google Fonts", "variants": ["Regular"], "scope": "machine"},
                    {"font_id": "google.lato", "family_name": "Old", "family_names": ["Lato"]}
                ]
            }"#,
        )
        .expect("parse");

        assert_eq!(manifest.fonts[0].family_names, vec!["Roboto"]);
        assert_eq!(manifest.fonts[0].scope, InstallationScope::Machine);
        assert_eq!(manifest.fonts[1].family_names, vec!["Lato"]);
        assert_eq!(manifest.fonts[1].scope, InstallationScope::User);

        let written = serde_json::to_string(&manifest).expect("serialize");
        assert!(written.contains("\"family_names\""));
        assert!(!written.contains("\"family_name\""));
    }

    #[test]
    fn default_filename_uses_the_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).expect("date");
        assert_eq!(default_export_filename(date), "fontget-export-2025-03-09.json");
    }
}
