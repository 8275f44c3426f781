//! Import reconciliation
//!
//! Decides which entries of an export manifest can be installed here and
//! explains why the others cannot. Source state is checked before the
//! catalog lookup, so a font from a disabled source is reported as such
//! rather than as "not found".

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::catalog::CatalogIndex;
use crate::export::ExportManifest;
use crate::manifest::{is_builtin_source, Manifest};
use crate::planner::FontInstallGroup;
use crate::{FontError, FontResult, InstallationScope};

/// An export entry that can be installed from the loaded catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportCandidate {
    pub font_id: String,
    pub family_names: Vec<String>,
    /// Family names joined with ", "
    pub display_name: String,
    pub source: String,
    pub scope: InstallationScope,
}

/// Why part of an import cannot be installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    DisabledSource { source: String, fonts: Vec<String> },
    MissingSource { source: String, fonts: Vec<String>, builtin: bool },
    NoFontId { fonts: Vec<String> },
    NotFound { fonts: Vec<String> },
}

impl ImportWarning {
    pub fn fonts(&self) -> &[String] {
        match self {
            ImportWarning::DisabledSource { fonts, .. }
            | ImportWarning::MissingSource { fonts, .. }
            | ImportWarning::NoFontId { fonts }
            | ImportWarning::NotFound { fonts } => fonts,
        }
    }

    /// Follow-up command for the user
    pub fn hint(&self) -> &'static str {
        match self {
            ImportWarning::DisabledSource { .. } => {
                "Enable it with 'fontget sources enable' to import these fonts."
            }
            ImportWarning::MissingSource { builtin: true, .. } => {
                "Run 'fontget sources update' to refresh sources."
            }
            ImportWarning::MissingSource { builtin: false, .. } => {
                "Add this source with 'fontget sources add' to import these fonts."
            }
            ImportWarning::NoFontId { .. } => "These fonts were not matched to any catalog on export.",
            ImportWarning::NotFound { .. } => "Try running 'fontget sources update' to refresh the catalog.",
        }
    }
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::DisabledSource { source, .. } => {
                write!(f, "The following fonts require '{source}' which is currently disabled")
            }
            ImportWarning::MissingSource { source, .. } => {
                write!(f, "The following fonts require '{source}' which is not available in your sources")
            }
            ImportWarning::NoFontId { .. } => {
                write!(f, "The following fonts have no Font ID and will be skipped")
            }
            ImportWarning::NotFound { .. } => {
                write!(f, "The following fonts were not found in the loaded catalog")
            }
        }
    }
}

/// Result of reconciling an export manifest with local sources
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportPlan {
    pub to_install: Vec<ImportCandidate>,
    /// Entries without a FontID
    pub invalid: Vec<String>,
    /// FontIDs seen more than once (later occurrences dropped)
    pub duplicates: Vec<String>,
    pub not_found: Vec<String>,
    pub missing_sources: BTreeMap<String, Vec<String>>,
    pub disabled_sources: BTreeMap<String, Vec<String>>,
}

impl ImportPlan {
    /// Warnings in display order: disabled, missing, invalid, not found
    pub fn warnings(&self) -> Vec<ImportWarning> {
        let mut warnings: Vec<ImportWarning> = self
            .disabled_sources
            .iter()
            .map(|(source, fonts)| ImportWarning::DisabledSource {
                source: source.clone(),
                fonts: fonts.clone(),
            })
            .collect();

        warnings.extend(self.missing_sources.iter().map(|(source, fonts)| {
            ImportWarning::MissingSource {
                source: source.clone(),
                fonts: fonts.clone(),
                builtin: is_builtin_source(source),
            }
        }));

        if !self.invalid.is_empty() {
            warnings.push(ImportWarning::NoFontId {
                fonts: self.invalid.clone(),
            });
        }
        if !self.not_found.is_empty() {
            warnings.push(ImportWarning::NotFound {
                fonts: self.not_found.clone(),
            });
        }
        warnings
    }

    /// Install units for every candidate, labelled by family names
    pub fn install_groups(&self, index: &CatalogIndex) -> Vec<FontInstallGroup> {
        self.to_install
            .iter()
            .filter_map(|candidate| {
                index.lookup(&candidate.font_id).map(|entry| {
                    FontInstallGroup::from_entry(entry)
                        .with_family_names(candidate.family_names.clone())
                })
            })
            .collect()
    }
}

/// Structural checks before reconciliation
pub fn validate_import(export: &ExportManifest) -> FontResult<()> {
    if export.version.trim().is_empty() {
        return Err(FontError::InvalidFormat(
            "export manifest is missing its version".to_string(),
        ));
    }
    if export.fonts.is_empty() {
        return Err(FontError::InvalidFormat(
            "export manifest contains no fonts".to_string(),
        ));
    }
    Ok(())
}

/// Split an export manifest into installable fonts and warnings
pub fn reconcile(
    export: &ExportManifest,
    index: &CatalogIndex,
    manifest: &Manifest,
) -> FontResult<ImportPlan> {
    validate_import(export)?;

    let mut plan = ImportPlan::default();
    let mut seen = BTreeSet::new();

    for font in &export.fonts {
        let label = if font.family_names.is_empty() {
            font.font_id.clone()
        } else {
            font.family_names.join(", ")
        };

        if !font.is_matched() {
            if !label.is_empty() {
                plan.invalid.push(label);
            }
            continue;
        }

        let font_id = font.font_id.to_ascii_lowercase();
        if !seen.insert(font_id.clone()) {
            log::debug!("Skipping duplicate Font ID {font_id}");
            plan.duplicates.push(font_id);
            continue;
        }

        let source_name = if font.source.trim().is_empty() {
            manifest.source_name_for_id(&font_id)
        } else {
            font.source.trim().to_string()
        };

        match manifest.source(&source_name) {
            None => {
                plan.missing_sources.entry(source_name).or_default().push(label);
                continue;
            }
            Some(source) if !source.enabled => {
                plan.disabled_sources
                    .entry(source.name.clone())
                    .or_default()
                    .push(label);
                continue;
            }
            Some(_) => {}
        }

        if index.lookup(&font_id).is_none() {
            plan.not_found.push(label);
            continue;
        }

        plan.to_install.push(ImportCandidate {
            font_id,
            display_name: label,
            family_names: font.family_names.clone(),
            source: source_name,
            scope: font.scope,
        });
    }

    plan.to_install.sort_by(|a, b| a.font_id.cmp(&b.font_id));
    Ok(plan)
}
