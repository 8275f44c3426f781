//! Zip backups of installed fonts, organised as `source/family/file`
//!
//! The archive is built in a temp file beside the destination and renamed
//! into place once complete. Cancellation or any error drops the temp file.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::matcher::InstalledFontMatch;
use crate::progress::{CancellationFlag, ProgressSink, ProgressStatus, ProgressUpdate};
use crate::scanner::ParsedFont;
use crate::{FontError, FontResult};

const TEMP_PREFIX: &str = "fontget-backup-";
const TEMP_SUFFIX: &str = ".zip.tmp";

/// Source name used for families outside every catalog
pub const UNMATCHED_SOURCE: &str = "Other";

/// source -> family -> files, all keys sorted
pub type BackupLayout = BTreeMap<String, BTreeMap<String, Vec<PathBuf>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupResult {
    pub family_count: usize,
    pub file_count: usize,
    /// Files that could not be opened
    pub skipped: usize,
}

/// Make a source or family name safe as a zip directory component
pub fn sanitize_for_zip_path(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    let mut result = replaced.trim_matches([' ', '.']).to_string();
    while result.contains("__") {
        result = result.replace("__", "_");
    }

    if result.is_empty() {
        "unknown".to_string()
    } else {
        result
    }
}

/// Arrange installed fonts by matched source and family
///
/// System fonts are left out, unmatched families go under "Other", and a
/// filename already placed is not added again.
pub fn organize_by_source_and_family(
    families: &BTreeMap<String, Vec<ParsedFont>>,
    matches: &BTreeMap<String, InstalledFontMatch>,
    is_system_font: impl Fn(&str) -> bool,
) -> BackupLayout {
    let mut layout = BackupLayout::new();
    let mut seen = BTreeSet::new();

    for (family, fonts) in families {
        if is_system_font(family) {
            continue;
        }

        let source = matches
            .get(family)
            .map(|m| m.source.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNMATCHED_SOURCE)
            .to_string();

        for font in fonts {
            if !seen.insert(font.name.to_lowercase()) {
                log::debug!("Skipping duplicate font file {}", font.name);
                continue;
            }
            if !font.path.exists() {
                log::warn!("Font file not found: {}", font.path.display());
                continue;
            }
            layout
                .entry(source.clone())
                .or_default()
                .entry(family.clone())
                .or_default()
                .push(font.path.clone());
        }
    }

    layout
}

/// Write the layout to a zip at `dest`
pub fn write_backup_archive(
    layout: &BackupLayout,
    dest: &Path,
    cancel: &CancellationFlag,
    progress: &dyn ProgressSink,
) -> FontResult<BackupResult> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    log::debug!("Building backup in {}", temp.path().display());

    // An early return drops `temp`, which deletes the partial archive.
    let result = write_entries(&mut temp, layout, cancel, progress)?;

    temp.persist(dest).map_err(|e| FontError::IoError(e.error))?;
    log::info!(
        "Backed up {} files from {} families to {}",
        result.file_count,
        result.family_count,
        dest.display()
    );
    Ok(result)
}

fn write_entries<W: Write + Seek>(
    writer: W,
    layout: &BackupLayout,
    cancel: &CancellationFlag,
    progress: &dyn ProgressSink,
) -> FontResult<BackupResult> {
    let archive_error = |e: zip::result::ZipError| FontError::Archive(e.to_string());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let total_files: usize = layout.values().flat_map(|f| f.values()).map(Vec::len).sum();

    let mut zip = ZipWriter::new(writer);
    let mut result = BackupResult::default();
    let mut processed = 0;

    for (source, families) in layout {
        let source_dir = sanitize_for_zip_path(source);

        for (family, files) in families {
            let family_dir = sanitize_for_zip_path(family);
            let unit = result.family_count;
            result.family_count += 1;

            for path in files {
                cancel.check()?;
                processed += 1;

                let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                    result.skipped += 1;
                    continue;
                };
                let mut source_file = match File::open(path) {
                    Ok(file) => file,
                    Err(e) => {
                        log::warn!("Failed to open {}: {e}", path.display());
                        result.skipped += 1;
                        continue;
                    }
                };

                zip.start_file(format!("{source_dir}/{family_dir}/{file_name}"), options)
                    .map_err(archive_error)?;
                io::copy(&mut source_file, &mut zip)?;
                result.file_count += 1;
            }

            progress.update(
                ProgressUpdate::new(unit, ProgressStatus::Completed, family.clone())
                    .with_percent(processed, total_files),
            );
        }
    }

    zip.finish().map_err(archive_error)?;
    Ok(result)
}

/// Delete temp archives left behind by an interrupted backup
pub fn remove_stale_temp_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
        })
        .filter(|entry| match fs::remove_file(entry.path()) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not remove {}: {e}", entry.path().display());
                false
            }
        })
        .count()
}

/// `fontget-backup-YYYY-MM-DD.zip`
pub fn default_backup_filename(date: NaiveDate) -> String {
    format!("fontget-backup-{}.zip", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use crate::protection::is_critical_system_font;
    use crate::InstallationScope;
    use tempfile::TempDir;

    fn installed(dir: &Path, file: &str, family: &str) -> ParsedFont {
        let path = dir.join(file);
        fs::write(&path, format!("data for {file}")).expect("write font");
        ParsedFont {
            name: file.to_string(),
            path,
            family: family.to_string(),
            style: "Regular".to_string(),
            font_type: "TTF".to_string(),
            scope: InstallationScope::User,
            modified: None,
        }
    }

    fn roboto_match() -> InstalledFontMatch {
        InstalledFontMatch {
            family_name: "Roboto".to_string(),
            font_id: "google.roboto".to_string(),
            name: "Roboto".to_string(),
            source: "Google Fonts".to_string(),
            license: "OFL".to_string(),
            categories: Vec::new(),
        }
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).expect("open zip")).expect("zip");
        (0..archive.len())
            .map(|i| archive.by_index(i).expect("member").name().to_string())
            .collect()
    }

    #[test]
    fn sanitizes_unsafe_names() {
        assert_eq!(sanitize_for_zip_path("Google Fonts"), "Google Fonts");
        assert_eq!(sanitize_for_zip_path("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_for_zip_path(" <Fancy>: Font. "), "_Fancy_ Font");
        assert_eq!(sanitize_for_zip_path("??"), "_");
        assert_eq!(sanitize_for_zip_path(".."), "unknown");
    }

    #[test]
    fn archive_is_organised_by_source_and_family() {
        let tmp = TempDir::new().expect("tempdir");
        let fonts_dir = tmp.path().join("fonts");
        fs::create_dir_all(&fonts_dir).expect("fonts dir");

        let fonts = vec![
            installed(&fonts_dir, "Roboto-Regular.ttf", "Roboto"),
            installed(&fonts_dir, "Roboto-Bold.ttf", "Roboto"),
            installed(&fonts_dir, "Mine-Regular.otf", "Mine: Custom"),
            installed(&fonts_dir, "Arial.ttf", "Arial"),
        ];
        let families = crate::scanner::group_by_family(&fonts);
        let matches = BTreeMap::from([("Roboto".to_string(), roboto_match())]);

        let layout = organize_by_source_and_family(&families, &matches, is_critical_system_font);
        let dest = tmp.path().join("out").join("backup.zip");
        let result =
            write_backup_archive(&layout, &dest, &CancellationFlag::new(), &NullProgress)
                .expect("backup");

        assert_eq!(result.family_count, 2);
        assert_eq!(result.file_count, 3);

        let mut names = entry_names(&dest);
        names.sort();
        assert_eq!(
            names,
            vec![
                "Google Fonts/Roboto/Roboto-Bold.ttf",
                "Google Fonts/Roboto/Roboto-Regular.ttf",
                "Other/Mine_ Custom/Mine-Regular.otf",
            ]
        );
        assert_eq!(remove_stale_temp_files(&tmp.path().join("out")), 0);
    }

    #[test]
    fn duplicate_filenames_are_archived_once() {
        let tmp = TempDir::new().expect("tempdir");
        let user = tmp.path().join("user");
        let machine = tmp.path().join("machine");
        fs::create_dir_all(&user).expect("user");
        fs::create_dir_all(&machine).expect("machine");

        let fonts = vec![
            installed(&user, "Lato-Regular.ttf", "Lato"),
            installed(&machine, "Lato-Regular.ttf", "Lato"),
        ];
        let layout = organize_by_source_and_family(
            &crate::scanner::group_by_family(&fonts),
            &BTreeMap::new(),
            |_| false,
        );
        assert_eq!(layout["Other"]["Lato"].len(), 1);
    }

    #[test]
    fn cancellation_removes_the_temp_archive() {
        let tmp = TempDir::new().expect("tempdir");
        let fonts = vec![installed(tmp.path(), "Lato-Regular.ttf", "Lato")];
        let layout = organize_by_source_and_family(
            &crate::scanner::group_by_family(&fonts),
            &BTreeMap::new(),
            |_| false,
        );

        let cancel = CancellationFlag::new();
        cancel.cancel();
        let dest = tmp.path().join("backup.zip");
        let result = write_backup_archive(&layout, &dest, &cancel, &NullProgress);

        assert!(matches!(result, Err(FontError::Cancelled)));
        assert!(!dest.exists());
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .expect("read dir")
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn stale_temp_files_are_removed() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join("fontget-backup-abc.zip.tmp"), b"partial").expect("seed");
        fs::write(tmp.path().join("keep.zip"), b"keep").expect("seed");

        assert_eq!(remove_stale_temp_files(tmp.path()), 1);
        assert!(tmp.path().join("keep.zip").exists());
    }

    #[test]
    fn default_filename_uses_the_date() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 1).expect("date");
        assert_eq!(default_backup_filename(date), "fontget-backup-2025-12-01.zip");
    }
}
