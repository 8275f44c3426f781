//! Installation planning and execution
//!
//! A plan resolves a FontID to its complete variant list. Execution writes
//! each variant independently into the target directory: existing files are
//! skipped unless forced, and one failed variant never stops the others.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{CatalogEntry, CatalogIndex, FileKind, FontFile};
use crate::fetch::SourceFetcher;
use crate::progress::{BatchReport, CancellationFlag, ProgressSink, ProgressStatus, ProgressUpdate};
use crate::protection::{is_critical_system_font, normalize_font_name};
use crate::scanner::scan_directory;
use crate::scope::ScopeResolver;
use crate::validation;
use crate::{FontError, FontResult, InstallationScope};

const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// One logical install unit: every variant of a FontID
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontInstallGroup {
    pub font_id: String,
    /// Label used for progress ("Fira Code, FiraCode Nerd Font")
    pub display_name: String,
    pub family_names: Vec<String>,
    pub source: String,
    pub files: Vec<FontFile>,
}

impl FontInstallGroup {
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            font_id: entry.font_id.clone(),
            display_name: entry.name.clone(),
            family_names: vec![entry.name.clone()],
            source: entry.source.clone(),
            files: entry.variants.clone(),
        }
    }

    /// Use the given family names as the display unit
    pub fn with_family_names(mut self, family_names: Vec<String>) -> Self {
        if !family_names.is_empty() {
            self.display_name = family_names.join(", ");
            self.family_names = family_names;
        }
        self
    }
}

/// Groups to execute plus requests that matched nothing
#[derive(Debug, Default)]
pub struct InstallPlan {
    pub groups: Vec<FontInstallGroup>,
    pub unresolved: Vec<String>,
}

/// Where and how variants are written
///
/// Constructing a target performs the elevation check, so no machine-scope
/// write can start without it.
#[derive(Debug, Clone)]
pub struct InstallTarget {
    scope: InstallationScope,
    dir: PathBuf,
    force: bool,
}

impl InstallTarget {
    pub fn for_scope(resolver: &ScopeResolver, scope: InstallationScope, force: bool) -> FontResult<Self> {
        resolver.require_elevation(scope)?;
        Ok(Self {
            scope,
            dir: resolver.resolve(scope)?,
            force,
        })
    }

    pub fn scope(&self) -> InstallationScope {
        self.scope
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn force(&self) -> bool {
        self.force
    }
}

/// Terminal state of one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Installed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantOutcome {
    pub file_name: String,
    pub variant: String,
    pub status: VariantStatus,
}

/// Outcome of executing one group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallResult {
    pub font_id: String,
    pub installed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub variants: Vec<VariantOutcome>,
}

impl InstallResult {
    fn record(&mut self, file: &FontFile, file_name: &str, status: VariantStatus) {
        match status {
            VariantStatus::Installed => self.installed += 1,
            VariantStatus::Skipped => self.skipped += 1,
            VariantStatus::Failed => self.failed += 1,
        }
        self.variants.push(VariantOutcome {
            file_name: file_name.to_string(),
            variant: file.variant.clone(),
            status,
        });
    }

    fn record_error(&mut self, file: &FontFile, file_name: &str, error: impl std::fmt::Display) {
        self.errors.push(format!("{file_name}: {error}"));
        self.record(file, file_name, VariantStatus::Failed);
    }

    /// Per-variant counts as a batch report
    pub fn report(&self) -> BatchReport {
        BatchReport {
            succeeded: self.installed,
            skipped: self.skipped,
            failed: self.failed,
            details: self.errors.clone(),
        }
    }
}

/// Outcome of removing one requested font
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemovalResult {
    pub request: String,
    pub removed: Vec<PathBuf>,
    /// Notes explaining skips (protected, not installed)
    pub notes: Vec<String>,
    pub report: BatchReport,
}

/// Plans installs against the catalog and executes them on disk
pub struct InstallationPlanner<'a> {
    index: &'a CatalogIndex,
    fetcher: &'a dyn SourceFetcher,
    download_timeout: Duration,
}

impl<'a> InstallationPlanner<'a> {
    pub fn new(index: &'a CatalogIndex, fetcher: &'a dyn SourceFetcher) -> Self {
        Self {
            index,
            fetcher,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Resolve a FontID, or failing that a display name, to a catalog entry
    pub fn resolve_request(&self, query: &str) -> FontResult<&'a CatalogEntry> {
        if let Some(entry) = self.index.lookup(query) {
            return Ok(entry);
        }
        self.index
            .find_by_name(query)
            .into_iter()
            .next()
            .ok_or_else(|| FontError::FontNotFound(query.trim().to_string()))
    }

    /// Full variant set for one FontID
    pub fn plan(&self, font_id: &str) -> FontResult<FontInstallGroup> {
        let entry = self
            .index
            .lookup(font_id)
            .ok_or_else(|| FontError::FontNotFound(font_id.trim().to_string()))?;
        Ok(FontInstallGroup::from_entry(entry))
    }

    /// Plan several requests; requests resolving to the same FontID collapse
    pub fn plan_many(&self, requests: &[String]) -> InstallPlan {
        let mut plan = InstallPlan::default();
        let mut seen = BTreeSet::new();

        for request in requests {
            match self.resolve_request(request) {
                Ok(entry) => {
                    if seen.insert(entry.font_id.clone()) {
                        plan.groups.push(FontInstallGroup::from_entry(entry));
                    }
                }
                Err(_) => plan.unresolved.push(request.clone()),
            }
        }
        plan
    }

    /// Write every variant of `group` into the target directory
    ///
    /// Per-variant failures are recorded in the result. Only cancellation
    /// aborts, leaving already-written files in place.
    pub async fn execute(
        &self,
        group: &FontInstallGroup,
        target: &InstallTarget,
        cancel: &CancellationFlag,
        progress: &dyn ProgressSink,
        unit_index: usize,
    ) -> FontResult<InstallResult> {
        let mut result = InstallResult {
            font_id: group.font_id.clone(),
            ..Default::default()
        };
        progress.update(ProgressUpdate::new(
            unit_index,
            ProgressStatus::Started,
            format!("Installing {}", group.display_name),
        ));

        if let Err(e) = fs::create_dir_all(&target.dir) {
            for file in &group.files {
                result.record_error(file, &file.name, &e);
            }
            self.finish(group, &result, progress, unit_index);
            return Ok(result);
        }

        for file in &group.files {
            cancel.check()?;
            match file.kind {
                FileKind::Font => self.install_font_file(file, target, &mut result).await,
                FileKind::ZipArchive => self.install_zip_members(file, target, cancel, &mut result).await?,
                FileKind::TarXzArchive => {
                    result.record_error(file, &file.name, "tar.xz archives are not supported")
                }
            }
        }

        self.finish(group, &result, progress, unit_index);
        Ok(result)
    }

    fn finish(
        &self,
        group: &FontInstallGroup,
        result: &InstallResult,
        progress: &dyn ProgressSink,
        unit_index: usize,
    ) {
        let status = if result.failed > 0 && result.installed == 0 {
            ProgressStatus::Failed
        } else if result.installed == 0 && result.skipped > 0 {
            ProgressStatus::Skipped
        } else {
            ProgressStatus::Completed
        };
        progress.update(ProgressUpdate::new(
            unit_index,
            status,
            format!(
                "{}: {} installed, {} skipped, {} failed",
                group.display_name, result.installed, result.skipped, result.failed
            ),
        ));
    }

    async fn install_font_file(&self, file: &FontFile, target: &InstallTarget, result: &mut InstallResult) {
        let dest = match destination(&target.dir, &file.name) {
            Ok(dest) => dest,
            Err(e) => return result.record_error(file, &file.name, e),
        };

        if dest.exists() && !target.force {
            log::debug!("{} already installed", dest.display());
            return result.record(file, &file.name, VariantStatus::Skipped);
        }

        let bytes = match self.fetcher.fetch(&file.url, self.download_timeout).await {
            Ok(bytes) => bytes,
            Err(e) => return result.record_error(file, &file.name, e),
        };

        match write_font_file(&dest, &bytes) {
            Ok(()) => {
                log::info!("Installed {}", dest.display());
                result.record(file, &file.name, VariantStatus::Installed);
            }
            Err(e) => result.record_error(file, &file.name, e),
        }
    }

    async fn install_zip_members(
        &self,
        file: &FontFile,
        target: &InstallTarget,
        cancel: &CancellationFlag,
        result: &mut InstallResult,
    ) -> FontResult<()> {
        let bytes = match self.fetcher.fetch(&file.url, self.download_timeout).await {
            Ok(bytes) => bytes,
            Err(e) => {
                result.record_error(file, &file.name, e);
                return Ok(());
            }
        };

        // Decompression runs on the blocking pool.
        let extracted = tokio::task::spawn_blocking(move || extract_font_members(&bytes))
            .await
            .map_err(|e| FontError::Archive(format!("archive extraction aborted: {e}")))
            .and_then(|members| members);

        let members = match extracted {
            Ok(members) if members.is_empty() => {
                result.record_error(file, &file.name, "archive contains no font files");
                return Ok(());
            }
            Ok(members) => members,
            Err(e) => {
                result.record_error(file, &file.name, e);
                return Ok(());
            }
        };

        for (name, data) in members {
            cancel.check()?;
            let dest = match destination(&target.dir, &name) {
                Ok(dest) => dest,
                Err(e) => {
                    result.record_error(file, &name, e);
                    continue;
                }
            };
            if dest.exists() && !target.force {
                result.record(file, &name, VariantStatus::Skipped);
                continue;
            }
            match write_font_file(&dest, &data) {
                Ok(()) => result.record(file, &name, VariantStatus::Installed),
                Err(e) => result.record_error(file, &name, e),
            }
        }
        Ok(())
    }

    /// Remove every installed file of a font from the target scope
    pub fn remove(
        &self,
        request: &str,
        target: &InstallTarget,
        cancel: &CancellationFlag,
    ) -> FontResult<RemovalResult> {
        let mut result = RemovalResult {
            request: request.trim().to_string(),
            ..Default::default()
        };

        if is_critical_system_font(request) {
            let note = FontError::SystemFontProtection(result.request.clone());
            log::warn!("{note}");
            result.notes.push(format!("{} is a protected system font", result.request));
            result.report.record_skip();
            return Ok(result);
        }

        let mut wanted_families = BTreeSet::from([normalize_font_name(request)]);
        let mut wanted_files = BTreeSet::new();
        let entry = self
            .index
            .lookup(request)
            .or_else(|| self.index.find_by_name(request).into_iter().next());
        if let Some(entry) = entry {
            wanted_families.insert(normalize_font_name(&entry.name));
            wanted_files.extend(entry.variants.iter().map(|f| f.name.to_lowercase()));
        }

        let installed = scan_directory(&target.dir, target.scope).map_err(|e| FontError::ScopeUnreadable {
            scope: target.scope,
            reason: format!("{}: {e}", target.dir.display()),
        })?;

        let found: Vec<_> = installed
            .into_iter()
            .filter(|font| {
                wanted_families.contains(&normalize_font_name(&font.family))
                    || wanted_files.contains(&font.name.to_lowercase())
            })
            .collect();

        if found.is_empty() {
            result
                .notes
                .push(format!("{} is not installed in {} scope", result.request, target.scope));
            result.report.record_skip();
            return Ok(result);
        }

        for font in found {
            cancel.check()?;
            if is_critical_system_font(&font.family) || is_critical_system_font(&font.name) {
                result.notes.push(format!("{} is a protected system font", font.name));
                result.report.record_skip();
                continue;
            }
            match fs::remove_file(&font.path) {
                Ok(()) => {
                    log::info!("Removed {}", font.path.display());
                    result.report.record_success();
                    result.removed.push(font.path);
                }
                Err(e) => result.report.record_failure(format!("{}: {e}", font.name)),
            }
        }

        Ok(result)
    }
}

/// Destination path for an installed file; rejects names that escape `dir`
fn destination(dir: &Path, file_name: &str) -> FontResult<PathBuf> {
    let trimmed = file_name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
    {
        return Err(FontError::InvalidFormat(format!("unsafe file name '{file_name}'")));
    }
    Ok(dir.join(trimmed))
}

/// Stage the bytes beside `dest`, then rename into place; the staged file
/// is deleted on every failure path
fn write_font_file(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(".fontget-")
        .suffix(".part")
        .tempfile_in(dir)?;
    staged.write_all(bytes)?;
    staged.persist(dest).map(|_| ()).map_err(|e| e.error)
}

/// Font members of a zip archive as (basename, bytes); first basename wins
fn extract_font_members(bytes: &[u8]) -> FontResult<Vec<(String, Vec<u8>)>> {
    let mut archive = zip::ZipArchive::new(io::Cursor::new(bytes))
        .map_err(|e| FontError::Archive(format!("cannot open zip archive: {e}")))?;

    let mut seen = BTreeSet::new();
    let mut members = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| FontError::Archive(format!("cannot read zip member: {e}")))?;
        if member.is_dir() {
            continue;
        }

        let Some(name) = member
            .enclosed_name()
            .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        else {
            continue;
        };

        // macOS resource forks ("._Font.ttf") are not fonts
        if name.starts_with("._") || !validation::is_valid_font_extension(Path::new(&name)) {
            continue;
        }
        if !seen.insert(name.to_lowercase()) {
            continue;
        }

        let mut data = Vec::new();
        member.read_to_end(&mut data)?;
        members.push((name, data));
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceCatalog;
    use crate::fetch::{FetchError, MemoryFetcher};
    use crate::manifest::SourceConfig;
    use crate::progress::NullProgress;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn google() -> SourceConfig {
        SourceConfig {
            name: "Google Fonts".to_string(),
            url: "https://catalog.test/google.json".to_string(),
            prefix: "google".to_string(),
            enabled: true,
            filename: "google.json".to_string(),
            priority: 1,
            last_synced: None,
            font_count: 0,
            version: None,
        }
    }

    fn index() -> CatalogIndex {
        let catalog: SourceCatalog = serde_json::from_value(json!({"fonts": {
            "google.roboto": {"name": "Roboto", "variants": [
                {"name": "Regular", "files": {"ttf": "https://cdn.test/Roboto-Regular.ttf"}},
                {"name": "Bold", "files": {"ttf": "https://cdn.test/Roboto-Bold.ttf"}}
            ]},
            "google.fira-code": {"name": "Fira Code", "variants": [
                {"name": "Regular", "files": {"zip": "https://cdn.test/FiraCode.zip"}}
            ]},
            "google.legacy": {"name": "Legacy", "variants": [
                {"name": "Regular", "files": {"tar.xz": "https://cdn.test/Legacy.tar.xz"}}
            ]}
        }}))
        .expect("catalog");
        CatalogIndex::from_catalogs(vec![(google(), catalog)])
    }

    fn target(tmp: &TempDir, force: bool) -> InstallTarget {
        let resolver = ScopeResolver::new(
            Some(tmp.path().join("user")),
            Some(tmp.path().join("machine")),
            false,
        );
        InstallTarget::for_scope(&resolver, InstallationScope::User, force).expect("user target")
    }

    fn roboto_fetcher() -> MemoryFetcher {
        MemoryFetcher::new()
            .with_response("https://cdn.test/Roboto-Regular.ttf", b"regular-v2".to_vec())
            .with_response("https://cdn.test/Roboto-Bold.ttf", b"bold-v2".to_vec())
    }

    fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in members {
            writer.start_file(*name, options).expect("start member");
            writer.write_all(data).expect("write member");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn existing_files_are_skipped_without_force() {
        let tmp = TempDir::new().expect("tempdir");
        let target = target(&tmp, false);
        fs::create_dir_all(target.dir()).expect("font dir");
        fs::write(target.dir().join("Roboto-Regular.ttf"), b"regular-v1").expect("seed");

        let index = index();
        let fetcher = roboto_fetcher();
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("google.roboto").expect("plan");

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target,
            &CancellationFlag::new(),
            &NullProgress,
            0,
        ))
        .expect("execute");

        assert_eq!((result.installed, result.skipped, result.failed), (1, 1, 0));
        assert_eq!(
            fs::read(target.dir().join("Roboto-Regular.ttf")).expect("read"),
            b"regular-v1"
        );
        assert_eq!(fetcher.requests(), vec!["https://cdn.test/Roboto-Bold.ttf"]);
    }

    #[test]
    fn force_overwrites_existing_files() {
        let tmp = TempDir::new().expect("tempdir");
        let target = target(&tmp, true);
        fs::create_dir_all(target.dir()).expect("font dir");
        fs::write(target.dir().join("Roboto-Regular.ttf"), b"regular-v1").expect("seed");

        let index = index();
        let fetcher = roboto_fetcher();
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("GOOGLE.ROBOTO").expect("plan");

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target,
            &CancellationFlag::new(),
            &NullProgress,
            0,
        ))
        .expect("execute");

        assert_eq!((result.installed, result.skipped), (2, 0));
        assert_eq!(
            fs::read(target.dir().join("Roboto-Regular.ttf")).expect("read"),
            b"regular-v2"
        );
        assert!(staged_files(target.dir()).is_empty());
    }

    fn staged_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .expect("read font dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".part"))
            .collect()
    }

    #[test]
    fn failed_write_leaves_no_staged_file() {
        let tmp = TempDir::new().expect("tempdir");
        let target = target(&tmp, true);
        // A directory in the way makes the final rename fail.
        fs::create_dir_all(target.dir().join("Roboto-Regular.ttf")).expect("blocking dir");

        let index = index();
        let fetcher = roboto_fetcher();
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("google.roboto").expect("plan");

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target,
            &CancellationFlag::new(),
            &NullProgress,
            0,
        ))
        .expect("execute");

        assert_eq!((result.installed, result.failed), (1, 1));
        assert!(result.errors[0].starts_with("Roboto-Regular.ttf:"));
        assert!(target.dir().join("Roboto-Regular.ttf").is_dir());
        assert!(staged_files(target.dir()).is_empty());
    }

    #[test]
    fn one_failed_variant_does_not_stop_the_rest() {
        let tmp = TempDir::new().expect("tempdir");
        let target = target(&tmp, false);
        let index = index();
        let fetcher = MemoryFetcher::new()
            .with_error("https://cdn.test/Roboto-Regular.ttf", FetchError::HttpStatus(500))
            .with_response("https://cdn.test/Roboto-Bold.ttf", b"bold".to_vec());
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("google.roboto").expect("plan");

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target,
            &CancellationFlag::new(),
            &NullProgress,
            0,
        ))
        .expect("execute");

        assert_eq!((result.installed, result.failed), (1, 1));
        assert!(result.errors[0].contains("HTTP status 500"));
        assert!(!result.report().is_overall_failure());
    }

    #[test]
    fn zip_archives_install_their_font_members() {
        let tmp = TempDir::new().expect("tempdir");
        let target = target(&tmp, false);
        let index = index();
        let archive = zip_bytes(&[
            ("FiraCode/ttf/FiraCode-Regular.ttf", b"regular"),
            ("FiraCode/ttf/FiraCode-Bold.ttf", b"bold"),
            ("FiraCode/README.txt", b"readme"),
            ("__MACOSX/._FiraCode-Regular.ttf", b"fork"),
        ]);
        let fetcher = MemoryFetcher::new().with_response("https://cdn.test/FiraCode.zip", archive);
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("google.fira-code").expect("plan");

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target,
            &CancellationFlag::new(),
            &NullProgress,
            0,
        ))
        .expect("execute");

        assert_eq!(result.installed, 2);
        assert!(target.dir().join("FiraCode-Bold.ttf").exists());
        assert!(!target.dir().join("README.txt").exists());
    }

    #[test]
    fn tar_xz_variants_fail_cleanly() {
        let tmp = TempDir::new().expect("tempdir");
        let index = index();
        let fetcher = MemoryFetcher::new();
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("google.legacy").expect("plan");

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target(&tmp, false),
            &CancellationFlag::new(),
            &NullProgress,
            0,
        ))
        .expect("execute");
        assert_eq!(result.failed, 1);
        assert!(result.report().into_result().is_err());
    }

    #[test]
    fn cancellation_stops_between_variants() {
        let tmp = TempDir::new().expect("tempdir");
        let index = index();
        let fetcher = roboto_fetcher();
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("google.roboto").expect("plan");
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target(&tmp, false),
            &cancel,
            &NullProgress,
            0,
        ));
        assert!(matches!(result, Err(FontError::Cancelled)));
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn machine_target_requires_elevation() {
        let resolver = ScopeResolver::new(
            Some(PathBuf::from("/fonts/user")),
            Some(PathBuf::from("/fonts/machine")),
            false,
        );
        assert!(matches!(
            InstallTarget::for_scope(&resolver, InstallationScope::Machine, false),
            Err(FontError::ElevationRequired(InstallationScope::Machine))
        ));
    }

    #[test]
    fn plan_many_resolves_names_and_dedupes_ids() {
        let index = index();
        let fetcher = MemoryFetcher::new();
        let planner = InstallationPlanner::new(&index, &fetcher);
        let plan = planner.plan_many(&[
            "Roboto".to_string(),
            "google.roboto".to_string(),
            "fira code".to_string(),
            "nope".to_string(),
        ]);

        let ids: Vec<&str> = plan.groups.iter().map(|g| g.font_id.as_str()).collect();
        assert_eq!(ids, vec!["google.roboto", "google.fira-code"]);
        assert_eq!(plan.unresolved, vec!["nope".to_string()]);
        assert!(matches!(planner.plan("nope"), Err(FontError::FontNotFound(_))));
    }

    #[test]
    fn remove_deletes_matching_files_and_reports_missing_fonts() {
        let tmp = TempDir::new().expect("tempdir");
        let target = target(&tmp, false);
        fs::create_dir_all(target.dir()).expect("font dir");
        fs::write(target.dir().join("Roboto-Regular.ttf"), b"r").expect("seed");
        fs::write(target.dir().join("Roboto-Bold.ttf"), b"b").expect("seed");
        fs::write(target.dir().join("Lato-Regular.ttf"), b"l").expect("seed");

        let index = index();
        let fetcher = MemoryFetcher::new();
        let planner = InstallationPlanner::new(&index, &fetcher);

        let removed = planner
            .remove("google.roboto", &target, &CancellationFlag::new())
            .expect("remove");
        assert_eq!(removed.report.succeeded, 2);
        assert!(target.dir().join("Lato-Regular.ttf").exists());

        let missing = planner
            .remove("Roboto", &target, &CancellationFlag::new())
            .expect("remove again");
        assert_eq!(missing.report.skipped, 1);
        assert!(missing.notes[0].contains("not installed"));

        let protected = planner
            .remove("Segoe UI", &target, &CancellationFlag::new())
            .expect("protected");
        assert_eq!(protected.report.skipped, 1);
    }

    #[test]
    fn unsafe_file_names_are_rejected() {
        assert!(destination(Path::new("/fonts"), "../evil.ttf").is_err());
        assert!(destination(Path::new("/fonts"), "..").is_err());
        assert!(destination(Path::new("/fonts"), "Good.ttf").is_ok());
    }
}
