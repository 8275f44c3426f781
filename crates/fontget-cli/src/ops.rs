use clap::CommandFactory;
use clap_complete::{generate, Shell};
use fontget_core::backup::{
    default_backup_filename, organize_by_source_and_family, remove_stale_temp_files,
    write_backup_archive,
};
use fontget_core::catalog::{update_sources, CatalogIndex, LoadOptions, SourceCache};
use fontget_core::config::FontgetConfig;
use fontget_core::export::{default_export_filename, read_export, write_export, ExportFilters, ExportReconciler};
use fontget_core::fetch::{HttpFetcher, OfflineFetcher, SourceFetcher};
use fontget_core::import::{reconcile, validate_import};
use fontget_core::manifest::{load_manifest, save_manifest, Manifest};
use fontget_core::matcher::{FontMatcher, InstalledFontMatch};
use fontget_core::planner::{InstallTarget, InstallationPlanner};
use fontget_core::progress::{BatchReport, CancellationFlag, LogProgress, ProgressSink, ProgressUpdate};
use fontget_core::protection::is_critical_system_font;
use fontget_core::scanner::{exclude_system_fonts, group_by_family, InstalledFontScanner, ParsedFont};
use fontget_core::scope::ScopeResolver;
use fontget_core::{FontError, FontResult, InstallationScope};
use serde::Serialize;
use serde_json::{json, to_string_pretty};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::args::{Cli, ScopeArg};

/// Output controls for CLI commands
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub quiet: bool,
    pub verbose: bool,
}

impl OutputOptions {
    pub fn should_print(&self) -> bool {
        !self.quiet
    }

    pub fn should_print_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }
}

/// Execution controls shared by every command
#[derive(Debug, Clone, Copy)]
pub struct OperationOptions {
    pub dry_run: bool,
    pub json: bool,
    /// Re-fetch catalogs even when the cache is fresh
    pub refresh: bool,
    pub output: OutputOptions,
}

impl OperationOptions {
    pub fn new(dry_run: bool, quiet: bool, verbose: bool) -> Self {
        Self {
            dry_run,
            json: false,
            refresh: false,
            output: OutputOptions { quiet, verbose },
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

pub(crate) fn log_status(opts: &OperationOptions, message: &str) {
    if opts.output.should_print() && !opts.json {
        println!("{}", message);
    }
}

pub(crate) fn log_verbose(opts: &OperationOptions, message: &str) {
    if opts.output.should_print_verbose() {
        eprintln!("{}", message);
    }
}

pub(crate) fn log_warning(opts: &OperationOptions, message: &str) {
    log::warn!("{}", message);
    if opts.output.should_print() {
        eprintln!("⚠️  {}", message);
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), FontError> {
    let json = to_string_pretty(value)
        .map_err(|e| FontError::InvalidFormat(format!("Failed to serialize output to JSON: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Renders engine progress as verbose status lines
struct ConsoleProgress {
    opts: OperationOptions,
}

impl ProgressSink for ConsoleProgress {
    fn update(&self, update: ProgressUpdate) {
        LogProgress.update(update.clone());
        let line = match update.percent {
            Some(percent) => format!("[{:>3.0}%] {}", percent, update.message),
            None => update.message,
        };
        log_verbose(&self.opts, &line);
    }
}

/// Everything a command needs besides its own arguments
pub struct AppContext {
    pub config: FontgetConfig,
    pub resolver: ScopeResolver,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub cancel: CancellationFlag,
}

impl AppContext {
    pub fn new(config: FontgetConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            resolver: ScopeResolver::from_config(&config),
            config,
            fetcher,
            cancel: CancellationFlag::new(),
        }
    }

    /// Build from FONTGET_* environment variables
    pub fn from_env() -> Result<Self, FontError> {
        let config = FontgetConfig::from_env()
            .map_err(|e| FontError::Configuration {
                field: "environment".to_string(),
                message: e.to_string(),
            })?
            .checked()?;

        let fetcher: Arc<dyn SourceFetcher> = if config.network.offline {
            Arc::new(OfflineFetcher)
        } else {
            Arc::new(HttpFetcher::new()?)
        };
        Ok(Self::new(config, fetcher))
    }

    pub fn with_cancel(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn cache(&self) -> SourceCache {
        SourceCache::new(self.config.sources_dir())
    }

    /// Load the source manifest; a dry run never creates it on disk
    pub fn manifest(&self, opts: &OperationOptions) -> FontResult<Manifest> {
        let path = self.config.manifest_path();
        if opts.dry_run && !path.exists() {
            return Ok(Manifest::with_builtin_sources(chrono::Utc::now()));
        }
        load_manifest(&path)
    }

    fn save_manifest(&self, manifest: &Manifest) -> FontResult<()> {
        save_manifest(&self.config.manifest_path(), manifest)
    }

    /// Merged catalog of every enabled source; fails only when none loaded
    pub async fn load_catalog(&self, manifest: &Manifest, opts: &OperationOptions) -> FontResult<CatalogIndex> {
        let options = LoadOptions::new(self.config.request_timeout())
            .with_offline(self.config.network.offline)
            .with_refresh(opts.refresh)
            .with_max_age_days(manifest.cache_policy.auto_update_days);

        let index = CatalogIndex::load(
            &manifest.enabled_sources(),
            &self.cache(),
            self.fetcher.as_ref(),
            &options,
            &self.cancel,
        )
        .await?;

        for source in index.unavailable() {
            log_warning(opts, &format!("Source '{}' unavailable: {}", source.name, source.reason));
        }
        log_verbose(opts, &format!("Catalog: {} fonts from {} sources", index.len(), index.sources().len()));
        Ok(index)
    }

    /// Catalog for commands that still work without one
    async fn load_catalog_best_effort(&self, manifest: &Manifest, opts: &OperationOptions) -> FontResult<CatalogIndex> {
        match self.load_catalog(manifest, opts).await {
            Ok(index) => Ok(index),
            Err(FontError::Cancelled) => Err(FontError::Cancelled),
            Err(e) => {
                log_warning(opts, &format!("Continuing without catalog data: {}", e));
                Ok(CatalogIndex::default())
            }
        }
    }

    /// Explicit scope, or every scope this process can read
    fn scan_scopes(&self, scope: Option<ScopeArg>) -> Vec<InstallationScope> {
        match scope {
            Some(scope) => vec![scope.into()],
            None => self.resolver.scopes(),
        }
    }

    fn scan_installed(&self, scope: Option<ScopeArg>, opts: &OperationOptions) -> Vec<ParsedFont> {
        let report = InstalledFontScanner::new(&self.resolver).scan(&self.scan_scopes(scope));
        for warning in &report.warnings {
            log_warning(opts, &warning.to_string());
        }
        log_verbose(opts, &format!("Found {} installed font files", report.fonts.len()));
        report.fonts
    }
}

fn match_families(
    index: &CatalogIndex,
    families: &BTreeMap<String, Vec<ParsedFont>>,
) -> FontResult<BTreeMap<String, InstalledFontMatch>> {
    if !index.is_loaded() {
        return Ok(BTreeMap::new());
    }
    let names: Vec<String> = families.keys().cloned().collect();
    FontMatcher::new(index).match_all(&names, is_critical_system_font)
}

/// Print the `{success, skipped, failed}` summary of a batch
pub fn print_status_report(report: &BatchReport, opts: &OperationOptions) -> Result<(), FontError> {
    if opts.json {
        return print_json(report);
    }

    log_status(
        opts,
        &format!(
            "Status: {} succeeded, {} skipped, {} failed",
            report.succeeded, report.skipped, report.failed
        ),
    );
    for detail in &report.details {
        if opts.output.should_print() {
            eprintln!("  ❌ {}", detail);
        }
    }
    Ok(())
}

/// One installed family as shown by `list`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListRow {
    pub family: String,
    pub styles: Vec<String>,
    pub scope: InstallationScope,
    pub files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Possible render outputs for list command
#[derive(Debug, PartialEq)]
pub enum ListRender {
    Lines(Vec<String>),
    Json(String),
}

/// Rows for every family, optionally narrowed by a case-insensitive substring
pub fn build_list_rows(
    families: &BTreeMap<String, Vec<ParsedFont>>,
    matches: &BTreeMap<String, InstalledFontMatch>,
    family_filter: Option<&str>,
) -> Vec<ListRow> {
    let filter = family_filter
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty());

    families
        .iter()
        .filter(|(family, _)| {
            filter
                .as_ref()
                .map_or(true, |needle| family.to_lowercase().contains(needle))
        })
        .filter_map(|(family, fonts)| {
            let first = fonts.first()?;
            let styles: BTreeSet<String> = fonts.iter().map(|font| font.style.clone()).collect();
            let matched = matches.get(family);
            Some(ListRow {
                family: family.clone(),
                styles: styles.into_iter().collect(),
                scope: first.scope,
                files: fonts.iter().map(|font| font.path.clone()).collect(),
                font_id: matched.map(|m| m.font_id.clone()),
                source: matched.map(|m| m.source.clone()),
            })
        })
        .collect()
}

/// Prepare list output; rows arrive sorted by family
pub fn render_list_output(rows: &[ListRow], json: bool) -> Result<ListRender, FontError> {
    if json {
        let json = to_string_pretty(rows).map_err(|e| {
            FontError::InvalidFormat(format!("Failed to serialize font list to JSON: {}", e))
        })?;
        return Ok(ListRender::Json(json));
    }

    let lines = rows
        .iter()
        .map(|row| {
            let mut line = format!("{} ({}) [{}]", row.family, row.styles.join(", "), row.scope);
            if let (Some(id), Some(source)) = (&row.font_id, &row.source) {
                line.push_str(&format!(" -> {} ({})", id, source));
            }
            line
        })
        .collect();
    Ok(ListRender::Lines(lines))
}

/// Generate shell completion script for the given shell
pub fn write_completions<W: Write>(shell: Shell, mut writer: W) -> Result<(), FontError> {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();

    generate(shell, &mut command, bin_name.as_str(), &mut writer);

    Ok(())
}

fn target_scope(scope: Option<ScopeArg>) -> InstallationScope {
    scope.map(Into::into).unwrap_or(InstallationScope::User)
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

/// Handle the add command
pub async fn handle_add_command(
    ctx: &AppContext,
    fonts: Vec<String>,
    scope: Option<ScopeArg>,
    force: bool,
    opts: OperationOptions,
) -> Result<(), FontError> {
    // Elevation is checked before anything is fetched or written.
    let target = InstallTarget::for_scope(&ctx.resolver, target_scope(scope), force)?;
    log_verbose(&opts, &format!("Scope: {}", target.scope().description()));

    let manifest = ctx.manifest(&opts)?;
    let index = ctx.load_catalog(&manifest, &opts).await?;
    let planner = InstallationPlanner::new(&index, ctx.fetcher.as_ref())
        .with_download_timeout(ctx.config.download_timeout());
    let plan = planner.plan_many(&fonts);

    let mut report = BatchReport::new();
    for request in &plan.unresolved {
        report.record_failure(format!("{}: not found in any enabled source", request));
    }

    if opts.dry_run {
        for group in &plan.groups {
            log_status(
                &opts,
                &format!(
                    "DRY-RUN: would install {} ({}, {} files) to {}",
                    group.display_name,
                    group.font_id,
                    group.files.len(),
                    target.dir().display()
                ),
            );
        }
        return print_status_report(&report, &opts);
    }

    let progress = ConsoleProgress { opts };
    for (index, group) in plan.groups.iter().enumerate() {
        log_status(&opts, &format!("Installing {} ({})", group.display_name, group.font_id));
        let result = planner.execute(group, &target, &ctx.cancel, &progress, index).await?;
        if result.failed == 0 {
            log_status(
                &opts,
                &format!(
                    "✅ {}: {} installed, {} skipped",
                    group.display_name, result.installed, result.skipped
                ),
            );
        }
        report.merge(&result.report());
    }

    print_status_report(&report, &opts)?;
    report.into_result().map(|_| ())
}

/// Handle the remove command
pub async fn handle_remove_command(
    ctx: &AppContext,
    fonts: Vec<String>,
    scope: Option<ScopeArg>,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let target = InstallTarget::for_scope(&ctx.resolver, target_scope(scope), false)?;

    if opts.dry_run {
        for request in &fonts {
            log_status(
                &opts,
                &format!("DRY-RUN: would remove {} from {} scope", request, target.scope()),
            );
        }
        return Ok(());
    }

    let manifest = ctx.manifest(&opts)?;
    let index = ctx.load_catalog_best_effort(&manifest, &opts).await?;
    let planner = InstallationPlanner::new(&index, ctx.fetcher.as_ref());

    let mut report = BatchReport::new();
    for request in &fonts {
        let result = planner.remove(request, &target, &ctx.cancel)?;
        for path in &result.removed {
            log_verbose(&opts, &format!("Removed {}", path.display()));
        }
        for note in &result.notes {
            log_status(&opts, &format!("⏭️  {}", note));
        }
        if !result.removed.is_empty() {
            log_status(
                &opts,
                &format!("✅ Removed {} ({} files)", result.request, result.removed.len()),
            );
        }
        report.merge(&result.report);
    }

    print_status_report(&report, &opts)?;
    report.into_result().map(|_| ())
}

/// Handle the list command
pub async fn handle_list_command(
    ctx: &AppContext,
    scope: Option<ScopeArg>,
    family: Option<String>,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let fonts = ctx.scan_installed(scope, &opts);
    let families = group_by_family(&fonts);

    let manifest = ctx.manifest(&opts)?;
    let index = ctx.load_catalog_best_effort(&manifest, &opts).await?;
    let matches = match_families(&index, &families)?;

    let rows = build_list_rows(&families, &matches, family.as_deref());
    match render_list_output(&rows, opts.json)? {
        ListRender::Lines(lines) => {
            for line in lines {
                println!("{}", line);
            }
            log_verbose(&opts, &format!("{} families, {} matched", rows.len(), matches.len()));
        }
        ListRender::Json(json) => {
            println!("{}", json);
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct SearchRow<'a> {
    font_id: &'a str,
    name: &'a str,
    source: &'a str,
    license: &'a str,
    categories: &'a [String],
    variants: usize,
}

/// Handle the search command
pub async fn handle_search_command(
    ctx: &AppContext,
    query: String,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let manifest = ctx.manifest(&opts)?;
    let index = ctx.load_catalog(&manifest, &opts).await?;
    let results = index.search(&query);

    if opts.json {
        let rows: Vec<SearchRow> = results
            .iter()
            .map(|entry| SearchRow {
                font_id: &entry.font_id,
                name: &entry.name,
                source: &entry.source,
                license: &entry.license,
                categories: &entry.categories,
                variants: entry.variants.len(),
            })
            .collect();
        return print_json(&rows);
    }

    if results.is_empty() {
        log_status(&opts, &format!("No fonts found matching '{}'", query.trim()));
        return Ok(());
    }

    for entry in &results {
        println!("{:<32} {:<28} [{}]", entry.font_id, entry.name, entry.source);
    }
    log_verbose(&opts, &format!("{} results", results.len()));
    Ok(())
}

/// Handle the info command
pub async fn handle_info_command(
    ctx: &AppContext,
    font_id: String,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let manifest = ctx.manifest(&opts)?;
    let index = ctx.load_catalog(&manifest, &opts).await?;
    let planner = InstallationPlanner::new(&index, ctx.fetcher.as_ref());
    let entry = planner.resolve_request(&font_id)?;

    if opts.json {
        return print_json(entry);
    }

    println!("{}", entry.name);
    println!("  ID:         {}", entry.font_id);
    println!("  Source:     {}", entry.source);
    if !entry.license.is_empty() {
        println!("  License:    {}", entry.license);
    }
    if !entry.categories.is_empty() {
        println!("  Categories: {}", entry.categories.join(", "));
    }
    println!("  Variants:   {}", entry.variants.len());
    for file in &entry.variants {
        println!("    {:<20} {}", file.variant, file.name);
    }
    Ok(())
}

/// Export filter flags as given on the command line
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    pub output: Option<PathBuf>,
    pub all: bool,
    pub matched: bool,
    pub match_filter: Option<String>,
    pub source_filter: Option<String>,
    pub scope: Option<ScopeArg>,
}

impl ExportArgs {
    pub fn filters(&self) -> ExportFilters {
        let mut filters = ExportFilters::default()
            .with_all(self.all)
            .with_only_matched(self.matched);
        if let Some(text) = &self.match_filter {
            filters = filters.with_match(text.clone());
        }
        if let Some(source) = &self.source_filter {
            filters = filters.with_source(source.clone());
        }
        filters
    }
}

/// Handle the export command
pub async fn handle_export_command(
    ctx: &AppContext,
    args: ExportArgs,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let filters = args.filters();
    filters.validate()?;

    let fonts = exclude_system_fonts(ctx.scan_installed(args.scope, &opts));
    let families = group_by_family(&fonts);

    let manifest = ctx.manifest(&opts)?;
    // Matched-only exports cannot produce anything without a catalog.
    let index = if filters.effective_only_matched() {
        ctx.load_catalog(&manifest, &opts).await?
    } else {
        ctx.load_catalog_best_effort(&manifest, &opts).await?
    };
    let matches = match_families(&index, &families)?;

    let result = ExportReconciler::build(&matches, &families, &filters, is_critical_system_font)?;
    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_export_filename(today())));
    let export = &result.manifest;

    log_verbose(
        &opts,
        &format!(
            "Skipped {} system, {} unmatched, {} filtered families",
            result.skipped_system, result.skipped_unmatched, result.skipped_by_filter
        ),
    );

    if opts.dry_run {
        log_status(
            &opts,
            &format!(
                "DRY-RUN: would export {} fonts ({} variants) to {}",
                export.metadata.total_fonts,
                export.metadata.total_variants,
                path.display()
            ),
        );
    } else {
        write_export(&path, export)?;
        log_status(
            &opts,
            &format!(
                "✅ Exported {} fonts ({} variants) to {}",
                export.metadata.total_fonts,
                export.metadata.total_variants,
                path.display()
            ),
        );
    }

    if opts.json {
        print_json(&json!({
            "path": path,
            "dry_run": opts.dry_run,
            "total_fonts": export.metadata.total_fonts,
            "total_variants": export.metadata.total_variants,
            "skipped_system": result.skipped_system,
            "skipped_unmatched": result.skipped_unmatched,
            "skipped_by_filter": result.skipped_by_filter,
        }))?;
    }
    Ok(())
}

/// Handle the import command
pub async fn handle_import_command(
    ctx: &AppContext,
    file: PathBuf,
    scope: Option<ScopeArg>,
    force: bool,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let export = read_export(&file)?;
    validate_import(&export)?;
    log_verbose(
        &opts,
        &format!("Import: {} fonts exported by '{}' at {}", export.fonts.len(), export.exported_by, export.exported_at),
    );

    let manifest = ctx.manifest(&opts)?;
    let index = ctx.load_catalog(&manifest, &opts).await?;
    let plan = reconcile(&export, &index, &manifest)?;

    for warning in plan.warnings() {
        log_warning(&opts, &format!("{}:", warning));
        if opts.output.should_print() {
            for font in warning.fonts() {
                eprintln!("    - {}", font);
            }
            eprintln!("    {}", warning.hint());
        }
    }
    for duplicate in &plan.duplicates {
        log_verbose(&opts, &format!("Duplicate Font ID skipped: {}", duplicate));
    }

    if plan.to_install.is_empty() {
        log_status(&opts, "No fonts to install");
        if opts.json {
            print_json(&plan)?;
        }
        return Ok(());
    }

    // Recorded scopes are ignored: --scope, else machine only when elevated.
    let install_scope = scope.map(Into::into).unwrap_or_else(|| ctx.resolver.auto_scope());
    let target = InstallTarget::for_scope(&ctx.resolver, install_scope, force)?;
    log_verbose(&opts, &format!("Scope: {}", target.scope().description()));

    let groups = plan.install_groups(&index);
    if opts.dry_run {
        for group in &groups {
            log_status(
                &opts,
                &format!(
                    "DRY-RUN: would install {} ({}) in {} scope",
                    group.display_name,
                    group.font_id,
                    target.scope()
                ),
            );
        }
        if opts.json {
            print_json(&plan)?;
        }
        return Ok(());
    }

    let planner = InstallationPlanner::new(&index, ctx.fetcher.as_ref())
        .with_download_timeout(ctx.config.download_timeout());
    let progress = ConsoleProgress { opts };
    let mut report = BatchReport::new();

    for (index, group) in groups.iter().enumerate() {
        log_status(&opts, &format!("Installing {} ({})", group.display_name, group.font_id));
        let result = planner.execute(group, &target, &ctx.cancel, &progress, index).await?;
        report.merge(&result.report());
    }

    print_status_report(&report, &opts)?;
    report.into_result().map(|_| ())
}

/// Handle the backup command
pub async fn handle_backup_command(
    ctx: &AppContext,
    output: Option<PathBuf>,
    scope: Option<ScopeArg>,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let fonts = exclude_system_fonts(ctx.scan_installed(scope, &opts));
    let families = group_by_family(&fonts);

    let manifest = ctx.manifest(&opts)?;
    let index = ctx.load_catalog_best_effort(&manifest, &opts).await?;
    let matches = match_families(&index, &families)?;

    let layout = organize_by_source_and_family(&families, &matches, is_critical_system_font);
    if layout.is_empty() {
        log_status(&opts, "No fonts to back up");
        return Ok(());
    }

    let path = output.unwrap_or_else(|| PathBuf::from(default_backup_filename(today())));
    let family_count: usize = layout.values().map(|families| families.len()).sum();
    let file_count: usize = layout.values().flat_map(|f| f.values()).map(Vec::len).sum();

    if opts.dry_run {
        log_status(
            &opts,
            &format!(
                "DRY-RUN: would back up {} files from {} families to {}",
                file_count,
                family_count,
                path.display()
            ),
        );
        return Ok(());
    }

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let stale = remove_stale_temp_files(dir);
    if stale > 0 {
        log_verbose(&opts, &format!("Removed {} stale temporary archives", stale));
    }

    let progress = ConsoleProgress { opts };
    let result = write_backup_archive(&layout, &path, &ctx.cancel, &progress)?;

    if opts.json {
        return print_json(&json!({
            "path": path,
            "families": result.family_count,
            "files": result.file_count,
            "skipped": result.skipped,
        }));
    }
    log_status(
        &opts,
        &format!(
            "✅ Backed up {} files from {} families to {}",
            result.file_count,
            result.family_count,
            path.display()
        ),
    );
    if result.skipped > 0 {
        log_warning(&opts, &format!("{} files could not be read", result.skipped));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SourceRow<'a> {
    name: &'a str,
    prefix: &'a str,
    priority: i32,
    enabled: bool,
    builtin: bool,
    url: &'a str,
    font_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_synced: Option<String>,
}

/// Handle `sources list`
pub async fn handle_sources_list_command(ctx: &AppContext, opts: OperationOptions) -> Result<(), FontError> {
    let manifest = ctx.manifest(&opts)?;
    let rows: Vec<SourceRow> = manifest
        .all_sources()
        .into_iter()
        .map(|source| SourceRow {
            name: &source.name,
            prefix: &source.prefix,
            priority: source.priority,
            enabled: source.enabled,
            builtin: source.is_builtin(),
            url: &source.url,
            font_count: source.font_count,
            last_synced: source.last_synced.map(|t| t.to_rfc3339()),
        })
        .collect();

    if opts.json {
        return print_json(&rows);
    }

    for row in &rows {
        println!(
            "{} {:<16} prefix={:<10} priority={:<4} fonts={:<6} {}",
            if row.enabled { "✅" } else { "⏸️ " },
            row.name,
            row.prefix,
            row.priority,
            row.font_count,
            if row.builtin { "built-in" } else { "custom" }
        );
        log_verbose(&opts, &format!("    {}", row.url));
    }
    Ok(())
}

/// Handle `sources update`
pub async fn handle_sources_update_command(ctx: &AppContext, opts: OperationOptions) -> Result<(), FontError> {
    let mut manifest = ctx.manifest(&opts)?;
    let enabled: Vec<String> = manifest
        .enabled_sources()
        .into_iter()
        .map(|s| s.name.clone())
        .collect();

    if opts.dry_run {
        for name in &enabled {
            log_status(&opts, &format!("DRY-RUN: would update source {}", name));
        }
        return Ok(());
    }

    let progress = ConsoleProgress { opts };
    let report = update_sources(
        &mut manifest,
        &ctx.cache(),
        ctx.fetcher.as_ref(),
        ctx.config.request_timeout(),
        &ctx.cancel,
        &progress,
    )
    .await?;
    ctx.save_manifest(&manifest)?;

    for name in &enabled {
        if let Some(source) = manifest.source(name).filter(|s| s.last_synced.is_some()) {
            log_verbose(&opts, &format!("{}: {} fonts", source.name, source.font_count));
        }
    }
    print_status_report(&report, &opts)?;
    report.into_result().map(|_| ())
}

/// Handle `sources enable` / `sources disable`
pub async fn handle_sources_toggle_command(
    ctx: &AppContext,
    name: String,
    enabled: bool,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let mut manifest = ctx.manifest(&opts)?;
    let was_enabled = manifest.set_enabled(&name, enabled)?;
    let verb = if enabled { "enabled" } else { "disabled" };

    if was_enabled == enabled {
        log_status(&opts, &format!("Source '{}' is already {}", name, verb));
        return Ok(());
    }
    if opts.dry_run {
        log_status(&opts, &format!("DRY-RUN: would mark source '{}' {}", name, verb));
        return Ok(());
    }

    ctx.save_manifest(&manifest)?;
    log_status(&opts, &format!("✅ Source '{}' {}", name, verb));
    Ok(())
}

/// Handle `sources add`
pub async fn handle_sources_add_command(
    ctx: &AppContext,
    name: String,
    url: String,
    prefix: String,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let mut manifest = ctx.manifest(&opts)?;
    let added = manifest.add_custom_source(&name, &url, &prefix)?.clone();

    if opts.dry_run {
        log_status(
            &opts,
            &format!("DRY-RUN: would add source '{}' (prefix {}, priority {})", added.name, added.prefix, added.priority),
        );
        return Ok(());
    }

    ctx.save_manifest(&manifest)?;
    log_status(
        &opts,
        &format!("✅ Added source '{}' (prefix {}, priority {})", added.name, added.prefix, added.priority),
    );
    log_status(&opts, "Run 'fontget sources update' to fetch its catalog");
    Ok(())
}

/// Handle `sources remove`
pub async fn handle_sources_remove_command(
    ctx: &AppContext,
    name: String,
    opts: OperationOptions,
) -> Result<(), FontError> {
    let mut manifest = ctx.manifest(&opts)?;
    let removed = manifest.remove_source(&name)?;

    if opts.dry_run {
        log_status(&opts, &format!("DRY-RUN: would remove source '{}'", removed.name));
        return Ok(());
    }

    ctx.save_manifest(&manifest)?;
    let cached = ctx.cache().path_for(&removed);
    if cached.exists() {
        if let Err(e) = std::fs::remove_file(&cached) {
            log_warning(&opts, &format!("Could not delete cached catalog {}: {}", cached.display(), e));
        }
    }
    log_status(&opts, &format!("✅ Removed source '{}'", removed.name));
    Ok(())
}
