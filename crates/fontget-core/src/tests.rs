//! Cross-module tests for fontget-core

#[cfg(test)]
mod integration_tests {
    use crate::catalog::{CatalogIndex, LoadOptions, SourceCache};
    use crate::export::{read_export, write_export, ExportFilters, ExportReconciler};
    use crate::fetch::MemoryFetcher;
    use crate::import::{reconcile, ImportWarning};
    use crate::manifest::Manifest;
    use crate::matcher::{FontMatcher, InstalledFontMatch};
    use crate::planner::{InstallTarget, InstallationPlanner};
    use crate::progress::{CancellationFlag, NullProgress};
    use crate::protection::is_critical_system_font;
    use crate::scanner::{group_by_family, InstalledFontScanner, ParsedFont};
    use crate::scope::ScopeResolver;
    use crate::{FontError, InstallationScope};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    const CUSTOM_URL: &str = "https://fonts.example.test/studio.json";

    fn installed(family: &str, style: &str, file: &str) -> ParsedFont {
        ParsedFont {
            name: file.to_string(),
            path: PathBuf::from("/fonts").join(file),
            family: family.to_string(),
            style: style.to_string(),
            font_type: "TTF".to_string(),
            scope: InstallationScope::User,
            modified: None,
        }
    }

    fn fira_match(family: &str) -> InstalledFontMatch {
        InstalledFontMatch {
            family_name: family.to_string(),
            font_id: "nerdfonts.fira-code".to_string(),
            name: "Fira Code".to_string(),
            source: "Nerd Fonts".to_string(),
            license: "OFL".to_string(),
            categories: vec!["Monospace".to_string()],
        }
    }

    /// Google Fonts at priority 10 plus a custom source at 150, both publishing google.roboto
    fn competing_sources() -> (Manifest, MemoryFetcher) {
        let mut manifest = Manifest::with_builtin_sources(Utc::now());
        for name in ["Nerd Fonts", "Font Squirrel"] {
            manifest.set_enabled(name, false).expect("disable builtin");
        }
        manifest
            .sources
            .get_mut("Google Fonts")
            .expect("google source")
            .priority = 10;
        manifest
            .add_custom_source("Studio", CUSTOM_URL, "studio")
            .expect("custom source");
        manifest.sources.get_mut("Studio").expect("studio").priority = 150;

        let google_url = manifest.sources["Google Fonts"].url.clone();
        let fetcher = MemoryFetcher::new()
            .with_response(
                google_url,
                json!({"fonts": {"google.roboto": {"name": "Roboto", "license": "OFL",
                    "variants": [{"name": "Regular", "files": {"ttf": "https://cdn.test/Roboto-Regular.ttf"}}]}}})
                .to_string(),
            )
            .with_response(
                CUSTOM_URL,
                json!({"fonts": {
                    "google.roboto": {"name": "Roboto (Studio build)", "license": "Proprietary"},
                    "widget": {"name": "Widget"}
                }})
                .to_string(),
            );
        (manifest, fetcher)
    }

    #[test]
    fn lower_priority_value_wins_shared_font_ids() {
        let tmp = TempDir::new().expect("tempdir");
        let (manifest, fetcher) = competing_sources();
        let cache = SourceCache::new(tmp.path().join("sources"));

        // Custom source listed first: the outcome must not depend on input order.
        let mut sources = manifest.enabled_sources();
        sources.reverse();

        let index = tokio_test::block_on(CatalogIndex::load(
            &sources,
            &cache,
            &fetcher,
            &LoadOptions::new(Duration::from_secs(5)),
            &CancellationFlag::new(),
        ))
        .expect("load");

        let roboto = index.lookup("google.roboto").expect("roboto");
        assert_eq!(roboto.source, "Google Fonts");
        assert_eq!(roboto.license, "OFL");
        assert_eq!(index.lookup("studio.widget").expect("widget").source, "Studio");
        assert!(index.unavailable().is_empty());
    }

    #[test]
    fn families_sharing_a_font_id_export_as_one_entry() {
        let fonts = vec![
            installed("Fira Code", "Regular", "FiraCode-Regular.ttf"),
            installed("Fira Code", "Bold", "FiraCode-Bold.ttf"),
            installed("FiraCode Nerd Font", "Regular", "FiraCodeNerdFont-Regular.ttf"),
        ];
        let families = group_by_family(&fonts);
        let matches = BTreeMap::from([
            ("Fira Code".to_string(), fira_match("Fira Code")),
            ("FiraCode Nerd Font".to_string(), fira_match("FiraCode Nerd Font")),
        ]);

        let result = ExportReconciler::build(
            &matches,
            &families,
            &ExportFilters::default(),
            is_critical_system_font,
        )
        .expect("export");

        let exported = &result.manifest.fonts;
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].font_id, "nerdfonts.fira-code");
        assert_eq!(
            exported[0].family_names,
            vec!["Fira Code".to_string(), "FiraCode Nerd Font".to_string()]
        );
        assert_eq!(exported[0].variants, vec!["Bold".to_string(), "Regular".to_string()]);
    }

    #[test]
    fn grouping_survives_an_export_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let fonts = vec![
            installed("FiraCode Nerd Font", "Regular", "FiraCodeNerdFont-Regular.ttf"),
            installed("Fira Code", "Regular", "FiraCode-Regular.ttf"),
            installed("Roboto", "Italic", "Roboto-Italic.ttf"),
        ];
        let mut matches = BTreeMap::from([
            ("Fira Code".to_string(), fira_match("Fira Code")),
            ("FiraCode Nerd Font".to_string(), fira_match("FiraCode Nerd Font")),
        ]);
        matches.insert(
            "Roboto".to_string(),
            InstalledFontMatch {
                family_name: "Roboto".to_string(),
                font_id: "google.roboto".to_string(),
                name: "Roboto".to_string(),
                source: "Google Fonts".to_string(),
                license: "OFL".to_string(),
                categories: Vec::new(),
            },
        );

        let grouping = |families: &BTreeMap<String, Vec<ParsedFont>>,
                        matches: &BTreeMap<String, InstalledFontMatch>| {
            ExportReconciler::build(matches, families, &ExportFilters::default(), |_| false)
                .expect("export")
                .manifest
                .fonts
                .into_iter()
                .map(|font| (font.font_id, font.family_names.into_iter().collect::<BTreeSet<_>>()))
                .collect::<BTreeMap<_, _>>()
        };

        let first = ExportReconciler::build(
            &matches,
            &group_by_family(&fonts),
            &ExportFilters::default(),
            |_| false,
        )
        .expect("export");
        let path = tmp.path().join("export.json");
        write_export(&path, &first.manifest).expect("write");
        let imported = read_export(&path).expect("read");

        // Rebuild installed state from what the import describes.
        let mut round_tripped = Vec::new();
        let mut round_matches = BTreeMap::new();
        for font in &imported.fonts {
            for family in &font.family_names {
                for style in &font.variants {
                    round_tripped.push(installed(family, style, &format!("{family}-{style}.ttf")));
                }
                let original = &matches[family];
                round_matches.insert(family.clone(), original.clone());
            }
        }

        assert_eq!(
            grouping(&group_by_family(&fonts), &matches),
            grouping(&group_by_family(&round_tripped), &round_matches)
        );
    }

    #[test]
    fn disabled_source_fonts_are_warned_not_reported_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let (mut manifest, fetcher) = competing_sources();
        manifest.set_enabled("Studio", false).expect("disable studio");

        let index = tokio_test::block_on(CatalogIndex::load(
            &manifest.enabled_sources(),
            &SourceCache::new(tmp.path().join("sources")),
            &fetcher,
            &LoadOptions::new(Duration::from_secs(5)),
            &CancellationFlag::new(),
        ))
        .expect("load");
        assert!(index.lookup("studio.widget").is_none());

        let export = crate::export::parse_export(
            &json!({
                "version": "1.0",
                "exported_at": "2025-03-01T12:00:00Z",
                "fonts": [
                    {"font_id": "studio.widget", "family_name": "Widget", "source": "Studio"},
                    {"font_id": "google.roboto", "family_names": ["Roboto"], "source": "Google Fonts"}
                ]
            })
            .to_string(),
        )
        .expect("parse");

        let plan = reconcile(&export, &index, &manifest).expect("reconcile");
        assert_eq!(plan.to_install.len(), 1);
        assert!(plan.not_found.is_empty());
        assert!(matches!(
            plan.warnings().as_slice(),
            [ImportWarning::DisabledSource { source, fonts }]
                if source == "Studio" && fonts == &vec!["Widget".to_string()]
        ));
    }

    #[test]
    fn scanning_both_scopes_keeps_one_copy_per_filename() {
        let tmp = TempDir::new().expect("tempdir");
        let user = tmp.path().join("user");
        let machine = tmp.path().join("machine");
        fs::create_dir_all(user.join("nested")).expect("user dir");
        fs::create_dir_all(&machine).expect("machine dir");

        fs::write(user.join("nested").join("Lato-Regular.ttf"), b"stub").expect("write");
        fs::write(machine.join("lato-regular.TTF"), b"stub").expect("write");
        fs::write(machine.join("Inter-Bold.otf"), b"stub").expect("write");
        fs::write(machine.join("readme.txt"), b"not a font").expect("write");

        let resolver = ScopeResolver::new(Some(user), Some(machine), true);
        let report = InstalledFontScanner::new(&resolver)
            .scan(&[InstallationScope::Machine, InstallationScope::User]);

        assert!(report.warnings.is_empty());
        let names: Vec<_> = report.fonts.iter().map(|f| f.name.to_lowercase()).collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names.iter().collect::<BTreeSet<_>>().len(), names.len());

        let lato = report
            .fonts
            .iter()
            .find(|f| f.family == "Lato")
            .expect("lato");
        assert_eq!(lato.scope, InstallationScope::User);
    }

    #[test]
    fn conflicting_filters_fail_before_any_work() {
        let filters = ExportFilters::default()
            .with_match("fira")
            .with_source("google");

        // Empty inputs: the error can only come from filter validation.
        let result = ExportReconciler::build(&BTreeMap::new(), &BTreeMap::new(), &filters, |_| false);
        assert!(matches!(
            result,
            Err(FontError::MutuallyExclusive("--match", "--source"))
        ));
    }

    #[test]
    fn system_fonts_never_reach_an_export() {
        let fonts = vec![
            installed("Arial", "Regular", "arial.ttf"),
            installed("Segoe UI", "Regular", "segoeui.ttf"),
            installed("Fira Code", "Regular", "FiraCode-Regular.ttf"),
            installed("Homemade", "Regular", "Homemade.otf"),
        ];
        let families = group_by_family(&fonts);
        let mut matches = BTreeMap::from([("Fira Code".to_string(), fira_match("Fira Code"))]);
        matches.insert(
            "Arial".to_string(),
            InstalledFontMatch {
                family_name: "Arial".to_string(),
                font_id: "google.arial".to_string(),
                name: "Arial".to_string(),
                source: "Google Fonts".to_string(),
                license: String::new(),
                categories: Vec::new(),
            },
        );

        let combos = [
            ExportFilters::default(),
            ExportFilters::default().with_all(true),
            ExportFilters::default().with_only_matched(true),
            ExportFilters::default().with_all(true).with_match("a"),
            ExportFilters::default().with_source("google"),
            ExportFilters::default().with_all(true).with_source("o"),
        ];

        for filters in combos {
            let result = ExportReconciler::build(&matches, &families, &filters, is_critical_system_font)
                .expect("export");
            for font in &result.manifest.fonts {
                assert!(
                    font.family_names.iter().all(|name| !is_critical_system_font(name)),
                    "{filters:?} exported {:?}",
                    font.family_names
                );
            }
        }
    }

    #[test]
    fn install_then_match_then_remove() {
        let tmp = TempDir::new().expect("tempdir");
        let (manifest, fetcher) = competing_sources();
        let fetcher = fetcher.with_response("https://cdn.test/Roboto-Regular.ttf", b"roboto".to_vec());

        let index = tokio_test::block_on(CatalogIndex::load(
            &manifest.enabled_sources(),
            &SourceCache::new(tmp.path().join("sources")),
            &fetcher,
            &LoadOptions::new(Duration::from_secs(5)),
            &CancellationFlag::new(),
        ))
        .expect("load");

        let resolver = ScopeResolver::new(Some(tmp.path().join("fonts")), None, false);
        let target =
            InstallTarget::for_scope(&resolver, InstallationScope::User, false).expect("target");
        let planner = InstallationPlanner::new(&index, &fetcher);
        let group = planner.plan("GOOGLE.ROBOTO").expect("plan");

        let result = tokio_test::block_on(planner.execute(
            &group,
            &target,
            &CancellationFlag::new(),
            &NullProgress,
            0,
        ))
        .expect("install");
        assert_eq!(result.installed, 1);

        let scanned = InstalledFontScanner::new(&resolver).scan(&resolver.scopes());
        let families: Vec<String> = group_by_family(&scanned.fonts).into_keys().collect();
        let matches = FontMatcher::new(&index)
            .match_all(&families, is_critical_system_font)
            .expect("match");
        assert_eq!(matches["Roboto"].font_id, "google.roboto");

        let removal = planner
            .remove("google.roboto", &target, &CancellationFlag::new())
            .expect("remove");
        assert_eq!(removal.removed.len(), 1);
        assert!(!tmp.path().join("fonts").join("Roboto-Regular.ttf").exists());
    }
}
