// 🗂️ Catalog build - crawl every source, freeze, project into one search snapshot
//
// Crawlers run in parallel (one independent index each); merging and projection
// happen sequentially afterwards. A rebuild yields a new Catalog, the old
// snapshot stays valid for whoever still holds it.

use crate::config::CatalogConfig;
use crate::crawler::{get_configured_crawler, CrawlReport, Crawler, SourceType};
use crate::error::Result;
use crate::names::{AliasTable, NameIndexBuilder};
use crate::search::{project_entries, Entry, SearchEngine};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: SourceType,
    pub records: usize,
    pub diagnostics: usize,
}

/// Immutable, cheaply clonable search snapshot
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    engine: Arc<SearchEngine>,
}

impl Catalog {
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Catalog {
            engine: Arc::new(SearchEngine::new(entries)),
        }
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Shared handle for other threads
    pub fn shared_engine(&self) -> Arc<SearchEngine> {
        Arc::clone(&self.engine)
    }

    pub fn entry_count(&self) -> usize {
        self.engine.len()
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub catalog: Catalog,
    /// Name-index records per source, in crawl order
    pub crawls: Vec<CrawlReport>,
    pub sources: Vec<SourceSummary>,
    /// Distinct devices across all sources
    pub device_count: usize,
    pub diagnostics: Vec<String>,
}

/// Load the configured alias table, if any
pub fn load_aliases(config: &CatalogConfig) -> Result<Option<Arc<AliasTable>>> {
    match &config.alias_file {
        Some(path) => {
            let table = AliasTable::from_file(path)?;
            info!("Loaded {} aliases from {}", table.len(), path.display());
            Ok(Some(Arc::new(table)))
        }
        None => Ok(None),
    }
}

/// Crawlers for every enabled source in the config
pub fn configured_crawlers(
    config: &CatalogConfig,
    aliases: Option<Arc<AliasTable>>,
) -> Vec<Box<dyn Crawler>> {
    config
        .enabled_sources()
        .map(|s| {
            get_configured_crawler(
                s.source,
                &s.root,
                aliases.clone(),
                &config.rtings_methodology,
            )
        })
        .collect()
}

/// Run crawlers on the rayon pool; output order matches input order
pub fn crawl_sources(crawlers: &[Box<dyn Crawler>]) -> Vec<CrawlReport> {
    crawlers
        .par_iter()
        .map(|crawler| crawler.read_name_index())
        .collect()
}

/// Sequentially fold crawl reports into one catalog
pub fn assemble(crawls: Vec<CrawlReport>) -> BuildReport {
    let mut entries = Vec::new();
    let mut sources = Vec::new();
    let mut diagnostics = Vec::new();
    let mut devices = NameIndexBuilder::new();

    for report in &crawls {
        entries.extend(project_entries(&report.index, report.source.name()));
        devices.extend(&report.index);
        diagnostics.extend(report.diagnostics.iter().cloned());
        sources.push(SourceSummary {
            source: report.source,
            records: report.index.size(),
            diagnostics: report.diagnostics.len(),
        });
    }

    let catalog = Catalog::from_entries(entries);
    info!(
        "Catalog built: {} entries, {} devices, {} diagnostics",
        catalog.entry_count(),
        devices.len(),
        diagnostics.len()
    );

    BuildReport {
        catalog,
        device_count: devices.len(),
        crawls,
        sources,
        diagnostics,
    }
}

/// Full build from config: aliases → crawl → assemble
pub fn build_catalog(config: &CatalogConfig) -> Result<BuildReport> {
    let aliases = load_aliases(config)?;
    let crawlers = configured_crawlers(config, aliases);
    Ok(assemble(crawl_sources(&crawlers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::crawler::{RIG_BK_5128, RIG_GRAS_43AG_7};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_measurement(root: &Path, form: &str, name: &str) {
        let dir = root.join("data").join(form);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.csv", name)), "frequency,raw\n20,0\n").unwrap();
    }

    fn sample_config(dir: &Path) -> CatalogConfig {
        let oratory = dir.join("oratory1990");
        let rtings = dir.join("rtings");
        write_measurement(&oratory, "over-ear", "Sennheiser HD 600");
        write_measurement(&oratory, "in-ear", "Etymotic ER4SR");
        write_measurement(&rtings, "over-ear", "sennheiser hd 600");
        write_measurement(&rtings, "over-ear", "Sony WH-1000XM4");

        CatalogConfig {
            rtings_methodology: "1.8".to_string(),
            sources: vec![
                SourceConfig {
                    source: SourceType::Oratory1990,
                    root: oratory,
                    enabled: true,
                },
                SourceConfig {
                    source: SourceType::Rtings,
                    root: rtings,
                    enabled: true,
                },
                SourceConfig {
                    source: SourceType::Innerfidelity,
                    root: dir.join("not-bundled"),
                    enabled: true,
                },
                SourceConfig {
                    source: SourceType::Crinacle,
                    root: dir.join("crinacle"),
                    enabled: false,
                },
            ],
            ..CatalogConfig::default()
        }
    }

    #[test]
    fn test_build_catalog_across_sources() {
        let dir = TempDir::new().unwrap();
        let config = sample_config(dir.path());

        let report = build_catalog(&config).unwrap();

        // Entries are per (device, source); devices are merged across sources
        assert_eq!(report.catalog.entry_count(), 4);
        assert_eq!(report.device_count, 3);

        let engine = report.catalog.engine();
        assert_eq!(engine.get_all_sources(), vec!["Rtings", "oratory1990"]);

        let hits = engine.search("sennheiser hd 600", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rig, RIG_GRAS_43AG_7);
        assert_eq!(hits[1].rig, RIG_BK_5128);
    }

    #[test]
    fn test_missing_source_degrades_silently() {
        let dir = TempDir::new().unwrap();
        let config = sample_config(dir.path());

        let report = build_catalog(&config).unwrap();

        assert_eq!(report.sources.len(), 3, "disabled source is not crawled");
        let innerfidelity = report
            .sources
            .iter()
            .find(|s| s.source == SourceType::Innerfidelity)
            .unwrap();
        assert_eq!(innerfidelity.records, 0);
        assert_eq!(innerfidelity.diagnostics, 1);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.catalog.engine().filter_by_source("Innerfidelity").is_empty());
    }

    #[test]
    fn test_rebuild_does_not_touch_live_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = sample_config(dir.path());

        let first = build_catalog(&config).unwrap().catalog;
        let live = first.shared_engine();

        write_measurement(&dir.path().join("oratory1990"), "over-ear", "HD 800 S");
        let second = build_catalog(&config).unwrap().catalog;

        assert_eq!(live.len(), 4);
        assert_eq!(second.entry_count(), 5);
    }

    #[test]
    fn test_missing_alias_file_is_error() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig {
            alias_file: Some(dir.path().join("aliases.json")),
            ..CatalogConfig::default()
        };

        assert!(build_catalog(&config).is_err());
    }
}
