// 🕷️ Crawler Framework
// One crawler per measurement source: walks data/<form>/<name>.csv and emits Name Records

use crate::names::{AliasTable, NameIndex, NameIndexBuilder, NameRecord};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceType - which measurement provider a dataset comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Innerfidelity,
    HeadphoneCom,
    Oratory1990,
    Crinacle,
    Rtings,
}

impl SourceType {
    /// Every known source, in facet order
    pub const ALL: [SourceType; 5] = [
        SourceType::Innerfidelity,
        SourceType::HeadphoneCom,
        SourceType::Oratory1990,
        SourceType::Crinacle,
        SourceType::Rtings,
    ];

    /// Human-readable name, also used as the Entry source label
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::Innerfidelity => "Innerfidelity",
            SourceType::HeadphoneCom => "Headphone.com",
            SourceType::Oratory1990 => "oratory1990",
            SourceType::Crinacle => "Crinacle",
            SourceType::Rtings => "Rtings",
        }
    }

    /// Short code for config files and directory names
    pub fn code(&self) -> &'static str {
        match self {
            SourceType::Innerfidelity => "innerfidelity",
            SourceType::HeadphoneCom => "headphonecom",
            SourceType::Oratory1990 => "oratory1990",
            SourceType::Crinacle => "crinacle",
            SourceType::Rtings => "rtings",
        }
    }

    /// Resolve a code or display name (case-insensitive)
    pub fn from_code(value: &str) -> Option<SourceType> {
        let value = value.trim();
        SourceType::ALL.into_iter().find(|s| {
            s.code().eq_ignore_ascii_case(value) || s.name().eq_ignore_ascii_case(value)
        })
    }
}

/// CrawlReport - output of read_name_index()
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub source: SourceType,
    pub index: NameIndex,
    /// Recoverable anomalies (missing dir, skipped files), in encounter order
    pub diagnostics: Vec<String>,
    /// False when the data directory was missing; the index then says nothing
    /// about which devices the source has
    pub data_found: bool,
}

/// A measurement file location split into its naming parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementFile {
    pub path: PathBuf,
    pub name: String,
    pub form: String,
}

impl MeasurementFile {
    /// Whether a path sits where a measurement lives (`<data_dir>/<form>/*.csv`)
    ///
    /// Says nothing about whether its names are usable.
    pub fn is_candidate(data_dir: &Path, path: &Path) -> bool {
        let depth_ok = path
            .strip_prefix(data_dir)
            .map(|relative| relative.components().count() == 2)
            .unwrap_or(false);

        depth_ok
            && path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(MEASUREMENT_EXTENSION))
                .unwrap_or(false)
    }

    /// Accept only `<data_dir>/<form>/<name>.csv` with UTF-8 form and name
    pub fn from_path(data_dir: &Path, path: &Path) -> Option<MeasurementFile> {
        if !MeasurementFile::is_candidate(data_dir, path) {
            return None;
        }

        let name = path.file_stem()?.to_str()?.to_string();
        let form = path.parent()?.file_name()?.to_str()?.to_string();

        Some(MeasurementFile {
            path: path.to_path_buf(),
            name,
            form,
        })
    }
}

pub const MEASUREMENT_EXTENSION: &str = "csv";

// ============================================================================
// COMPOSABLE TRAITS
// ============================================================================

/// Crawler - core capability, one implementation per source
pub trait Crawler: Send + Sync {
    /// Walk the source's data tree and build its Name Index
    ///
    /// Never fails: a missing data directory yields an empty index plus a
    /// diagnostic, and unreadable files are skipped.
    fn read_name_index(&self) -> CrawlReport;

    fn source_type(&self) -> SourceType;

    /// Crawler version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// RigResolver - how a source decides which rig produced a measurement
pub trait RigResolver {
    fn resolve_rig(&self, file: &MeasurementFile) -> String;
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect the source from a dataset directory name
///
/// # Examples:
/// ```ignore
/// detect_source("measurements/rtings") → SourceType::Rtings
/// detect_source("measurements/Headphone.com Legacy") → SourceType::HeadphoneCom
/// ```
pub fn detect_source(root: &Path) -> Result<SourceType> {
    let dirname = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let lower = dirname.to_lowercase().replace(['.', ' ', '_', '-'], "");

    for source in SourceType::ALL {
        if lower.contains(source.code()) {
            return Ok(source);
        }
    }

    Err(anyhow::anyhow!(
        "Could not detect measurement source from directory: {}",
        root.display()
    ))
}

/// Get the crawler for a source rooted at `root`
pub fn get_crawler(source: SourceType, root: &Path) -> Box<dyn Crawler> {
    match source {
        SourceType::Innerfidelity => Box::new(InnerfidelityCrawler::new(root)),
        SourceType::HeadphoneCom => Box::new(HeadphoneComCrawler::new(root)),
        SourceType::Oratory1990 => Box::new(Oratory1990Crawler::new(root)),
        SourceType::Crinacle => Box::new(CrinacleCrawler::new(root)),
        SourceType::Rtings => Box::new(RtingsCrawler::new(root)),
    }
}

/// Same as `get_crawler`, with alias hints and the Rtings methodology set
pub fn get_configured_crawler(
    source: SourceType,
    root: &Path,
    aliases: Option<Arc<AliasTable>>,
    rtings_methodology: &str,
) -> Box<dyn Crawler> {
    match source {
        SourceType::Innerfidelity => Box::new(InnerfidelityCrawler::new(root).maybe_aliases(aliases)),
        SourceType::HeadphoneCom => Box::new(HeadphoneComCrawler::new(root).maybe_aliases(aliases)),
        SourceType::Oratory1990 => Box::new(Oratory1990Crawler::new(root).maybe_aliases(aliases)),
        SourceType::Crinacle => Box::new(CrinacleCrawler::new(root).maybe_aliases(aliases)),
        SourceType::Rtings => Box::new(
            RtingsCrawler::new(root)
                .with_methodology(rtings_methodology)
                .maybe_aliases(aliases),
        ),
    }
}

// ============================================================================
// SHARED WALK
// ============================================================================

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Check that a file is a readable measurement CSV (header names a frequency column)
fn check_measurement(path: &Path) -> std::result::Result<(), String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    let headers = reader.headers().map_err(|e| e.to_string())?;
    if headers
        .iter()
        .any(|h| h.trim().eq_ignore_ascii_case("frequency"))
    {
        Ok(())
    } else {
        Err("missing 'frequency' column".to_string())
    }
}

fn crawl(
    root: &Path,
    source: SourceType,
    rigs: &dyn RigResolver,
    aliases: Option<&Arc<AliasTable>>,
) -> CrawlReport {
    let data_dir = root.join("data");
    let mut diagnostics = Vec::new();

    if !data_dir.is_dir() {
        let msg = format!(
            "{}: data directory not found: {}",
            source.name(),
            data_dir.display()
        );
        warn!("{}", msg);
        diagnostics.push(msg);
        return CrawlReport {
            source,
            index: NameIndex::empty(),
            diagnostics,
            data_found: false,
        };
    }

    let mut builder = NameIndexBuilder::new();
    if let Some(aliases) = aliases {
        builder = builder.with_aliases(Arc::clone(aliases));
    }

    let walker = WalkDir::new(&data_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let msg = format!("{}: error accessing entry: {}", source.name(), e);
                warn!("{}", msg);
                diagnostics.push(msg);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file) = MeasurementFile::from_path(&data_dir, entry.path()) else {
            if MeasurementFile::is_candidate(&data_dir, entry.path()) {
                let msg = format!(
                    "{}: skipping unreadable measurement {}: name is not valid UTF-8",
                    source.name(),
                    entry.path().display()
                );
                warn!("{}", msg);
                diagnostics.push(msg);
            } else {
                debug!("Skipping non-measurement file: {}", entry.path().display());
            }
            continue;
        };

        if let Err(e) = check_measurement(&file.path) {
            let msg = format!(
                "{}: skipping unreadable measurement {}: {}",
                source.name(),
                file.path.display(),
                e
            );
            warn!("{}", msg);
            diagnostics.push(msg);
            continue;
        }

        let Some(record) = NameRecord::new(&file.name) else {
            let msg = format!("{}: blank device name: {}", source.name(), file.path.display());
            warn!("{}", msg);
            diagnostics.push(msg);
            continue;
        };

        let rig = rigs.resolve_rig(&file);
        builder.add(record.with_form(&file.form).with_rig(&rig));
    }

    let index = builder.freeze();
    info!("{}: loaded {} name records", source.name(), index.size());

    CrawlReport {
        source,
        index,
        diagnostics,
        data_found: true,
    }
}

// ============================================================================
// FIXED-RIG SOURCES (no per-file metadata)
// ============================================================================

pub const RIG_HMS_II_3: &str = "HMS II.3";
pub const RIG_HEADPHONE_COM: &str = "Headphone.com Legacy";
pub const RIG_GRAS_43AG_7: &str = "GRAS 43AG-7";
pub const RIG_GRAS_RA0045: &str = "GRAS RA0045";
pub const RIG_BK_5128: &str = "Bruel & Kjaer 5128";

macro_rules! fixed_rig_crawler {
    ($(#[$doc:meta])* $crawler:ident, $source:expr, $rig:expr) => {
        $(#[$doc])*
        pub struct $crawler {
            root: PathBuf,
            aliases: Option<Arc<AliasTable>>,
        }

        impl $crawler {
            pub fn new(root: &Path) -> Self {
                $crawler {
                    root: root.to_path_buf(),
                    aliases: None,
                }
            }

            pub fn with_aliases(mut self, aliases: Arc<AliasTable>) -> Self {
                self.aliases = Some(aliases);
                self
            }

            fn maybe_aliases(mut self, aliases: Option<Arc<AliasTable>>) -> Self {
                self.aliases = aliases;
                self
            }
        }

        impl Crawler for $crawler {
            fn read_name_index(&self) -> CrawlReport {
                crawl(&self.root, $source, self, self.aliases.as_ref())
            }

            fn source_type(&self) -> SourceType {
                $source
            }
        }

        impl RigResolver for $crawler {
            fn resolve_rig(&self, _file: &MeasurementFile) -> String {
                $rig.to_string()
            }
        }
    };
}

fixed_rig_crawler!(
    /// Innerfidelity: every measurement on the Head Acoustics HMS II.3
    InnerfidelityCrawler,
    SourceType::Innerfidelity,
    RIG_HMS_II_3
);

fixed_rig_crawler!(
    /// Headphone.com legacy graphs
    HeadphoneComCrawler,
    SourceType::HeadphoneCom,
    RIG_HEADPHONE_COM
);

fixed_rig_crawler!(
    /// oratory1990
    Oratory1990Crawler,
    SourceType::Oratory1990,
    RIG_GRAS_43AG_7
);

fixed_rig_crawler!(
    /// Crinacle: published coupler, applied to the whole dataset
    CrinacleCrawler,
    SourceType::Crinacle,
    RIG_GRAS_RA0045
);

// ============================================================================
// RTINGS (methodology-versioned rig)
// ============================================================================

/// First test methodology measured on the B&K 5128
pub const BK_5128_SINCE: &str = "1.8";

/// Source-wide methodology used until per-file versions are ingested
pub const DEFAULT_RTINGS_METHODOLOGY: &str = "1.7";

/// Parse "major.minor[.x]" into integers; unparsable parts become 0
pub fn parse_version(version: &str) -> (u32, u32) {
    let mut parts = version
        .trim()
        .split('.')
        .map(|p| p.trim().parse::<u32>().unwrap_or(0));

    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    (major, minor)
}

/// Compare methodology versions on (major, minor), so "1.10" > "1.8"
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse_version(a).cmp(&parse_version(b))
}

/// Map a methodology version to the rig it was measured on
pub fn rig_for_methodology(version: &str) -> &'static str {
    if compare_versions(version, BK_5128_SINCE) != Ordering::Less {
        RIG_BK_5128
    } else {
        RIG_HMS_II_3
    }
}

pub struct RtingsCrawler {
    root: PathBuf,
    methodology: String,
    aliases: Option<Arc<AliasTable>>,
}

impl RtingsCrawler {
    pub fn new(root: &Path) -> Self {
        RtingsCrawler {
            root: root.to_path_buf(),
            methodology: DEFAULT_RTINGS_METHODOLOGY.to_string(),
            aliases: None,
        }
    }

    /// Override the source-wide methodology version
    pub fn with_methodology(mut self, version: &str) -> Self {
        self.methodology = version.to_string();
        self
    }

    pub fn with_aliases(mut self, aliases: Arc<AliasTable>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    fn maybe_aliases(mut self, aliases: Option<Arc<AliasTable>>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn methodology(&self) -> &str {
        &self.methodology
    }
}

impl Crawler for RtingsCrawler {
    fn read_name_index(&self) -> CrawlReport {
        crawl(&self.root, SourceType::Rtings, self, self.aliases.as_ref())
    }

    fn source_type(&self) -> SourceType {
        SourceType::Rtings
    }
}

impl RigResolver for RtingsCrawler {
    // TODO: read the per-measurement methodology once the ingestion stage records it
    fn resolve_rig(&self, _file: &MeasurementFile) -> String {
        rig_for_methodology(&self.methodology).to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
