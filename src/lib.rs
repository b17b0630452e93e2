// EQ Catalog - Core Library
// Offline headphone EQ-profile database: crawl measurement datasets, merge
// device names, search them, and parse/validate the EQ profiles they point to.

pub mod error;
pub mod names;          // Name records, alias table, name index
pub mod crawler;        // Per-source measurement crawlers
pub mod search;         // Ranked search over catalog entries
pub mod eq;             // GraphicEQ + fixed-band profile formats
pub mod profile;        // Entry → profile / measurement files
pub mod config;         // TOML configuration
pub mod catalog;        // Parallel build of the search snapshot
pub mod database;       // SQLite persistence of builds

// Re-export commonly used types
pub use error::{CatalogError, Result};
pub use names::{
    Alias, AliasTable, IdentityMode, NameIndex, NameIndexBuilder, NameRecord,
    normalize_name, UNKNOWN,
};
pub use crawler::{
    Crawler, CrawlReport, MeasurementFile, RigResolver, SourceType,
    detect_source, get_crawler, get_configured_crawler,
    InnerfidelityCrawler, HeadphoneComCrawler, Oratory1990Crawler, CrinacleCrawler, RtingsCrawler,
};
pub use search::{Entry, ScoredEntry, SearchEngine, SearchFilter, project_entries};
pub use eq::{
    EqFormat, Parsed, ProfileKind,
    FixedBand, FixedBandEq, FixedBandEqParser,
    GraphicBand, GraphicEq, GraphicEqParser,
};
pub use profile::{LoadedProfile, ProfileLocator, load_profile, measurement_path, read_frequency_response};
pub use config::{CatalogConfig, SourceConfig};
pub use catalog::{BuildReport, Catalog, SourceSummary, build_catalog};
pub use database::{
    BuildRecord, open_database, setup_database, save_build, load_entries, latest_build,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
