use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use eq_catalog::search::{DEFAULT_MAX_RESULTS, DEFAULT_MAX_SUGGESTIONS};
use eq_catalog::{
    build_catalog, latest_build, load_entries, load_profile, open_database, save_build,
    CatalogConfig, Entry, FixedBandEqParser, GraphicEqParser, LoadedProfile, ProfileKind,
    ProfileLocator, SearchEngine, SearchFilter,
};

#[derive(Parser)]
#[command(name = "eq-catalog", version, about = "Offline headphone EQ-profile catalog")]
struct Cli {
    /// Config file (overrides EQ_CATALOG_CONFIG and the per-user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every configured source and persist the catalog
    Build,
    /// Ranked search over the catalog
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
        max: usize,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        rig: Option<String>,
        #[arg(long)]
        form: Option<String>,
    },
    /// Autocomplete device names
    Suggest {
        prefix: String,
        #[arg(long, default_value_t = DEFAULT_MAX_SUGGESTIONS)]
        max: usize,
    },
    /// List distinct sources, rigs and forms
    Facets,
    /// Parse + validate an EQ profile file
    Check {
        file: PathBuf,
        #[arg(long, default_value = "graphic")]
        format: ProfileKind,
    },
}

fn initialize_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(cli.verbose);

    let config = CatalogConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Build => run_build(&config),
        Command::Search { query, max, source, rig, form } => {
            let filter = SearchFilter { source, rig, form };
            run_search(&config, &query, max, &filter)
        }
        Command::Suggest { prefix, max } => run_suggest(&config, &prefix, max),
        Command::Facets => run_facets(&config),
        Command::Check { file, format } => run_check(&file, format),
    }
}

fn run_build(config: &CatalogConfig) -> Result<()> {
    println!("🎧 Building EQ catalog");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config.sources.is_empty() {
        eprintln!("❌ No sources configured!");
        eprintln!("   Add [[sources]] entries to the config file.");
        std::process::exit(1);
    }

    // 1. Crawl
    println!("\n📂 Crawling {} sources...", config.enabled_sources().count());
    let report = build_catalog(config)?;
    for summary in &report.sources {
        println!(
            "✓ {}: {} records ({} diagnostics)",
            summary.source.name(),
            summary.records,
            summary.diagnostics
        );
    }

    // 2. Persist
    println!("\n💾 Saving to {}...", config.database_path.display());
    let mut conn = open_database(&config.database_path)?;
    let build = save_build(&mut conn, &report.crawls, &report.diagnostics)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Build {} complete", build.build_id);
    println!("✓ Entries: {}", report.catalog.entry_count());
    println!("✓ Devices: {}", report.device_count);
    if !report.diagnostics.is_empty() {
        println!("⚠️  Diagnostics: {}", report.diagnostics.len());
        for diagnostic in &report.diagnostics {
            println!("   {}", diagnostic);
        }
    }

    Ok(())
}

/// Search engine over the last persisted build
fn load_engine(config: &CatalogConfig) -> Result<SearchEngine> {
    if !config.database_path.exists() {
        eprintln!("❌ Catalog not found!");
        eprintln!("   Run: eq-catalog build");
        std::process::exit(1);
    }

    let conn = open_database(&config.database_path)?;
    if let Some(build) = latest_build(&conn)? {
        tracing::debug!("Using build {} from {}", build.build_id, build.built_at);
    }
    let entries = load_entries(&conn)
        .with_context(|| format!("Failed to load {}", config.database_path.display()))?;
    Ok(SearchEngine::new(entries))
}

fn run_search(config: &CatalogConfig, query: &str, max: usize, filter: &SearchFilter) -> Result<()> {
    let engine = load_engine(config)?;
    let locator = config.results_root.as_deref().map(ProfileLocator::new);

    let hits = engine.search_scored(query, max, filter);
    if hits.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }

    for hit in hits {
        let entry = hit.entry;
        let kinds = match &locator {
            Some(locator) => locator
                .available_kinds(entry)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            None => String::new(),
        };
        println!(
            "{:>5}  {} | {} | {} | {}  [{}]",
            hit.score, entry.label, entry.source, entry.rig, entry.form, kinds
        );
        if let Some(path) = measurement_for(config, entry) {
            println!("       📈 {}", path.display());
        }
    }

    Ok(())
}

/// Measurement CSV behind an entry, if it exists on disk
fn measurement_for(config: &CatalogConfig, entry: &Entry) -> Option<PathBuf> {
    config.measurement_file(entry).filter(|p| p.is_file())
}

fn run_suggest(config: &CatalogConfig, prefix: &str, max: usize) -> Result<()> {
    let engine = load_engine(config)?;
    for suggestion in engine.get_suggestions(prefix, max) {
        println!("{}", suggestion);
    }
    Ok(())
}

fn run_facets(config: &CatalogConfig) -> Result<()> {
    let engine = load_engine(config)?;

    println!("📊 {} entries", engine.len());
    println!("\nSources:");
    for source in engine.get_all_sources() {
        println!("  {} ({})", source, engine.filter_by_source(&source).len());
    }
    println!("\nRigs:");
    for rig in engine.get_all_rigs() {
        println!("  {} ({})", rig, engine.filter_by_rig(&rig).len());
    }
    println!("\nForms:");
    for form in engine.get_all_forms() {
        println!("  {} ({})", form, engine.filter_by_form(&form).len());
    }

    Ok(())
}

fn run_check(path: &Path, kind: ProfileKind) -> Result<()> {
    let valid = match kind {
        ProfileKind::Graphic => {
            let loaded = load_profile(&GraphicEqParser::new(), path)?;
            print_check(&loaded, loaded.profile.bands.len())
        }
        ProfileKind::FixedBand => {
            let loaded = load_profile(&FixedBandEqParser::new(), path)?;
            println!("✓ Preamp: {} dB", loaded.profile.preamp);
            print_check(&loaded, loaded.profile.bands.len())
        }
    };

    if !valid {
        std::process::exit(1);
    }
    Ok(())
}

fn print_check<T>(loaded: &LoadedProfile<T>, bands: usize) -> bool {
    println!("🔍 {}", loaded.path.display());
    println!("✓ Bands: {}", bands);

    for diagnostic in &loaded.diagnostics {
        println!("⚠️  {}", diagnostic);
    }
    for error in &loaded.errors {
        println!("❌ {}", error);
    }

    if loaded.is_valid() {
        println!("✅ Profile is valid");
    }
    loaded.is_valid()
}
