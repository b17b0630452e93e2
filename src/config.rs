//! Catalog configuration (TOML)
//!
//! Config file resolution, highest priority first:
//! 1. `--config` command-line argument
//! 2. `EQ_CATALOG_CONFIG` environment variable
//! 3. `<config_dir>/eq-catalog/config.toml`
//! 4. Built-in defaults
//!
//! ```toml
//! database_path = "eq-catalog.sqlite3"
//! results_root = "results"
//! rtings_methodology = "1.8"
//!
//! [[sources]]
//! source = "oratory1990"
//! root = "measurements/oratory1990"
//!
//! [[sources]]
//! source = "rtings"
//! root = "measurements/rtings"
//! enabled = false
//! ```

use crate::crawler::{SourceType, DEFAULT_RTINGS_METHODOLOGY};
use crate::error::{CatalogError, Result};
use crate::profile::measurement_path;
use crate::search::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "EQ_CATALOG_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite file holding the built catalog
    pub database_path: PathBuf,
    /// Root of the `<source>/<form>/<name>/` EQ results tree
    pub results_root: Option<PathBuf>,
    /// JSON alias table (naming hints)
    pub alias_file: Option<PathBuf>,
    /// Source-wide Rtings test methodology version
    pub rtings_methodology: String,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source: SourceType,
    pub root: PathBuf,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            database_path: default_data_dir().join("eq-catalog.sqlite3"),
            results_root: None,
            alias_file: None,
            rtings_methodology: DEFAULT_RTINGS_METHODOLOGY.to_string(),
            sources: Vec::new(),
        }
    }
}

impl CatalogConfig {
    /// Parse TOML text; relative paths stay as written
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CatalogError::Config(e.to_string()))
    }

    /// Load a config file; relative paths resolve against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = CatalogConfig::from_toml_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.rebased(base))
    }

    /// Resolve the config from CLI argument, environment, or defaults
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV_VAR).ok();
        CatalogConfig::resolve_with(cli_path, env_path.as_deref(), default_config_path())
    }

    fn resolve_with(
        cli_path: Option<&Path>,
        env_path: Option<&str>,
        default_path: Option<PathBuf>,
    ) -> Result<Self> {
        // Priority 1 + 2: an explicitly named file must exist
        if let Some(path) = cli_path {
            return CatalogConfig::from_file(path);
        }
        if let Some(path) = env_path.filter(|p| !p.trim().is_empty()) {
            return CatalogConfig::from_file(Path::new(path));
        }

        // Priority 3: per-user config file, if present
        if let Some(path) = default_path.filter(|p| p.is_file()) {
            return CatalogConfig::from_file(&path);
        }

        // Priority 4: compiled defaults
        Ok(CatalogConfig::default())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Dataset root configured for a source (enabled or not)
    pub fn source_root(&self, source: SourceType) -> Option<&Path> {
        self.sources
            .iter()
            .find(|s| s.source == source)
            .map(|s| s.root.as_path())
    }

    /// Where an entry's measurement CSV lives, if its source is configured
    pub fn measurement_file(&self, entry: &Entry) -> Option<PathBuf> {
        let source = SourceType::from_code(&entry.source)?;
        let root = self.source_root(source)?;
        Some(measurement_path(root, entry))
    }

    fn rebased(mut self, base: &Path) -> Self {
        let rebase = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };

        self.database_path = rebase(self.database_path);
        self.results_root = self.results_root.map(rebase);
        self.alias_file = self.alias_file.map(rebase);
        for source in &mut self.sources {
            source.root = rebase(std::mem::take(&mut source.root));
        }
        self
    }
}

/// Per-user config file location
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("eq-catalog").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("eq-catalog"))
        .unwrap_or_else(|| PathBuf::from("./eq_catalog_data"))
}
