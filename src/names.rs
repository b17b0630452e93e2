// 🏷️ Name Records + Name Index
// One (device name, source) observation, and the per-source index that merges them
//
// "Sennheiser HD 600", "sennheiser  hd 600" → same device, one merged record

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Placeholder for form/rig when a source does not say
pub const UNKNOWN: &str = "unknown";

// ============================================================================
// NAME RECORD
// ============================================================================

/// NameRecord - one device name as published by one measurement source
///
/// Value object: built by a crawler, never mutated afterwards. `merge`
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameRecord {
    name: String,
    form: String,
    rig: String,
    manufacturer: Option<String>,
    true_model: Option<String>,
    false_name: Option<String>,
}

impl NameRecord {
    /// Create a record with form and rig set to "unknown"
    ///
    /// Returns `None` for a blank name.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        Some(NameRecord {
            name: name.to_string(),
            form: UNKNOWN.to_string(),
            rig: UNKNOWN.to_string(),
            manufacturer: None,
            true_model: None,
            false_name: None,
        })
    }

    /// Builder pattern: set form factor (blank keeps "unknown")
    pub fn with_form(mut self, form: &str) -> Self {
        self.form = or_unknown(form);
        self
    }

    /// Builder pattern: set measurement rig (blank keeps "unknown")
    pub fn with_rig(mut self, rig: &str) -> Self {
        self.rig = or_unknown(rig);
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: &str) -> Self {
        self.manufacturer = non_blank(manufacturer);
        self
    }

    pub fn with_true_model(mut self, true_model: &str) -> Self {
        self.true_model = non_blank(true_model);
        self
    }

    pub fn with_false_name(mut self, false_name: &str) -> Self {
        self.false_name = non_blank(false_name);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn rig(&self) -> &str {
        &self.rig
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    pub fn true_model(&self) -> Option<&str> {
        self.true_model.as_deref()
    }

    pub fn false_name(&self) -> Option<&str> {
        self.false_name.as_deref()
    }

    /// Combine with a later observation of the same device
    ///
    /// Right-biased: `other.name` wins, `form`/`rig` only when `other`
    /// knows them, optional fields when `other` has them.
    pub fn merge(&self, other: &NameRecord) -> NameRecord {
        NameRecord {
            name: other.name.clone(),
            form: prefer_known(&self.form, &other.form),
            rig: prefer_known(&self.rig, &other.rig),
            manufacturer: other.manufacturer.clone().or_else(|| self.manufacturer.clone()),
            true_model: other.true_model.clone().or_else(|| self.true_model.clone()),
            false_name: other.false_name.clone().or_else(|| self.false_name.clone()),
        }
    }

    /// Fill hints from an alias entry without overriding what the record already has
    fn annotate(self, alias: &Alias) -> NameRecord {
        NameRecord {
            manufacturer: self.manufacturer.or_else(|| alias.manufacturer.clone()),
            true_model: self.true_model.or_else(|| alias.true_model.clone()),
            false_name: self.false_name.or_else(|| alias.false_name.clone()),
            ..self
        }
    }
}

fn prefer_known(existing: &str, incoming: &str) -> String {
    if incoming == UNKNOWN {
        existing.to_string()
    } else {
        incoming.to_string()
    }
}

fn or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Normalize a device name into an identity key
///
/// Lowercase, trimmed, inner whitespace collapsed to one space.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// ALIAS TABLE
// ============================================================================

/// Externally supplied naming hints for one device
///
/// These are opaque: the catalog never guesses aliases on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub true_model: Option<String>,
    #[serde(default)]
    pub false_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: Vec<Alias>,
    by_key: HashMap<String, usize>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load aliases from a JSON array file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::AliasTable(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let aliases: Vec<Alias> = serde_json::from_str(&content).map_err(|e| {
            CatalogError::AliasTable(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(AliasTable::from_aliases(aliases))
    }

    /// Build from a list; later entries win on key collisions
    pub fn from_aliases(aliases: Vec<Alias>) -> Self {
        let mut table = AliasTable::new();
        for alias in aliases {
            table.add(alias);
        }
        table
    }

    pub fn add(&mut self, alias: Alias) {
        let idx = self.aliases.len();
        self.by_key.insert(normalize_name(&alias.name), idx);
        if let Some(false_name) = &alias.false_name {
            // Lookup by the canonical name must keep winning over a misspelling
            self.by_key.entry(normalize_name(false_name)).or_insert(idx);
        }
        self.aliases.push(alias);
    }

    /// Find the alias entry for a name (by alias name or known misspelling)
    pub fn lookup(&self, name: &str) -> Option<&Alias> {
        self.by_key
            .get(&normalize_name(name))
            .map(|&idx| &self.aliases[idx])
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

// ============================================================================
// NAME INDEX (builder → frozen snapshot)
// ============================================================================

/// How records are keyed in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// Case and whitespace variants collapse to one device
    #[default]
    Normalized,
    /// Only surrounding whitespace is ignored
    Exact,
}

/// Exclusive, mutable population phase of a Name Index
#[derive(Debug, Default)]
pub struct NameIndexBuilder {
    records: Vec<NameRecord>,
    by_key: HashMap<String, usize>,
    aliases: Option<Arc<AliasTable>>,
    mode: IdentityMode,
}

impl NameIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases(mut self, aliases: Arc<AliasTable>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn with_identity_mode(mut self, mode: IdentityMode) -> Self {
        self.mode = mode;
        self
    }

    /// Insert a record, or merge it into the record already stored under its identity
    pub fn add(&mut self, record: NameRecord) {
        let record = match self.aliases.as_ref().and_then(|t| t.lookup(record.name())) {
            Some(alias) => record.annotate(alias),
            None => record,
        };

        let key = self.key_for(&record);
        let idx = match self.by_key.get(&key) {
            Some(&idx) => {
                let merged = self.records[idx].merge(&record);
                self.records[idx] = merged;
                idx
            }
            None => {
                let idx = self.records.len();
                self.by_key.insert(key, idx);
                self.records.push(record);
                idx
            }
        };

        self.register_secondary_keys(idx);
    }

    /// Make the stored name and false name resolve to the same slot
    ///
    /// Never steals a key already owned by another record.
    fn register_secondary_keys(&mut self, idx: usize) {
        let record = &self.records[idx];
        let names = std::iter::once(record.name()).chain(record.false_name());
        let keys: Vec<String> = names.map(|n| identity_key(n, self.mode)).collect();

        for key in keys {
            self.by_key.entry(key).or_insert(idx);
        }
    }

    /// Merge every record of a frozen index into this builder
    pub fn extend(&mut self, index: &NameIndex) {
        for record in index.iter() {
            self.add(record.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// End the population phase
    pub fn freeze(self) -> NameIndex {
        NameIndex {
            records: self.records,
            by_key: self.by_key,
            mode: self.mode,
        }
    }

    fn key_for(&self, record: &NameRecord) -> String {
        let identity = record.true_model().unwrap_or(record.name());
        identity_key(identity, self.mode)
    }
}

fn identity_key(name: &str, mode: IdentityMode) -> String {
    match mode {
        IdentityMode::Normalized => normalize_name(name),
        IdentityMode::Exact => name.trim().to_string(),
    }
}

/// Read-only Name Index, safe to share across threads
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    records: Vec<NameRecord>,
    by_key: HashMap<String, usize>,
    mode: IdentityMode,
}

impl NameIndex {
    /// An index with no records (e.g. a missing source directory)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a device by its stored name, false name, or canonical model name
    pub fn get(&self, name: &str) -> Option<&NameRecord> {
        self.by_key
            .get(&identity_key(name, self.mode))
            .map(|&idx| &self.records[idx])
    }

    /// Records in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = &NameRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[NameRecord] {
        &self.records
    }
}

// ============================================================================
// TESTS
// ============================================================================
