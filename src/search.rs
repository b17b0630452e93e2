// 🔍 Search Engine - additive rule-based ranking over Entries
//
// Rules (case-insensitive, trimmed query), scores add up:
//   exact label 1000 | label prefix 500 | word prefix 200 | label contains 100
//   source contains 50 | rig contains 30 | form contains 20

use crate::names::{NameIndex, NameRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SCORE_EXACT: u32 = 1000;
pub const SCORE_PREFIX: u32 = 500;
pub const SCORE_WORD_PREFIX: u32 = 200;
pub const SCORE_CONTAINS: u32 = 100;
pub const SCORE_SOURCE: u32 = 50;
pub const SCORE_RIG: u32 = 30;
pub const SCORE_FORM: u32 = 20;

pub const DEFAULT_MAX_RESULTS: usize = 50;
pub const DEFAULT_MAX_SUGGESTIONS: usize = 10;

// ============================================================================
// ENTRY
// ============================================================================

/// Entry - one searchable (device, source) projection
///
/// Not deduplicated across sources: source and rig decide comparability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    pub source: String,
    pub rig: String,
    pub form: String,
}

impl Entry {
    pub fn new(label: &str, source: &str, rig: &str, form: &str) -> Self {
        Entry {
            label: label.to_string(),
            source: source.to_string(),
            rig: rig.to_string(),
            form: form.to_string(),
        }
    }

    pub fn from_record(record: &NameRecord, source: &str) -> Self {
        Entry::new(record.name(), source, record.rig(), record.form())
    }
}

/// Project a source's Name Index into Entries, in index order
pub fn project_entries(index: &NameIndex, source: &str) -> Vec<Entry> {
    index
        .iter()
        .map(|record| Entry::from_record(record, source))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredEntry<'a> {
    pub entry: &'a Entry,
    pub score: u32,
}

/// Optional facet constraints applied before ranking is truncated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub source: Option<String>,
    pub rig: Option<String>,
    pub form: Option<String>,
}

impl SearchFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        facet_matches(self.source.as_deref(), &entry.source)
            && facet_matches(self.rig.as_deref(), &entry.rig)
            && facet_matches(self.form.as_deref(), &entry.form)
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.rig.is_none() && self.form.is_none()
    }
}

fn facet_matches(wanted: Option<&str>, value: &str) -> bool {
    wanted.map_or(true, |w| eq_ignore_case(w, value))
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// ============================================================================
// SCORING
// ============================================================================

/// Score an entry against a query; 0 means no match
pub fn score(entry: &Entry, query: &str) -> u32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0;
    }
    score_normalized(entry, &query)
}

fn score_normalized(entry: &Entry, query: &str) -> u32 {
    let label = entry.label.to_lowercase();
    let mut score = 0;

    if label == query {
        score += SCORE_EXACT;
    }
    if label.starts_with(query) {
        score += SCORE_PREFIX;
    }
    if label
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .any(|word| !word.is_empty() && word.starts_with(query))
    {
        score += SCORE_WORD_PREFIX;
    }
    if label.contains(query) {
        score += SCORE_CONTAINS;
    }
    if entry.source.to_lowercase().contains(query) {
        score += SCORE_SOURCE;
    }
    if entry.rig.to_lowercase().contains(query) {
        score += SCORE_RIG;
    }
    if entry.form.to_lowercase().contains(query) {
        score += SCORE_FORM;
    }

    score
}

// ============================================================================
// SEARCH ENGINE
// ============================================================================

/// Immutable snapshot of Entries; rebuilds produce a new engine
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    entries: Vec<Entry>,
}

impl SearchEngine {
    pub fn new(entries: Vec<Entry>) -> Self {
        SearchEngine { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ranked search; blank query returns nothing
    pub fn search(&self, query: &str, max_results: usize) -> Vec<&Entry> {
        self.search_filtered(query, max_results, &SearchFilter::default())
    }

    /// Ranked search restricted to entries matching `filter`
    pub fn search_filtered(
        &self,
        query: &str,
        max_results: usize,
        filter: &SearchFilter,
    ) -> Vec<&Entry> {
        self.search_scored(query, max_results, filter)
            .into_iter()
            .map(|scored| scored.entry)
            .collect()
    }

    /// Ranked search with scores, descending; ties keep input order
    pub fn search_scored(
        &self,
        query: &str,
        max_results: usize,
        filter: &SearchFilter,
    ) -> Vec<ScoredEntry<'_>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() || max_results == 0 {
            return Vec::new();
        }

        let mut scored: Vec<ScoredEntry<'_>> = self
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .map(|entry| ScoredEntry {
                entry,
                score: score_normalized(entry, &query),
            })
            .filter(|s| s.score > 0)
            .collect();

        // Vec::sort_by is stable
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(max_results);
        scored
    }

    pub fn filter_by_source(&self, source: &str) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| eq_ignore_case(&e.source, source))
            .collect()
    }

    pub fn filter_by_rig(&self, rig: &str) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| eq_ignore_case(&e.rig, rig))
            .collect()
    }

    pub fn filter_by_form(&self, form: &str) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| eq_ignore_case(&e.form, form))
            .collect()
    }

    pub fn get_all_sources(&self) -> Vec<String> {
        distinct_sorted(self.entries.iter().map(|e| e.source.as_str()))
    }

    pub fn get_all_rigs(&self) -> Vec<String> {
        distinct_sorted(self.entries.iter().map(|e| e.rig.as_str()))
    }

    pub fn get_all_forms(&self) -> Vec<String> {
        distinct_sorted(self.entries.iter().map(|e| e.form.as_str()))
    }

    /// Autocomplete: distinct labels starting with the query, sorted
    pub fn get_suggestions(&self, query: &str, max: usize) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.entries
            .iter()
            .filter(|e| e.label.to_lowercase().starts_with(&query))
            .map(|e| e.label.as_str())
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .take(max)
            .map(str::to_string)
            .collect()
    }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameIndexBuilder;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sample_engine() -> SearchEngine {
        SearchEngine::new(vec![
            Entry::new("Sony WH-1000XM4", "Rtings", "HMS II.3", "over-ear"),
            Entry::new("Sennheiser HD600", "Innerfidelity", "HMS II.3", "over-ear"),
            Entry::new("Sony WF-1000XM3", "Rtings", "Bruel & Kjaer 5128", "in-ear"),
            Entry::new("Sennheiser HD600", "oratory1990", "GRAS 43AG-7", "over-ear"),
            Entry::new("HD 650", "oratory1990", "GRAS 43AG-7", "over-ear"),
        ])
    }

    fn labels(entries: &[&Entry]) -> Vec<String> {
        entries.iter().map(|e| e.label.clone()).collect()
    }

    #[test]
    fn test_blank_query_returns_nothing() {
        let engine = sample_engine();
        assert!(engine.search("", DEFAULT_MAX_RESULTS).is_empty());
        assert!(engine.search("   ", DEFAULT_MAX_RESULTS).is_empty());
        assert_eq!(score(&engine.entries()[0], "  "), 0);
    }

    #[test]
    fn test_sony_wh_ranks_first() {
        let engine = SearchEngine::new(vec![
            Entry::new("Sony WH-1000XM4", "Rtings", "HMS II.3", "over-ear"),
            Entry::new("Sennheiser HD600", "Rtings", "HMS II.3", "over-ear"),
            Entry::new("Sony WF-1000XM3", "Rtings", "HMS II.3", "in-ear"),
        ]);

        let results = engine.search("sony wh", DEFAULT_MAX_RESULTS);

        assert_eq!(labels(&results), vec!["Sony WH-1000XM4".to_string()]);
    }

    #[test]
    fn test_scores_are_additive() {
        let entry = Entry::new("HD 650", "oratory1990", "GRAS 43AG-7", "over-ear");

        // exact + prefix + contains (a two-word query is never a single word's prefix)
        assert_eq!(score(&entry, "hd 650"), 1000 + 500 + 100);
        // word prefix + contains
        assert_eq!(score(&entry, "650"), 200 + 100);
        // source only
        assert_eq!(score(&entry, "oratory"), 50);
        // rig only
        assert_eq!(score(&entry, "43ag"), 30);
        // form only
        assert_eq!(score(&entry, "ear"), 20);
        assert_eq!(score(&entry, "zzz"), 0);
    }

    #[test]
    fn test_word_boundaries_include_hyphen_and_underscore() {
        let entry = Entry::new("Moondrop_Blessing-2 Dusk", "Crinacle", "GRAS RA0045", "in-ear");
        assert_eq!(score(&entry, "blessing"), 200 + 100);
        assert_eq!(score(&entry, "dusk"), 200 + 100);
    }

    #[test]
    fn test_exact_match_ranks_above_contains() {
        let engine = SearchEngine::new(vec![
            Entry::new("Clarity HD 600 Mod", "Crinacle", "x", "y"),
            Entry::new("HD 600", "Innerfidelity", "x", "y"),
        ]);

        let scored = engine.search_scored("hd 600", 10, &SearchFilter::default());
        assert_eq!(scored[0].entry.label, "HD 600");
        assert!(scored[0].score >= SCORE_EXACT);
        assert!(scored[0].score > scored[1].score);
    }

    #[test]
    fn test_ties_keep_input_order_and_max_results() {
        let engine = sample_engine();

        let results = engine.search("sennheiser", DEFAULT_MAX_RESULTS);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "Innerfidelity");
        assert_eq!(results[1].source, "oratory1990");

        let limited = engine.search("sennheiser", 1);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].source, "Innerfidelity");

        assert!(engine.search("sennheiser", 0).is_empty());
    }

    #[test]
    fn test_search_filtered() {
        let engine = sample_engine();
        let filter = SearchFilter {
            source: Some("ORATORY1990".to_string()),
            ..Default::default()
        };

        let results = engine.search_filtered("hd", DEFAULT_MAX_RESULTS, &filter);
        assert_eq!(
            labels(&results),
            vec!["HD 650".to_string(), "Sennheiser HD600".to_string()]
        );
    }

    #[test]
    fn test_facet_filters_are_case_insensitive_exact() {
        let engine = sample_engine();

        assert_eq!(engine.filter_by_source("rtings").len(), 2);
        assert_eq!(engine.filter_by_source("rting").len(), 0);
        assert_eq!(engine.filter_by_rig("hms ii.3").len(), 2);
        assert_eq!(engine.filter_by_form("IN-EAR").len(), 1);
    }

    #[test]
    fn test_facet_lists_are_distinct_and_sorted() {
        let engine = sample_engine();

        assert_eq!(
            engine.get_all_sources(),
            vec!["Innerfidelity", "Rtings", "oratory1990"]
        );
        assert_eq!(
            engine.get_all_rigs(),
            vec!["Bruel & Kjaer 5128", "GRAS 43AG-7", "HMS II.3"]
        );
        assert_eq!(engine.get_all_forms(), vec!["in-ear", "over-ear"]);
    }

    #[test]
    fn test_suggestions() {
        let engine = sample_engine();

        let suggestions = engine.get_suggestions("se", DEFAULT_MAX_SUGGESTIONS);
        assert_eq!(suggestions, vec!["Sennheiser HD600".to_string()]);

        let sony = engine.get_suggestions("SONY", DEFAULT_MAX_SUGGESTIONS);
        assert_eq!(sony, vec!["Sony WF-1000XM3", "Sony WH-1000XM4"]);
        for s in &sony {
            assert!(s.to_lowercase().starts_with("sony"));
        }

        assert_eq!(engine.get_suggestions("s", 1).len(), 1);
        assert!(engine.get_suggestions("", 10).is_empty());
        assert!(engine.get_suggestions("xyz", 10).is_empty());
    }

    #[test]
    fn test_project_entries_from_index() {
        let mut builder = NameIndexBuilder::new();
        builder.add(
            NameRecord::new("HD 800 S")
                .unwrap()
                .with_form("over-ear")
                .with_rig("GRAS 43AG-7"),
        );
        builder.add(NameRecord::new("hd 800 s").unwrap());
        let index = builder.freeze();

        let entries = project_entries(&index, "oratory1990");

        assert_eq!(
            entries,
            vec![Entry::new("hd 800 s", "oratory1990", "GRAS 43AG-7", "over-ear")]
        );
    }

    #[test]
    fn test_concurrent_read_only_searches() {
        let engine = Arc::new(sample_engine());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let engine = Arc::clone(&engine);
                scope.spawn(move || {
                    let results = engine.search("hd", DEFAULT_MAX_RESULTS);
                    assert_eq!(results.len(), 3);
                });
            }
        });
    }
}
