use crate::crawler::{CrawlReport, SourceType};
use crate::names::{normalize_name, NameRecord};
use crate::search::Entry;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// One persisted catalog build (audit trail)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub build_id: String,
    pub built_at: DateTime<Utc>,
    pub record_count: i64,
    pub diagnostics: Vec<String>,
}

/// Stable identity of a (source, device) row
///
/// Same key the Name Index merges on, so re-saving a rebuild updates rows in place.
pub fn identity_hash(source: SourceType, record: &NameRecord) -> String {
    let identity = record.true_model().unwrap_or(record.name());
    let mut hasher = Sha256::new();
    hasher.update(format!("{}\u{1f}{}", source.code(), normalize_name(identity)));
    format!("{:x}", hasher.finalize())
}

/// Open (or create) the catalog database file
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL so a reader keeps serving the previous build during a rebuild
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS name_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity_hash TEXT UNIQUE NOT NULL,
            source TEXT NOT NULL,
            name TEXT NOT NULL,
            form TEXT NOT NULL,
            rig TEXT NOT NULL,
            manufacturer TEXT,
            true_model TEXT,
            false_name TEXT,
            build_id TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS builds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            build_id TEXT UNIQUE NOT NULL,
            built_at TEXT NOT NULL,
            record_count INTEGER NOT NULL,
            diagnostics TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_name_records_source ON name_records(source)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_name_records_name ON name_records(name)",
        [],
    )?;

    Ok(())
}

/// Persist every crawled index as one build
///
/// Rows are upserted by identity hash; rows of a crawled source that the
/// crawl no longer produced are removed. A source whose data directory was
/// missing keeps its rows.
pub fn save_build(
    conn: &mut Connection,
    crawls: &[CrawlReport],
    diagnostics: &[String],
) -> Result<BuildRecord> {
    let build = BuildRecord {
        build_id: uuid::Uuid::new_v4().to_string(),
        built_at: Utc::now(),
        record_count: crawls.iter().map(|c| c.index.size() as i64).sum(),
        diagnostics: diagnostics.to_vec(),
    };
    let built_at = build.built_at.to_rfc3339();

    let tx = conn.transaction()?;

    for crawl in crawls {
        for record in crawl.index.iter() {
            tx.execute(
                "INSERT INTO name_records (
                    identity_hash, source, name, form, rig,
                    manufacturer, true_model, false_name, build_id, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(identity_hash) DO UPDATE SET
                    name = excluded.name,
                    form = excluded.form,
                    rig = excluded.rig,
                    manufacturer = excluded.manufacturer,
                    true_model = excluded.true_model,
                    false_name = excluded.false_name,
                    build_id = excluded.build_id,
                    updated_at = excluded.updated_at",
                params![
                    identity_hash(crawl.source, record),
                    crawl.source.code(),
                    record.name(),
                    record.form(),
                    record.rig(),
                    record.manufacturer(),
                    record.true_model(),
                    record.false_name(),
                    build.build_id,
                    built_at,
                ],
            )?;
        }

        if !crawl.data_found {
            tracing::warn!(
                "{}: data directory missing, keeping previously saved records",
                crawl.source.name()
            );
            continue;
        }

        let removed = tx.execute(
            "DELETE FROM name_records WHERE source = ?1 AND build_id != ?2",
            params![crawl.source.code(), build.build_id],
        )?;
        if removed > 0 {
            tracing::info!("{}: removed {} stale records", crawl.source.name(), removed);
        }
    }

    tx.execute(
        "INSERT INTO builds (build_id, built_at, record_count, diagnostics)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            build.build_id,
            built_at,
            build.record_count,
            serde_json::to_string(&build.diagnostics)?,
        ],
    )?;

    tx.commit()?;

    tracing::info!(
        "Saved build {}: {} records",
        build.build_id,
        build.record_count
    );

    Ok(build)
}

/// Rehydrate search entries in first-insertion order
pub fn load_entries(conn: &Connection) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(
        "SELECT name, source, rig, form FROM name_records ORDER BY id",
    )?;

    let entries = stmt
        .query_map([], |row| {
            let name: String = row.get(0)?;
            let source: String = row.get(1)?;
            let rig: String = row.get(2)?;
            let form: String = row.get(3)?;

            let source_label = SourceType::from_code(&source)
                .map(|s| s.name().to_string())
                .unwrap_or(source);

            Ok(Entry {
                label: name,
                source: source_label,
                rig,
                form,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn count_records(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM name_records", [], |row| row.get(0))?;
    Ok(count)
}

/// Most recent build, if any
pub fn latest_build(conn: &Connection) -> Result<Option<BuildRecord>> {
    let mut stmt = conn.prepare(
        "SELECT build_id, built_at, record_count, diagnostics
         FROM builds ORDER BY id DESC LIMIT 1",
    )?;

    let mut rows = stmt.query_map([], |row| {
        let built_at_str: String = row.get(1)?;
        let diagnostics_json: String = row.get(3)?;

        Ok(BuildRecord {
            build_id: row.get(0)?,
            built_at: DateTime::parse_from_rfc3339(&built_at_str)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                })?
                .with_timezone(&Utc),
            record_count: row.get(2)?,
            diagnostics: serde_json::from_str(&diagnostics_json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?,
        })
    })?;

    match rows.next() {
        Some(build) => Ok(Some(build?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameIndexBuilder;
    use pretty_assertions::assert_eq;

    fn crawl(source: SourceType, records: &[(&str, &str, &str)]) -> CrawlReport {
        let mut builder = NameIndexBuilder::new();
        for (name, form, rig) in records {
            builder.add(NameRecord::new(name).unwrap().with_form(form).with_rig(rig));
        }
        CrawlReport {
            source,
            index: builder.freeze(),
            diagnostics: Vec::new(),
            data_found: true,
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_identity_hash_is_stable() {
        let a = NameRecord::new("Sennheiser HD 600").unwrap();
        let b = NameRecord::new("sennheiser  hd 600").unwrap().with_rig("HMS II.3");

        let hash = identity_hash(SourceType::Oratory1990, &a);
        assert_eq!(hash, identity_hash(SourceType::Oratory1990, &b));
        assert_ne!(hash, identity_hash(SourceType::Rtings, &a));
        assert_eq!(hash.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_save_and_load_entries() {
        let mut conn = memory_db();
        let crawls = vec![
            crawl(
                SourceType::Oratory1990,
                &[("HD 600", "over-ear", "GRAS 43AG-7"), ("ER4SR", "in-ear", "GRAS 43AG-7")],
            ),
            crawl(SourceType::Rtings, &[("HD 600", "over-ear", "HMS II.3")]),
        ];

        let build = save_build(&mut conn, &crawls, &["warning".to_string()]).unwrap();
        assert_eq!(build.record_count, 3);

        let entries = load_entries(&conn).unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::new("HD 600", "oratory1990", "GRAS 43AG-7", "over-ear"),
                Entry::new("ER4SR", "oratory1990", "GRAS 43AG-7", "in-ear"),
                Entry::new("HD 600", "Rtings", "HMS II.3", "over-ear"),
            ]
        );

        let latest = latest_build(&conn).unwrap().unwrap();
        assert_eq!(latest.build_id, build.build_id);
        assert_eq!(latest.diagnostics, vec!["warning".to_string()]);
    }

    #[test]
    fn test_rebuild_is_idempotent_and_drops_stale_rows() {
        let mut conn = memory_db();
        let first = vec![crawl(
            SourceType::Innerfidelity,
            &[("HD 650", "over-ear", "HMS II.3"), ("K701", "over-ear", "HMS II.3")],
        )];
        save_build(&mut conn, &first, &[]).unwrap();
        save_build(&mut conn, &first, &[]).unwrap();
        assert_eq!(count_records(&conn).unwrap(), 2);

        let second = vec![crawl(
            SourceType::Innerfidelity,
            &[("hd 650", "over-ear", "HMS II.3")],
        )];
        save_build(&mut conn, &second, &[]).unwrap();

        let entries = load_entries(&conn).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "hd 650");
    }

    #[test]
    fn test_missing_data_dir_keeps_saved_rows() {
        let mut conn = memory_db();
        let first = vec![crawl(
            SourceType::Crinacle,
            &[("Moondrop Aria", "in-ear", "GRAS RA0045"), ("Blessing 2", "in-ear", "GRAS RA0045")],
        )];
        save_build(&mut conn, &first, &[]).unwrap();

        let unmounted = vec![CrawlReport {
            source: SourceType::Crinacle,
            index: NameIndexBuilder::new().freeze(),
            diagnostics: vec!["Crinacle: data directory not found".to_string()],
            data_found: false,
        }];
        let build = save_build(&mut conn, &unmounted, &unmounted[0].diagnostics).unwrap();

        assert_eq!(build.record_count, 0);
        assert_eq!(count_records(&conn).unwrap(), 2);
        assert_eq!(load_entries(&conn).unwrap()[0].label, "Moondrop Aria");
    }

    #[test]
    fn test_latest_build_empty_db() {
        let conn = memory_db();
        assert!(latest_build(&conn).unwrap().is_none());
        assert_eq!(count_records(&conn).unwrap(), 0);
    }

    #[test]
    fn test_open_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.sqlite3");

        let conn = open_database(&path).unwrap();
        assert!(path.exists());
        assert_eq!(count_records(&conn).unwrap(), 0);
    }
}
