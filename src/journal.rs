use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::scanner::ScanReport;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id               INTEGER PRIMARY KEY,
            started_at       TEXT NOT NULL,
            finished_at      TEXT NOT NULL,
            sources_ok       INTEGER NOT NULL,
            sources_failed   INTEGER NOT NULL,
            messages_scanned INTEGER NOT NULL,
            codes_accepted   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sightings (
            id              INTEGER PRIMARY KEY,
            run_id          INTEGER NOT NULL REFERENCES runs(id),
            code            TEXT NOT NULL,
            provenance_link TEXT NOT NULL,
            source_id       TEXT NOT NULL,
            outcome         TEXT NOT NULL
                CHECK(outcome IN ('delivered','delivery_failed','persist_failed')),
            detail          TEXT,
            found_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sightings_code ON sightings(code);
        CREATE INDEX IF NOT EXISTS idx_sightings_outcome ON sightings(outcome);
        ",
    )?;
    Ok(())
}

/// Write one run and all its sightings in a single transaction.
pub fn record_run(conn: &Connection, report: &ScanReport) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let failed = report.sources_failed();
    tx.execute(
        "INSERT INTO runs
         (started_at, finished_at, sources_ok, sources_failed, messages_scanned, codes_accepted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            report.started_at.to_rfc3339(),
            report.finished_at.to_rfc3339(),
            report.sources.len() - failed,
            failed,
            report.messages_scanned(),
            report.sightings.len(),
        ],
    )?;
    let run_id = tx.last_insert_rowid();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO sightings
             (run_id, code, provenance_link, source_id, outcome, detail, found_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        let found_at = report.finished_at.to_rfc3339();
        for s in &report.sightings {
            stmt.execute(rusqlite::params![
                run_id,
                s.code,
                s.provenance_link,
                s.source_id,
                s.outcome.label(),
                s.outcome.detail(),
                found_at,
            ])?;
        }
    }
    tx.commit()?;
    Ok(run_id)
}

// ── History ──

pub struct SightingRow {
    pub code: String,
    pub source_id: String,
    pub provenance_link: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub found_at: String,
}

pub fn fetch_recent(conn: &Connection, limit: usize) -> Result<Vec<SightingRow>> {
    let mut stmt = conn.prepare(
        "SELECT code, source_id, provenance_link, outcome, detail, found_at
         FROM sightings
         ORDER BY id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(SightingRow {
                code: row.get(0)?,
                source_id: row.get(1)?,
                provenance_link: row.get(2)?,
                outcome: row.get(3)?,
                detail: row.get(4)?,
                found_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub runs: usize,
    pub last_run: Option<String>,
    pub sightings: usize,
    pub delivered: usize,
    pub delivery_failed: usize,
    pub persist_failed: usize,
    pub source_failures: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let last_run: Option<String> =
        conn.query_row("SELECT MAX(finished_at) FROM runs", [], |r| r.get(0))?;
    let source_failures: usize = conn.query_row(
        "SELECT COALESCE(SUM(sources_failed), 0) FROM runs",
        [],
        |r| r.get(0),
    )?;
    let by_outcome = |outcome: &str| -> rusqlite::Result<usize> {
        conn.query_row(
            "SELECT COUNT(*) FROM sightings WHERE outcome = ?1",
            [outcome],
            |r| r.get(0),
        )
    };
    let delivered = by_outcome("delivered")?;
    let delivery_failed = by_outcome("delivery_failed")?;
    let persist_failed = by_outcome("persist_failed")?;
    Ok(Stats {
        runs,
        last_run,
        sightings: delivered + delivery_failed + persist_failed,
        delivered,
        delivery_failed,
        persist_failed,
        source_failures,
    })
}
