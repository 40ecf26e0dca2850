//! SQLite snapshot store. A data file holds one cumulative project; every
//! write adds hit counts to what is already on disk, so several processes
//! can save into the same file and the totals are the sum of all runs.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;

use crate::coverage::{ClassSnapshot, ConditionSnapshot, LineSnapshot, ProjectData, ProjectSnapshot};
use crate::error::{CovtrackError, Result};

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = include_str!("../schema.sql");

/// How counters are written by [`save_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Add only the hits recorded since the counters were last loaded or
    /// saved. Used by a live session.
    Delta,
    /// Add every hit in the snapshot. Used to merge one data file into
    /// another.
    Full,
}

/// What a save wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub classes: usize,
    pub lines: usize,
    pub added_hits: u64,
}

/// Open (or create) a data file at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

/// Ensure the schema is initialized. Safe to call on an already-initialized
/// file. Performs forward migrations when the on-disk schema version is
/// older than `SCHEMA_VERSION`.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) if v > SCHEMA_VERSION => {
            return Err(CovtrackError::Other(format!(
                "Data file schema version {} is newer than this binary supports ({}). \
                 Please upgrade covtrack.",
                v, SCHEMA_VERSION
            )));
        }
        Some(v) => migrate(conn, v)?,
    }
    Ok(())
}

/// Apply migrations from `from_version` up to `SCHEMA_VERSION`.
///
/// To add a new migration:
///   1. Bump `SCHEMA_VERSION`.
///   2. Add an arm `N => { ... }` that migrates from version N to N+1.
///   3. Update schema.sql to reflect the final state (new files skip migrations).
#[allow(unused_mut, unused_variables, clippy::never_loop, clippy::match_single_binding)]
fn migrate(conn: &Connection, from_version: u32) -> Result<()> {
    let mut current = from_version;
    while current < SCHEMA_VERSION {
        log::info!(
            "Migrating data file schema from version {} to {}",
            current,
            current + 1
        );
        match current {
            _ => {
                return Err(CovtrackError::Other(format!(
                    "No migration path from schema version {} to {}. \
                     Consider deleting the data file.",
                    current,
                    current + 1
                )));
            }
        }
        #[allow(unreachable_code)]
        {
            current += 1;
            conn.execute("UPDATE schema_version SET version = ?1", params![current])?;
        }
    }
    Ok(())
}

/// Add the counters of `snapshot` to the stored project in one transaction.
pub fn save_snapshot(
    conn: &mut Connection,
    snapshot: &ProjectSnapshot,
    mode: WriteMode,
) -> Result<SaveStats> {
    let tx = conn.transaction()?;
    let stats = save_snapshot_tx(&tx, snapshot, mode)?;
    tx.execute(
        "INSERT INTO snapshot_meta (key, value) VALUES ('saved_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![Utc::now().to_rfc3339()],
    )?;
    tx.commit()?;
    Ok(stats)
}

fn save_snapshot_tx(
    tx: &Transaction,
    snapshot: &ProjectSnapshot,
    mode: WriteMode,
) -> Result<SaveStats> {
    let mut stats = SaveStats::default();

    for class in &snapshot.classes {
        let class_id = upsert_class(tx, class)?;
        stats.classes += 1;

        let mut line_stmt = tx.prepare_cached(
            "INSERT INTO line (class_id, line_number, method_name, method_descriptor, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(class_id, line_number) DO UPDATE SET
                 hit_count = hit_count + excluded.hit_count,
                 method_name = COALESCE(line.method_name, excluded.method_name),
                 method_descriptor = COALESCE(line.method_descriptor, excluded.method_descriptor)",
        )?;
        let mut outcome_stmt = tx.prepare_cached(
            "INSERT INTO condition_outcome (class_id, line_number, condition_index, outcome_index, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(class_id, line_number, condition_index, outcome_index)
             DO UPDATE SET hit_count = hit_count + excluded.hit_count",
        )?;

        for line in &class.lines {
            let hits = match mode {
                WriteMode::Delta => line.unsaved_hits(),
                WriteMode::Full => line.hits,
            };
            line_stmt.execute(params![
                class_id,
                line.number,
                line.method_name,
                line.method_descriptor,
                hits,
            ])?;
            stats.lines += 1;
            stats.added_hits += hits;

            for (condition_index, condition) in line.conditions.iter().enumerate() {
                for outcome_index in 0..condition.outcome_count() {
                    let hits = match mode {
                        WriteMode::Delta => condition.unsaved_hits(outcome_index),
                        WriteMode::Full => condition.hits[outcome_index],
                    };
                    outcome_stmt.execute(params![
                        class_id,
                        line.number,
                        condition_index,
                        outcome_index,
                        hits,
                    ])?;
                }
            }
        }
    }

    Ok(stats)
}

fn upsert_class(tx: &Transaction, class: &ClassSnapshot) -> Result<i64> {
    tx.execute(
        "INSERT INTO class (name, source_file) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET
             source_file = COALESCE(class.source_file, excluded.source_file)",
        params![class.name, class.source_file],
    )?;
    let id: i64 = tx.query_row(
        "SELECT id FROM class WHERE name = ?1",
        params![class.name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Read the whole stored project. Every counter in the result is marked as
/// already saved.
pub fn load_snapshot(conn: &Connection) -> Result<ProjectSnapshot> {
    let mut classes: Vec<ClassSnapshot> = Vec::new();
    let mut index_by_id: HashMap<i64, usize> = HashMap::new();

    {
        let mut stmt = conn.prepare("SELECT id, name, source_file FROM class ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        for row in rows {
            let (id, name, source_file) = row?;
            index_by_id.insert(id, classes.len());
            classes.push(ClassSnapshot {
                name,
                source_file,
                lines: Vec::new(),
            });
        }
    }

    // (class index, line number) -> position in that class's line list
    let mut line_pos: HashMap<(usize, u32), usize> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT class_id, line_number, method_name, method_descriptor, hit_count
             FROM line ORDER BY class_id, line_number",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                LineSnapshot {
                    number: row.get(1)?,
                    method_name: row.get(2)?,
                    method_descriptor: row.get(3)?,
                    hits: row.get(4)?,
                    saved_hits: row.get(4)?,
                    conditions: Vec::new(),
                },
            ))
        })?;
        for row in rows {
            let (class_id, line) = row?;
            let Some(&idx) = index_by_id.get(&class_id) else {
                continue;
            };
            line_pos.insert((idx, line.number), classes[idx].lines.len());
            classes[idx].lines.push(line);
        }
    }

    {
        let mut stmt = conn.prepare(
            "SELECT class_id, line_number, condition_index, outcome_index, hit_count
             FROM condition_outcome
             ORDER BY class_id, line_number, condition_index, outcome_index",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, usize>(2)?,
                row.get::<_, usize>(3)?,
                row.get::<_, u64>(4)?,
            ))
        })?;
        for row in rows {
            let (class_id, line_number, condition_index, outcome_index, hits) = row?;
            let Some(&idx) = index_by_id.get(&class_id) else {
                continue;
            };
            let Some(&pos) = line_pos.get(&(idx, line_number)) else {
                continue;
            };
            let line = &mut classes[idx].lines[pos];
            if line.conditions.len() <= condition_index {
                line.conditions
                    .resize_with(condition_index + 1, ConditionSnapshot::default);
            }
            let condition = &mut line.conditions[condition_index];
            if condition.hits.len() <= outcome_index {
                condition.hits.resize(outcome_index + 1, 0);
                condition.saved.resize(outcome_index + 1, 0);
            }
            condition.hits[outcome_index] = hits;
            condition.saved[outcome_index] = hits;
        }
    }

    Ok(ProjectSnapshot { classes })
}

/// Load the project stored at `path`. A missing file is `Ok(None)`.
pub fn load_project(path: &Path) -> Result<Option<ProjectData>> {
    if !path.is_file() {
        return Ok(None);
    }
    let conn = open(path)?;
    init_schema(&conn)?;
    let snapshot = load_snapshot(&conn)?;
    Ok(Some(ProjectData::from_snapshot(&snapshot)))
}

/// Timestamp of the last save into this file, if any.
pub fn saved_at(conn: &Connection) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM snapshot_meta WHERE key = 'saved_at'",
            [],
            |row| row.get(0),
        )
        .optional()?)
}

/// Add every counter stored in `source` to the data file at `target`,
/// creating it if needed.
pub fn merge_files(source: &Path, target: &Path) -> Result<SaveStats> {
    let project = load_project(source)?.ok_or_else(|| {
        CovtrackError::Other(format!("Data file not found: {}", source.display()))
    })?;
    let mut conn = open(target)?;
    init_schema(&conn)?;
    save_snapshot(&mut conn, &project.snapshot(), WriteMode::Full)
}
