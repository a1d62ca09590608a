//! Relational store: SQLite-backed star schema with a staged bulk loader
//!
//! The store owns the connection and the schema. All writes happen through a
//! `StoreTx`, so commit-per-file is explicit at the call site: the pipeline
//! opens one transaction per input file and either commits the whole file's
//! batches or rolls everything back.

mod schema;

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};
use std::collections::HashMap;
use std::path::Path;

use crate::error::EtlError;

pub use schema::{TableDef, ALL_TABLES, ARTISTS, SONGPLAYS, SONGS, TIME, USERS};

/// Name of the transaction-scoped staging table used by the bulk loader.
const STAGING_TABLE: &str = "staging";

/// How the merge step treats a primary-key conflict.
#[derive(Debug, Clone, Copy)]
pub enum ConflictPolicy {
    /// Duplicate-key rows from the batch are silently dropped.
    Ignore,
    /// Duplicate-key rows overwrite only the named columns of the stored row.
    Update { columns: &'static [&'static str] },
}

/// A batch row that knows its target table and its column values.
pub trait TableRow {
    fn table() -> &'static TableDef;
    fn values(&self) -> Vec<Value>;
}

/// Distinct (title, artist name, duration) combination from a log batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SongTriple {
    pub title: String,
    pub artist: String,
    pub duration: f64,
}

impl SongTriple {
    pub fn key(&self) -> TripleKey {
        TripleKey::new(&self.title, &self.artist, self.duration)
    }
}

/// Hashable lookup key for a triple. Duration is keyed by its bit pattern so
/// in-memory equality matches the stored REAL column exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleKey {
    title: String,
    artist: String,
    duration_bits: u64,
}

impl TripleKey {
    pub fn new(title: &str, artist: &str, duration: f64) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            duration_bits: duration.to_bits(),
        }
    }
}

/// Identifiers returned by identity resolution.
#[derive(Debug, Clone)]
pub struct ResolvedIds {
    pub song_id: String,
    pub artist_id: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, for tests and ad-hoc runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        for table in ALL_TABLES {
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} {}",
                table.name, table.body
            ))?;
        }
        self.conn.execute_batch(schema::INDEXES)?;
        Ok(())
    }

    /// Drop and recreate every table.
    pub fn reset_schema(&self) -> Result<()> {
        for table in ALL_TABLES.iter().rev() {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {}", table.name))?;
        }
        self.init_schema()
    }

    pub fn table_count(&self, table: &TableDef) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Start a transaction covering one input file's batches.
    pub fn transaction(&mut self) -> Result<StoreTx<'_>> {
        Ok(StoreTx {
            tx: self.conn.transaction()?,
        })
    }
}

pub struct StoreTx<'a> {
    tx: Transaction<'a>,
}

impl StoreTx<'_> {
    /// Merge a batch of rows into its target table.
    ///
    /// Staged protocol: clone the target's column structure into a temp
    /// table, bulk-insert the batch (SQL NULL marks absent values), merge
    /// with the requested conflict policy, drop the temp table. The caller's
    /// transaction makes the whole sequence atomic; rows must already be
    /// deduplicated on the table's key.
    pub fn load<R: TableRow>(&self, rows: &[R], policy: ConflictPolicy) -> Result<(), EtlError> {
        let table = R::table();
        if rows.is_empty() {
            return Ok(());
        }

        let name = table.name;
        let wrap = move |source| EtlError::Load {
            table: name,
            source,
        };

        self.tx
            .execute_batch(&format!("CREATE TEMP TABLE {STAGING_TABLE} {}", table.body))
            .map_err(wrap)?;

        let placeholders = vec!["?"; table.columns.len()].join(", ");
        let insert = format!("INSERT INTO {STAGING_TABLE} VALUES ({placeholders})");
        let mut stmt = self.tx.prepare(&insert).map_err(wrap)?;
        for row in rows {
            stmt.execute(params_from_iter(row.values())).map_err(wrap)?;
        }
        drop(stmt);

        // WHERE TRUE disambiguates the upsert clause from a join ON.
        let merge = match policy {
            ConflictPolicy::Ignore => format!(
                "INSERT INTO {name} SELECT * FROM {STAGING_TABLE} WHERE TRUE \
                 ON CONFLICT DO NOTHING"
            ),
            ConflictPolicy::Update { columns } => {
                let assignments = columns
                    .iter()
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "INSERT INTO {name} SELECT * FROM {STAGING_TABLE} WHERE TRUE \
                     ON CONFLICT({}) DO UPDATE SET {assignments}",
                    table.key
                )
            }
        };
        self.tx.execute(&merge, []).map_err(wrap)?;

        self.tx
            .execute(&format!("DROP TABLE {STAGING_TABLE}"), [])
            .map_err(wrap)?;
        Ok(())
    }

    /// Resolve song/artist identifiers for a batch of distinct triples.
    ///
    /// One query for the whole batch: the triples are joined as a VALUES list
    /// against songs and artists with exact equality on title, artist name,
    /// and duration. Triples with no stored match are simply absent from the
    /// result map.
    pub fn resolve_song_ids(
        &self,
        triples: &[SongTriple],
    ) -> Result<HashMap<TripleKey, ResolvedIds>, EtlError> {
        let mut resolved = HashMap::new();
        if triples.is_empty() {
            return Ok(resolved);
        }

        let wrap = |source| EtlError::Resolve { source };

        let placeholders = vec!["(?, ?, ?)"; triples.len()].join(", ");
        let sql = format!(
            "SELECT s.song_id, s.artist_id, s.title, a.name, s.duration
             FROM (VALUES {placeholders}) AS v
             JOIN songs s ON s.title = v.column1 AND s.duration = v.column3
             JOIN artists a ON a.artist_id = s.artist_id AND a.name = v.column2"
        );

        let mut params: Vec<Value> = Vec::with_capacity(triples.len() * 3);
        for triple in triples {
            params.push(Value::Text(triple.title.clone()));
            params.push(Value::Text(triple.artist.clone()));
            params.push(Value::Real(triple.duration));
        }

        let mut stmt = self.tx.prepare(&sql).map_err(wrap)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .map_err(wrap)?;

        for row in rows {
            let (song_id, artist_id, title, artist, duration) = row.map_err(wrap)?;
            resolved.insert(
                TripleKey::new(&title, &artist, duration),
                ResolvedIds { song_id, artist_id },
            );
        }
        Ok(resolved)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{ArtistRow, SongRow, UserRow};

    fn artist(id: &str, name: &str) -> ArtistRow {
        ArtistRow {
            artist_id: id.to_string(),
            name: name.to_string(),
            location: None,
            latitude: None,
            longitude: None,
        }
    }

    fn song(id: &str, title: &str, artist_id: &str, duration: f64) -> SongRow {
        SongRow {
            song_id: id.to_string(),
            title: title.to_string(),
            artist_id: artist_id.to_string(),
            year: Some(1999),
            duration,
        }
    }

    fn user(id: &str, level: &str) -> UserRow {
        UserRow {
            user_id: id.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            gender: Some("F".to_string()),
            level: level.to_string(),
        }
    }

    #[test]
    fn dimension_load_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = vec![artist("A1", "Artist X"), artist("A2", "Artist Y")];

        for _ in 0..2 {
            let tx = store.transaction().unwrap();
            tx.load(&batch, ConflictPolicy::Ignore).unwrap();
            tx.commit().unwrap();
        }

        assert_eq!(store.table_count(&ARTISTS).unwrap(), 2);
    }

    #[test]
    fn user_level_is_overwritten_on_reload() {
        let mut store = Store::open_in_memory().unwrap();
        let policy = ConflictPolicy::Update { columns: &["level"] };

        let tx = store.transaction().unwrap();
        tx.load(&[user("U1", "free")], policy).unwrap();
        tx.commit().unwrap();

        let tx = store.transaction().unwrap();
        tx.load(&[user("U1", "paid")], policy).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.table_count(&USERS).unwrap(), 1);
        let level: String = store
            .conn
            .query_row("SELECT level FROM users WHERE user_id = 'U1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(level, "paid");
    }

    #[test]
    fn resolution_requires_exact_duration_match() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.transaction().unwrap();
        tx.load(&[artist("A1", "Artist X")], ConflictPolicy::Ignore)
            .unwrap();
        tx.load(&[song("S1", "Song A", "A1", 180.0)], ConflictPolicy::Ignore)
            .unwrap();

        let exact = SongTriple {
            title: "Song A".to_string(),
            artist: "Artist X".to_string(),
            duration: 180.0,
        };
        let near_miss = SongTriple {
            duration: 180.01,
            ..exact.clone()
        };

        let resolved = tx
            .resolve_song_ids(&[exact.clone(), near_miss.clone()])
            .unwrap();
        assert_eq!(resolved.len(), 1);
        let ids = resolved.get(&exact.key()).unwrap();
        assert_eq!(ids.song_id, "S1");
        assert_eq!(ids.artist_id, "A1");
        assert!(resolved.get(&near_miss.key()).is_none());
    }

    #[test]
    fn resolution_of_empty_batch_skips_the_query() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.transaction().unwrap();
        // An empty VALUES list would be a syntax error, so this only passes
        // if the short-circuit path is taken.
        let resolved = tx.resolve_song_ids(&[]).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn resolution_joins_artist_name_not_just_id() {
        let mut store = Store::open_in_memory().unwrap();
        let tx = store.transaction().unwrap();
        tx.load(&[artist("A1", "Artist X")], ConflictPolicy::Ignore)
            .unwrap();
        tx.load(&[song("S1", "Song A", "A1", 180.0)], ConflictPolicy::Ignore)
            .unwrap();

        let wrong_artist = SongTriple {
            title: "Song A".to_string(),
            artist: "Artist Z".to_string(),
            duration: 180.0,
        };
        let resolved = tx.resolve_song_ids(&[wrong_artist]).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn failed_load_rolls_back_with_the_transaction() {
        let mut store = Store::open_in_memory().unwrap();

        let tx = store.transaction().unwrap();
        tx.load(&[artist("A1", "Artist X")], ConflictPolicy::Ignore)
            .unwrap();
        drop(tx); // rollback

        assert_eq!(store.table_count(&ARTISTS).unwrap(), 0);
    }
}
