//! Star-schema definition
//!
//! Each table is described by a `TableDef` so the bulk loader can clone a
//! target's column structure (constraints included) into its staging table.
//! DDL runs with CREATE TABLE IF NOT EXISTS, so opening a store is idempotent.

/// Definition of one target table.
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    /// Conflict target for the merge step (the dedup key from the data model).
    pub key: &'static str,
    /// Parenthesized column/constraint body, shared by the real table and its
    /// staging clone.
    pub body: &'static str,
}

pub const ARTISTS: TableDef = TableDef {
    name: "artists",
    columns: &["artist_id", "name", "location", "latitude", "longitude"],
    key: "artist_id",
    body: "(
        artist_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        location TEXT,
        latitude REAL,
        longitude REAL
    )",
};

pub const SONGS: TableDef = TableDef {
    name: "songs",
    columns: &["song_id", "title", "artist_id", "year", "duration"],
    key: "song_id",
    body: "(
        song_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        artist_id TEXT NOT NULL,
        year INTEGER,                          -- NULL = unknown (source encodes as 0)
        duration REAL NOT NULL
    )",
};

pub const USERS: TableDef = TableDef {
    name: "users",
    columns: &["user_id", "first_name", "last_name", "gender", "level"],
    key: "user_id",
    body: "(
        user_id TEXT PRIMARY KEY,
        first_name TEXT,
        last_name TEXT,
        gender TEXT,
        level TEXT NOT NULL                    -- 'free' | 'paid', mutable across runs
    )",
};

pub const TIME: TableDef = TableDef {
    name: "time",
    columns: &[
        "start_time",
        "hour",
        "day",
        "week_of_year",
        "month",
        "year",
        "weekday",
    ],
    key: "start_time",
    body: "(
        start_time TEXT PRIMARY KEY,           -- RFC 3339, millisecond precision
        hour INTEGER NOT NULL,
        day INTEGER NOT NULL,
        week_of_year INTEGER NOT NULL,         -- ISO 8601 week number
        month INTEGER NOT NULL,
        year INTEGER NOT NULL,
        weekday INTEGER NOT NULL               -- 0 = Monday
    )",
};

pub const SONGPLAYS: TableDef = TableDef {
    name: "songplays",
    columns: &[
        "id",
        "start_time",
        "user_id",
        "level",
        "song_id",
        "artist_id",
        "session_id",
        "location",
        "user_agent",
    ],
    key: "id",
    body: "(
        id TEXT PRIMARY KEY,                   -- UUID, generated per event
        start_time TEXT NOT NULL,
        user_id TEXT NOT NULL,
        level TEXT NOT NULL,
        song_id TEXT,                          -- NULL when resolution found no match
        artist_id TEXT,
        session_id INTEGER NOT NULL,
        location TEXT,
        user_agent TEXT
    )",
};

/// All tables, in creation order.
pub const ALL_TABLES: &[&TableDef] = &[&ARTISTS, &SONGS, &USERS, &TIME, &SONGPLAYS];

/// Secondary indexes, created after the tables.
pub const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_songs_title ON songs(title);
CREATE INDEX IF NOT EXISTS idx_artists_name ON artists(name);
CREATE INDEX IF NOT EXISTS idx_songplays_start_time ON songplays(start_time);
"#;
