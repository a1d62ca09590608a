//! Dimension and fact row construction
//!
//! Reshapes extracted records into the star-schema rows the bulk loader
//! consumes. Dimension batches are deduplicated on their identity key here,
//! before loading — the merge step relies on staged batches being
//! key-unique. Fact rows are never deduplicated: every qualifying event
//! becomes exactly one songplay row with a fresh UUID.

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};
use rusqlite::types::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::extract::{LogEvent, SongRecord};
use crate::store::{self, ResolvedIds, SongTriple, TableDef, TableRow, TripleKey};

#[derive(Debug, Clone)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: Option<i32>,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct TimeRow {
    pub start_time: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    /// ISO 8601 week number; can be 52/53 in the first days of January.
    pub week_of_year: u32,
    pub month: u32,
    pub year: i32,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u32,
}

#[derive(Debug, Clone)]
pub struct SongplayRow {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub user_id: String,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// Artist dimension rows, deduplicated by artist_id.
pub fn artist_rows(records: &[SongRecord]) -> Vec<ArtistRow> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.artist_id.clone()))
        .map(|r| ArtistRow {
            artist_id: r.artist_id.clone(),
            name: r.artist_name.clone(),
            location: r.artist_location.clone(),
            latitude: r.artist_latitude,
            longitude: r.artist_longitude,
        })
        .collect()
}

/// Song dimension rows, deduplicated by song_id; year 0 means unknown.
pub fn song_rows(records: &[SongRecord]) -> Vec<SongRow> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.song_id.clone()))
        .map(|r| SongRow {
            song_id: r.song_id.clone(),
            title: r.title.clone(),
            artist_id: r.artist_id.clone(),
            year: if r.year == 0 { None } else { Some(r.year) },
            duration: r.duration,
        })
        .collect()
}

/// User dimension rows, one per user_id. The last event in the batch wins,
/// so `level` reflects the user's most recent state.
pub fn user_rows(events: &[LogEvent]) -> Vec<UserRow> {
    let mut by_id: HashMap<String, UserRow> = HashMap::new();
    for event in events {
        by_id.insert(
            event.user_id.clone(),
            UserRow {
                user_id: event.user_id.clone(),
                first_name: event.first_name.clone(),
                last_name: event.last_name.clone(),
                gender: event.gender.clone(),
                level: event.level.clone(),
            },
        );
    }
    by_id.into_values().collect()
}

/// Time dimension rows, one per distinct timestamp in the batch.
pub fn time_rows(events: &[LogEvent]) -> Vec<TimeRow> {
    let mut seen = HashSet::new();
    let mut rows = vec![];
    for event in events {
        if !seen.insert(event.ts) {
            continue;
        }
        let start_time = event_time(event.ts);
        rows.push(TimeRow {
            start_time,
            hour: start_time.hour(),
            day: start_time.day(),
            week_of_year: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().num_days_from_monday(),
        });
    }
    rows
}

/// Distinct (song, artist, length) triples present in the batch, for the
/// batched identity-resolution query. Events missing any of the three
/// attributes cannot resolve and are not looked up.
pub fn distinct_triples(events: &[LogEvent]) -> Vec<SongTriple> {
    let mut seen = HashSet::new();
    let mut triples = vec![];
    for event in events {
        let (Some(song), Some(artist), Some(length)) = (&event.song, &event.artist, event.length)
        else {
            continue;
        };
        if seen.insert(TripleKey::new(song, artist, length)) {
            triples.push(SongTriple {
                title: song.clone(),
                artist: artist.clone(),
                duration: length,
            });
        }
    }
    triples
}

/// Fact rows: one per event, left-joined onto the resolver's results.
/// Unresolved events keep NULL song/artist ids — the common case.
pub fn songplay_rows(
    events: &[LogEvent],
    resolved: &HashMap<TripleKey, ResolvedIds>,
) -> Vec<SongplayRow> {
    events
        .iter()
        .map(|event| {
            let ids = match (&event.song, &event.artist, event.length) {
                (Some(song), Some(artist), Some(length)) => {
                    resolved.get(&TripleKey::new(song, artist, length))
                }
                _ => None,
            };
            SongplayRow {
                id: Uuid::new_v4().to_string(),
                start_time: event_time(event.ts),
                user_id: event.user_id.clone(),
                level: event.level.clone(),
                song_id: ids.map(|i| i.song_id.clone()),
                artist_id: ids.map(|i| i.artist_id.clone()),
                session_id: event.session_id,
                location: event.location.clone(),
                user_agent: event.user_agent.as_deref().map(clean_user_agent),
            }
        })
        .collect()
}

/// Strip literal double quotes from a raw user-agent string.
pub fn clean_user_agent(raw: &str) -> String {
    raw.replace('"', "")
}

/// Epoch milliseconds to UTC. Values outside chrono's representable range
/// clamp to the epoch; real log data sits nowhere near the limits.
fn event_time(ts_millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts_millis).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Timestamp text stored in the time and songplays tables.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn opt_text(value: &Option<String>) -> Value {
    match value {
        Some(v) => Value::Text(v.clone()),
        None => Value::Null,
    }
}

fn opt_real(value: Option<f64>) -> Value {
    match value {
        Some(v) => Value::Real(v),
        None => Value::Null,
    }
}

impl TableRow for ArtistRow {
    fn table() -> &'static TableDef {
        &store::ARTISTS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.artist_id.clone()),
            Value::Text(self.name.clone()),
            opt_text(&self.location),
            opt_real(self.latitude),
            opt_real(self.longitude),
        ]
    }
}

impl TableRow for SongRow {
    fn table() -> &'static TableDef {
        &store::SONGS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.song_id.clone()),
            Value::Text(self.title.clone()),
            Value::Text(self.artist_id.clone()),
            match self.year {
                Some(y) => Value::Integer(y as i64),
                None => Value::Null,
            },
            Value::Real(self.duration),
        ]
    }
}

impl TableRow for UserRow {
    fn table() -> &'static TableDef {
        &store::USERS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.user_id.clone()),
            opt_text(&self.first_name),
            opt_text(&self.last_name),
            opt_text(&self.gender),
            Value::Text(self.level.clone()),
        ]
    }
}

impl TableRow for TimeRow {
    fn table() -> &'static TableDef {
        &store::TIME
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(format_ts(&self.start_time)),
            Value::Integer(self.hour as i64),
            Value::Integer(self.day as i64),
            Value::Integer(self.week_of_year as i64),
            Value::Integer(self.month as i64),
            Value::Integer(self.year as i64),
            Value::Integer(self.weekday as i64),
        ]
    }
}

impl TableRow for SongplayRow {
    fn table() -> &'static TableDef {
        &store::SONGPLAYS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(format_ts(&self.start_time)),
            Value::Text(self.user_id.clone()),
            Value::Text(self.level.clone()),
            opt_text(&self.song_id),
            opt_text(&self.artist_id),
            Value::Integer(self.session_id),
            opt_text(&self.location),
            opt_text(&self.user_agent),
        ]
    }
}
