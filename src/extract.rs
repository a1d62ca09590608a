//! Record extraction from line-delimited JSON files
//!
//! Pure parsing, no side effects. Song files carry one record per line with
//! song and artist metadata; log files carry one activity event per line, of
//! which only `page == "NextSong"` events are kept. A malformed line is a
//! typed error rather than a silent skip — whether that aborts the run is the
//! pipeline's decision.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::EtlError;

/// One record from a song metadata file.
#[derive(Debug, Clone, Deserialize)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub duration: f64,
    /// Source data encodes an unknown year as 0.
    pub year: i32,
    pub artist_id: String,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
}

/// One event from an activity log file.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEvent {
    pub artist: Option<String>,
    pub song: Option<String>,
    /// Play duration in seconds, as recorded by the client.
    pub length: Option<f64>,
    pub page: String,
    pub level: String,
    pub location: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: i64,
    /// Logs encode the user id as a number or a string (empty when logged
    /// out), so accept both.
    #[serde(rename = "userId", deserialize_with = "string_or_number", default)]
    pub user_id: String,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    pub gender: Option<String>,
    /// Event timestamp, epoch milliseconds.
    pub ts: i64,
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => s,
        Some(Raw::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

/// Parse every record of a song metadata file.
pub fn read_song_file(path: &Path) -> Result<Vec<SongRecord>, EtlError> {
    read_records(path)
}

/// Parse a log file, keeping only NextSong events.
pub fn read_log_file(path: &Path) -> Result<Vec<LogEvent>, EtlError> {
    let events: Vec<LogEvent> = read_records(path)?;
    Ok(events
        .into_iter()
        .filter(|event| event.page == "NextSong")
        .collect())
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, EtlError> {
    let open_err = |source| EtlError::Open {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(open_err)?;
    let reader = BufReader::new(file);

    let mut records = vec![];
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(open_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| EtlError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn log_line(page: &str, song: &str) -> String {
        format!(
            r#"{{"artist":"Artist X","song":"{song}","length":180.0,"page":"{page}","level":"free","location":"NYC","sessionId":42,"userId":"7","firstName":"Ada","lastName":"Lovelace","gender":"F","ts":1541990000000,"userAgent":"Mozilla/5.0"}}"#
        )
    }

    #[test]
    fn log_file_keeps_only_nextsong_events() {
        let dir = TempDir::new().unwrap();
        let mut lines = vec![];
        for i in 0..7 {
            lines.push(log_line("NextSong", &format!("Song {i}")));
        }
        lines.push(log_line("Home", "-"));
        lines.push(log_line("Login", "-"));
        lines.push(log_line("Logout", "-"));
        let path = write_file(&dir, "events.json", &lines.join("\n"));

        let events = read_log_file(&path).unwrap();
        assert_eq!(events.len(), 7);
        assert!(events.iter().all(|e| e.page == "NextSong"));
    }

    #[test]
    fn user_id_accepts_number_and_string() {
        let dir = TempDir::new().unwrap();
        let numeric = log_line("NextSong", "Song A").replace(r#""userId":"7""#, r#""userId":7"#);
        let path = write_file(
            &dir,
            "events.json",
            &format!("{}\n{}", numeric, log_line("NextSong", "Song B")),
        );

        let events = read_log_file(&path).unwrap();
        assert_eq!(events[0].user_id, "7");
        assert_eq!(events[1].user_id, "7");
    }

    #[test]
    fn song_file_parses_nullable_artist_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "song.json",
            r#"{"song_id":"S1","title":"Song A","duration":180.0,"year":0,"artist_id":"A1","artist_name":"Artist X","artist_location":null,"artist_latitude":null,"artist_longitude":null}"#,
        );

        let records = read_song_file(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].song_id, "S1");
        assert_eq!(records[0].year, 0);
        assert!(records[0].artist_latitude.is_none());
    }

    #[test]
    fn malformed_line_reports_path_and_line_number() {
        let dir = TempDir::new().unwrap();
        let content = format!("{}\nnot json at all", log_line("NextSong", "Song A"));
        let path = write_file(&dir, "events.json", &content);

        let err = read_log_file(&path).unwrap_err();
        match err {
            EtlError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = read_song_file(Path::new("/nonexistent/song.json")).unwrap_err();
        assert!(matches!(err, EtlError::Open { .. }));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let content = format!("{}\n\n{}\n", log_line("NextSong", "A"), log_line("NextSong", "B"));
        let path = write_file(&dir, "events.json", &content);

        assert_eq!(read_log_file(&path).unwrap().len(), 2);
    }
}
