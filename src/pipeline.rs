//! Pipeline orchestration
//!
//! Strictly sequential: the song tree is processed before the log tree, and
//! each file runs extract → transform → resolve → load inside its own
//! transaction, committed before the next file starts. A mid-run abort
//! therefore leaves every already-processed file durably loaded and the rest
//! untouched — the run is resumable at file granularity.

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::EtlError;
use crate::extract;
use crate::store::{ConflictPolicy, Store, StoreTx};
use crate::transform;

/// Full ETL pass: song metadata first (so identity resolution for the logs
/// can see the catalog loaded in the same run), then activity logs.
pub fn run(store: &mut Store, song_dir: &Path, log_dir: &Path, keep_going: bool) -> Result<()> {
    process_tree(store, song_dir, process_song_file, keep_going)?;
    process_tree(store, log_dir, process_log_file, keep_going)?;
    Ok(())
}

/// Recursively collect `*.json` files, sorted for reproducible runs.
fn discover_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    files.sort();
    files
}

fn process_tree(
    store: &mut Store,
    dir: &Path,
    process: fn(&StoreTx, &Path) -> Result<(), EtlError>,
    keep_going: bool,
) -> Result<()> {
    let files = discover_json_files(dir);
    println!("{} files found in {}", files.len(), dir.display());

    for (i, file) in files.iter().enumerate() {
        let tx = store.transaction()?;
        match process(&tx, file) {
            Ok(()) => tx.commit()?,
            Err(err) if keep_going => {
                // Dropping the transaction rolls back everything staged for
                // this file; nothing partial reaches the target tables.
                drop(tx);
                eprintln!("skipping {}: {}", file.display(), err);
                continue;
            }
            Err(err) => return Err(err.into()),
        }
        println!("{}/{} files processed.", i + 1, files.len());
    }
    Ok(())
}

fn process_song_file(tx: &StoreTx, path: &Path) -> Result<(), EtlError> {
    let records = extract::read_song_file(path)?;
    tx.load(&transform::artist_rows(&records), ConflictPolicy::Ignore)?;
    tx.load(&transform::song_rows(&records), ConflictPolicy::Ignore)?;
    Ok(())
}

fn process_log_file(tx: &StoreTx, path: &Path) -> Result<(), EtlError> {
    let events = extract::read_log_file(path)?;

    tx.load(&transform::time_rows(&events), ConflictPolicy::Ignore)?;
    tx.load(
        &transform::user_rows(&events),
        ConflictPolicy::Update { columns: &["level"] },
    )?;

    let resolved = tx.resolve_song_ids(&transform::distinct_triples(&events))?;
    tx.load(
        &transform::songplay_rows(&events, &resolved),
        ConflictPolicy::Ignore,
    )?;
    Ok(())
}
