//! Run command implementation

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::pipeline;
use crate::store::Store;

pub fn run(
    store: &mut Store,
    config: &Config,
    song_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    keep_going: bool,
) -> Result<()> {
    let song_dir = song_dir.unwrap_or_else(|| config.song_dir());
    let log_dir = log_dir.unwrap_or_else(|| config.log_dir());
    let keep_going = keep_going || config.etl.continue_on_error;

    pipeline::run(store, &song_dir, &log_dir, keep_going)?;
    println!("ETL run complete.");
    Ok(())
}
