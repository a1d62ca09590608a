//! Reset command implementation

use anyhow::Result;

use crate::store::Store;

pub fn run(store: &Store) -> Result<()> {
    store.reset_schema()?;
    println!("All tables dropped and recreated.");
    Ok(())
}
