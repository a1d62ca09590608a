//! Stats command implementation

use anyhow::Result;

use crate::store::{Store, ALL_TABLES};

pub fn run(store: &Store) -> Result<()> {
    println!("{:<12} {:>10}", "Table", "Rows");
    println!("{}", "-".repeat(23));
    for table in ALL_TABLES {
        println!("{:<12} {:>10}", table.name, store.table_count(table)?);
    }
    Ok(())
}
