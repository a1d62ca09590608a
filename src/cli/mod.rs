//! CLI command handlers

pub mod reset;
pub mod run;
pub mod stats;
