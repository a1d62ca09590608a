pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod store;
pub mod transform;

pub use config::Config;
pub use error::EtlError;
pub use store::Store;
