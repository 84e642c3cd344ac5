pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod metadata;
pub mod naming;
pub mod parse;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{ConfigError, StorageError, SyncError};
