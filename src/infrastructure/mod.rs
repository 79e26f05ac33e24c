pub mod config;
pub mod error;
pub mod snapshot_store;
pub mod storage;
