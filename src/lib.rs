pub mod api;
pub mod config;
pub mod db;
pub mod ingest;
pub mod monitor;
pub mod ports;
pub mod reading_cache;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;
