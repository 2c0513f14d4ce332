//! # Watchtower Pipeline Library
//!
//! Job orchestration and ledger signal relay: ingested records are
//! deduplicated by content hash, analyzed through asynchronous jobs, and
//! high-severity outcomes are relayed to an external distributed ledger as
//! signed, verifiable signals.

pub mod auth;
pub mod collaborators;
pub mod config;
pub mod cursor;
pub mod db;
pub mod domain;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod oracle;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub mod workers;
pub use migration;
