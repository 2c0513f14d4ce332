//! SeaORM entity models for the durable store.

pub mod analysis_result;
pub mod job;
pub mod record;
pub mod signal;
