//! Repository layer over the durable store.
//!
//! All cross-worker coordination in the pipeline happens here, as atomic
//! conditional updates: claim-a-pending-job, insert-if-hash-absent,
//! create-signal-if-absent, and the signal attempt CAS.

pub mod analysis;
pub mod job;
pub mod record;
pub mod signal;

pub use analysis::AnalysisRepository;
pub use job::JobRepository;
pub use record::RecordRepository;
pub use signal::SignalRepository;
