//! External collaborator interfaces.
//!
//! The extraction and analysis engines live outside this system and are
//! consumed through narrow trait contracts; the workers never see past them.

pub mod analyzer;
pub mod extractor;

pub use analyzer::{AnalysisOutcome, AnalyzeError, Analyzer, DatasetRecord, VolumeAnalyzer};
pub use extractor::{ExtractError, Extractor, HttpExtractor};
