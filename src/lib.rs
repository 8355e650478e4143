// src/lib.rs
pub mod config;
pub mod geo;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod results;
pub mod sink;
pub mod source;

// Re-export common types for easier access
pub use config::ReconcileConfig;
pub use models::{CanonicalEntity, CanonicalEntityId, MatchResult, MatchTier, ScrapedRecord};

// Re-export important functionality
pub use pipeline::{resolve, run, RunOutcome};
pub use sink::{BatchedWriter, CellWrite, MemorySink, ResultSink};
pub use source::{RecordSource, RunInput};
