//! Pipeline module.
//!
//! This module provides the unification pipeline and its stages. Every stage
//! takes ownership of its input records and returns the survivors together
//! with a [`Tally`] of what it dropped.

mod builder;
pub mod dedup;
pub mod enrich;
pub mod merger;
pub mod outliers;
pub mod progress;
pub mod tally;

pub use builder::{Pipeline, PipelineBuilder, PipelineOutcome};
pub use dedup::{DedupKey, Deduplicator};
pub use enrich::FeatureEnricher;
pub use merger::{MergedStream, RecordMerger, SourceLoad};
pub use outliers::{OutlierField, OutlierFilter, QuantileBand};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
pub use tally::{DropReason, Rejection, Stage, Tally};
