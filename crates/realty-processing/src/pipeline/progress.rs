//! Progress reporting for the unification pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use realty_processing::Pipeline;
//!
//! let outcome = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the unification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Validating configuration and building adapters
    Initializing,
    /// Reading and normalizing source files
    Loading,
    /// Concatenating source batches
    Merging,
    /// Collapsing duplicate listings
    Deduplicating,
    /// Trimming stratified percentile outliers
    OutlierFiltering,
    /// Computing derived fields
    Enriching,
    /// Writing the canonical dataset and summary
    Writing,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Loading => "Loading Sources",
            Self::Merging => "Merging Records",
            Self::Deduplicating => "Removing Duplicates",
            Self::OutlierFiltering => "Filtering Outliers",
            Self::Enriching => "Enriching Records",
            Self::Writing => "Writing Output",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the whole run spent in this stage. Sums to 1.0 over the
    /// working stages.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Loading => 0.55,
            Self::Merging => 0.03,
            Self::Deduplicating => 0.10,
            Self::OutlierFiltering => 0.10,
            Self::Enriching => 0.05,
            Self::Writing => 0.15,
            Self::Complete => 0.0,
            Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Loading => 0.02,
            Self::Merging => 0.57,
            Self::Deduplicating => 0.60,
            Self::OutlierFiltering => 0.70,
            Self::Enriching => 0.80,
            Self::Writing => 0.85,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update sent to a [`ProgressReporter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Optional detail, e.g. the source being loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Update with item counts, e.g. sources loaded so far.
    pub fn with_items(
        stage: PipelineStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            sub_stage: Some(sub_stage.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            progress: 1.0,
            stage_progress: 1.0,
            ..Self::new(PipelineStage::Complete, 1.0, message)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, 0.0, message)
    }
}

/// Receives progress updates during a run.
///
/// Updates may arrive from worker threads while sources load, so
/// implementations must be `Send + Sync`.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(PipelineStage::Loading, 0.5, "Loading");
        assert_eq!(update.stage, PipelineStage::Loading);
        assert!((update.progress - 0.295).abs() < 1e-6);
        assert_eq!(update.stage_progress, 0.5);
        assert!(update.sub_stage.is_none());
    }

    #[test]
    fn test_progress_update_with_items() {
        let update =
            ProgressUpdate::with_items(PipelineStage::Loading, "mulk", 4, 16, "Loaded mulk");
        assert_eq!(update.items_processed, Some(4));
        assert_eq!(update.items_total, Some(16));
        assert_eq!(update.stage_progress, 0.25);
        assert_eq!(update.sub_stage.as_deref(), Some("mulk"));
    }

    #[test]
    fn test_progress_update_complete() {
        let update = ProgressUpdate::complete("Done");
        assert_eq!(update.stage, PipelineStage::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = [
            PipelineStage::Initializing,
            PipelineStage::Loading,
            PipelineStage::Merging,
            PipelineStage::Deduplicating,
            PipelineStage::OutlierFiltering,
            PipelineStage::Enriching,
            PipelineStage::Writing,
        ];
        let total: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-4);

        // each stage starts where the previous one ends
        for pair in stages.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!((end - pair[1].base_progress()).abs() < 1e-4);
        }
    }

    #[test]
    fn test_closure_progress_reporter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage);
        });

        reporter.report(ProgressUpdate::new(PipelineStage::Merging, 0.0, "x"));
        reporter.report(ProgressUpdate::failed("boom"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PipelineStage::Merging, PipelineStage::Failed]
        );
    }

    #[test]
    fn test_stage_json_values() {
        let json = serde_json::to_string(&PipelineStage::OutlierFiltering).unwrap();
        assert_eq!(json, "\"outlier_filtering\"");
        assert_eq!(PipelineStage::Writing.display_name(), "Writing Output");
    }
}
