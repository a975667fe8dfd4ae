//! Main unification pipeline.
//!
//! This module provides the `Pipeline` struct and its builder, which run the
//! stages in order: load sources, merge, deduplicate, filter outliers, enrich
//! and write.

use crate::config::{ConfigValidationError, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::enrich::FeatureEnricher;
use crate::pipeline::merger::RecordMerger;
use crate::pipeline::outliers::OutlierFilter;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::reporting::{CanonicalWriter, RunSummary, SummaryParams, records_to_frame};
use crate::sources::{MappedAdapter, SourceBatch, ingest_source};
use crate::types::EnrichedRecord;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Records written to the dataset, in output order.
    pub records: Vec<EnrichedRecord>,
    pub summary: RunSummary,
    pub output_path: PathBuf,
}

/// The listing unification pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use realty_processing::{Pipeline, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .data_dir("exports")
///     .output_dir("output")
///     .build()?;
///
/// let outcome = Pipeline::builder()
///     .config(config)
///     .on_progress(|update| println!("{}", update.message))
///     .build()?
///     .run()?;
///
/// println!("{} listings written", outcome.records.len());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    adapters: Vec<MappedAdapter>,
    deduplicator: Deduplicator,
    outlier_filter: OutlierFilter,
    enricher: FeatureEnricher,
    writer: CanonicalWriter,
}

// Pipeline is shared by reference with the loader threads
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline over the configured sources and write the output.
    ///
    /// # Errors
    ///
    /// Returns `Err(PipelineError::EmptyResult)` when no record survives.
    /// Failures of individual sources do not abort the run; they are reported
    /// in the summary.
    pub fn run(&self) -> Result<PipelineOutcome> {
        match self.run_internal() {
            Ok(outcome) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Pipeline completed: {} listings written",
                    outcome.records.len()
                )));
                Ok(outcome)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self) -> Result<PipelineOutcome> {
        let start_time = Instant::now();

        info!(
            "Starting unification pipeline ({} sources)...",
            self.adapters.len()
        );
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            1.0,
            format!("{} sources configured", self.adapters.len()),
        ));

        // Step 1: load and normalize every source
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            "Loading sources...",
        ));
        info!("Step 1: Loading sources...");
        let batches = self.load_sources()?;

        // Step 2: merge
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Merging,
            0.0,
            "Merging records...",
        ));
        info!("Step 2: Merging records...");
        let merged = RecordMerger::merge(batches);
        let sources = merged.sources;
        let tally = merged.tally;
        info!(
            "Merged {} records from {} rows",
            merged.records.len(),
            tally.total_ingested()
        );

        // Step 3: deduplicate
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Deduplicating,
            0.0,
            "Removing duplicates...",
        ));
        info!("Step 3: Removing duplicates...");
        let (records, dedup_tally) = self.deduplicator.deduplicate(merged.records);
        info!(
            "Removed {} duplicates, {} records remain",
            dedup_tally.total_dropped(),
            records.len()
        );
        let tally = tally.merge(dedup_tally);

        // Step 4: outliers
        self.report_progress(ProgressUpdate::new(
            PipelineStage::OutlierFiltering,
            0.0,
            "Filtering outliers...",
        ));
        info!("Step 4: Filtering outliers...");
        let (records, outlier_tally) = self.outlier_filter.filter(records);
        info!(
            "Removed {} outliers, {} records remain",
            outlier_tally.total_dropped(),
            records.len()
        );
        let tally = tally.merge(outlier_tally);

        if records.is_empty() {
            return Err(PipelineError::EmptyResult {
                ingested: tally.total_ingested(),
            });
        }

        // Step 5: enrich
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Enriching,
            0.0,
            "Computing derived fields...",
        ));
        info!("Step 5: Computing derived fields...");
        let enriched = self.enricher.enrich(records);

        // Step 6: write
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Writing,
            0.0,
            "Writing output files...",
        ));
        info!("Step 6: Writing output files...");
        let mut frame = records_to_frame(&enriched)?;

        let summary = RunSummary::new(SummaryParams {
            sources: &sources,
            tally: &tally,
            records: &enriched,
            frame: &frame,
            reference_currency: self.config.currency.reference,
            duration: start_time.elapsed(),
            output_file: self.writer.dataset_path(),
            rejections_file: self.writer.rejections_path(),
        });

        if !summary.is_balanced() {
            return Err(PipelineError::Internal(format!(
                "tally does not balance: {} dropped + {} retained != {} ingested",
                summary.totals.dropped, summary.totals.retained, summary.totals.ingested
            )));
        }

        let output_path = self.writer.write_dataset(&mut frame)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Writing,
            0.6,
            "Dataset written",
        ));
        self.writer.write_rejections(tally.rejections())?;
        self.writer.write_summary(&summary)?;

        summary.log();
        info!(
            "Pipeline finished in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );

        Ok(PipelineOutcome {
            records: enriched,
            summary,
            output_path,
        })
    }

    /// Run every adapter on a pool of scoped threads. Workers pull the next
    /// source index from a shared counter.
    fn load_sources(&self) -> Result<Vec<SourceBatch>> {
        let total = self.adapters.len();
        let workers = self.config.effective_workers();
        let next = &AtomicUsize::new(0);
        let finished = &AtomicUsize::new(0);
        debug!("Loading {} sources on {} workers", total, workers);

        let per_worker = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut batches = Vec::new();
                        loop {
                            let priority = next.fetch_add(1, Ordering::SeqCst);
                            let Some(adapter) = self.adapters.get(priority) else {
                                break;
                            };
                            let layout = adapter.layout();
                            let path = self.config.source_path(layout);
                            let batch = ingest_source(adapter, &path, layout.delimiter, priority);

                            let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                            self.report_progress(ProgressUpdate::with_items(
                                PipelineStage::Loading,
                                &batch.source,
                                done,
                                total,
                                format!(
                                    "Loaded {} ({})",
                                    batch.source,
                                    batch.status.as_str()
                                ),
                            ));
                            batches.push(batch);
                        }
                        batches
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().map_err(|_| {
                        PipelineError::Internal("source loader thread panicked".to_string())
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(per_worker.into_iter().flatten().collect())
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during the run.
    ///
    /// Updates for loaded sources arrive from worker threads.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let limits = config.limits();
        let adapters = config
            .sources
            .iter()
            .map(|layout| MappedAdapter::new(layout.clone(), config.currency.clone(), limits))
            .collect();

        let writer = CanonicalWriter::new(
            config.output_dir.clone(),
            config.output_name.clone(),
            config.write_rejections,
        );

        Ok(Pipeline {
            adapters,
            deduplicator: Deduplicator::new(config.dedup.clone()),
            outlier_filter: OutlierFilter::new(config.outliers.clone()),
            enricher: FeatureEnricher::new(config.bands.clone()),
            writer,
            progress_reporter: self.progress_reporter,
            config,
        })
    }
}
