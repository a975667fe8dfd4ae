use crate::normalizer::Currency;
use crate::pipeline::merger::SourceLoad;
use crate::pipeline::tally::{Stage, Tally};
use crate::sources::SourceStatus;
use crate::types::EnrichedRecord;
use chrono::Local;
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Per-source line of the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub file: PathBuf,
    pub priority: usize,
    #[serde(flatten)]
    pub status: SourceStatus,
    pub rows_read: usize,
    /// Rows that became valid records.
    pub rows_accepted: usize,
    /// Rows dropped at any stage.
    pub rows_dropped: usize,
    /// Rows present in the output.
    pub rows_retained: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub ingested: usize,
    pub dropped: usize,
    pub retained: usize,
}

/// Share of non-null cells of one output column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCompleteness {
    pub column: String,
    pub non_null: usize,
    pub percent: f64,
}

/// Counts describing one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub duration_ms: u64,
    pub reference_currency: Currency,
    pub sources: Vec<SourceReport>,
    pub totals: RunTotals,
    pub dropped_by_reason: BTreeMap<String, usize>,
    pub dropped_by_stage: BTreeMap<Stage, usize>,
    pub column_completeness: Vec<ColumnCompleteness>,
    pub output_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejections_file: Option<PathBuf>,
}

/// Inputs to [`RunSummary::new`].
pub struct SummaryParams<'a> {
    pub sources: &'a [SourceLoad],
    pub tally: &'a Tally,
    pub records: &'a [EnrichedRecord],
    pub frame: &'a DataFrame,
    pub reference_currency: Currency,
    pub duration: Duration,
    pub output_file: PathBuf,
    pub rejections_file: Option<PathBuf>,
}

impl RunSummary {
    pub fn new(params: SummaryParams<'_>) -> Self {
        let mut retained_by_source: BTreeMap<&str, usize> = BTreeMap::new();
        for enriched in params.records {
            *retained_by_source
                .entry(enriched.record.source.as_str())
                .or_insert(0) += 1;
        }

        let sources = params
            .sources
            .iter()
            .map(|load| SourceReport {
                name: load.name.clone(),
                file: load.file.clone(),
                priority: load.priority,
                status: load.status.clone(),
                rows_read: load.rows_read,
                rows_accepted: load.rows_accepted,
                rows_dropped: params.tally.dropped_for_source(&load.name),
                rows_retained: retained_by_source
                    .get(load.name.as_str())
                    .copied()
                    .unwrap_or(0),
            })
            .collect();

        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            duration_ms: params.duration.as_millis() as u64,
            reference_currency: params.reference_currency,
            sources,
            totals: RunTotals {
                ingested: params.tally.total_ingested(),
                dropped: params.tally.total_dropped(),
                retained: params.records.len(),
            },
            dropped_by_reason: params.tally.dropped_by_reason(),
            dropped_by_stage: params.tally.dropped_by_stage(),
            column_completeness: column_completeness(params.frame),
            output_file: params.output_file,
            rejections_file: params.rejections_file,
        }
    }

    /// Whether dropped and retained rows account for every ingested row.
    pub fn is_balanced(&self) -> bool {
        self.totals.dropped + self.totals.retained == self.totals.ingested
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the summary to the log.
    pub fn log(&self) {
        info!(
            "Run summary: {} ingested, {} dropped, {} retained",
            self.totals.ingested, self.totals.dropped, self.totals.retained
        );
        for source in &self.sources {
            match &source.status {
                SourceStatus::Loaded => info!(
                    "  {}: {} read, {} accepted, {} retained",
                    source.name, source.rows_read, source.rows_accepted, source.rows_retained
                ),
                SourceStatus::SchemaMismatch { missing_columns } => warn!(
                    "  {}: schema mismatch ({} rows dropped), missing {}",
                    source.name,
                    source.rows_read,
                    missing_columns.join(", ")
                ),
                SourceStatus::Unreadable { error } => {
                    warn!("  {}: unreadable ({})", source.name, error)
                }
            }
        }
        for (reason, count) in &self.dropped_by_reason {
            info!("  dropped {}: {}", reason, count);
        }
    }
}

/// Non-null share of every column of the output frame, in column order.
pub fn column_completeness(frame: &DataFrame) -> Vec<ColumnCompleteness> {
    let height = frame.height();
    frame
        .get_columns()
        .iter()
        .map(|column| {
            let non_null = height - column.null_count();
            let percent = if height > 0 {
                non_null as f64 / height as f64 * 100.0
            } else {
                0.0
            };
            ColumnCompleteness {
                column: column.name().to_string(),
                non_null,
                percent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tally::{DropReason, Rejection};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_completeness() {
        let frame = df![
            "a" => [Some(1i64), None, Some(3), None],
            "b" => ["x", "y", "z", "w"],
        ]
        .unwrap();

        let completeness = column_completeness(&frame);
        assert_eq!(completeness.len(), 2);
        assert_eq!(completeness[0].column, "a");
        assert_eq!(completeness[0].non_null, 2);
        assert_eq!(completeness[0].percent, 50.0);
        assert_eq!(completeness[1].percent, 100.0);
    }

    #[test]
    fn test_summary_counts() {
        let tally = Tally::new()
            .with_ingested("mulk", 3)
            .with_ingested("unvan", 0)
            .with_drop(Rejection::new("mulk-2", "mulk", DropReason::Duplicate, "x"))
            .with_drop(Rejection::new("mulk-3", "mulk", DropReason::Duplicate, "x"));
        let sources = vec![SourceLoad {
            name: "mulk".into(),
            file: PathBuf::from("mulk.csv"),
            priority: 8,
            status: SourceStatus::Loaded,
            rows_read: 3,
            rows_accepted: 3,
        }];
        let frame = DataFrame::empty();

        let summary = RunSummary::new(SummaryParams {
            sources: &sources,
            tally: &tally,
            records: &[],
            frame: &frame,
            reference_currency: Currency::Azn,
            duration: Duration::from_millis(12),
            output_file: PathBuf::from("out.csv"),
            rejections_file: None,
        });

        assert_eq!(summary.totals.ingested, 3);
        assert_eq!(summary.totals.dropped, 2);
        assert_eq!(summary.sources[0].rows_dropped, 2);
        assert_eq!(summary.sources[0].rows_retained, 0);
        assert_eq!(summary.dropped_by_reason.get("duplicate"), Some(&2));
        assert!(!summary.is_balanced());

        let json: serde_json::Value = serde_json::from_str(&summary.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["sources"][0]["status"], "loaded");
        assert_eq!(json["dropped_by_stage"]["deduplication"], 2);
        assert_eq!(json["reference_currency"], "AZN");
        assert!(json.get("rejections_file").is_none());
    }
}
