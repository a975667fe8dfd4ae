//! Run accounting.
//!
//! Every stage returns a [`Tally`] next to its output. Tallies are merged by
//! value, never shared, and the final one must balance:
//! `total_dropped + retained == total_ingested`.

use crate::error::{InvariantKind, RowError};
use crate::pipeline::outliers::OutlierField;
use crate::types::CanonicalField;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Pipeline stage that dropped a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingestion,
    Validation,
    Deduplication,
    OutlierFilter,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Validation => "validation",
            Self::Deduplication => "deduplication",
            Self::OutlierFilter => "outlier_filter",
        }
    }
}

/// Why a row did not reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    /// The row's source file does not match its layout.
    SchemaMismatch,
    /// A field could not be coerced to its canonical type.
    Normalization(CanonicalField),
    /// The record broke a canonical invariant.
    Invariant(InvariantKind),
    /// A fresher record of the same listing was kept.
    Duplicate,
    /// The value lies outside its stratum's percentile band.
    Outlier(OutlierField),
}

impl DropReason {
    pub fn stage(&self) -> Stage {
        match self {
            Self::SchemaMismatch => Stage::Ingestion,
            Self::Normalization(_) | Self::Invariant(_) => Stage::Validation,
            Self::Duplicate => Stage::Deduplication,
            Self::Outlier(_) => Stage::OutlierFilter,
        }
    }

    /// Stable label, e.g. `normalization:price_value` or
    /// `invariant:negative_price`.
    pub fn label(&self) -> String {
        match self {
            Self::SchemaMismatch => "schema_mismatch".to_string(),
            Self::Normalization(field) => format!("normalization:{field}"),
            Self::Invariant(kind) => format!("invariant:{}", kind.as_str()),
            Self::Duplicate => "duplicate".to_string(),
            Self::Outlier(field) => format!("outlier:{}", field.as_str()),
        }
    }
}

impl From<&RowError> for DropReason {
    fn from(error: &RowError) -> Self {
        match error {
            RowError::Normalization(e) => Self::Normalization(e.field),
            RowError::Invariant(v) => Self::Invariant(v.kind()),
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One dropped row, for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub record_id: String,
    pub source: String,
    pub reason: DropReason,
    pub detail: String,
}

impl Rejection {
    pub fn new(
        record_id: impl Into<String>,
        source: impl Into<String>,
        reason: DropReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            source: source.into(),
            reason,
            detail: detail.into(),
        }
    }
}

/// Counts of ingested and dropped rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    ingested: BTreeMap<String, usize>,
    dropped: BTreeMap<DropReason, usize>,
    rejections: Vec<Rejection>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count rows read from a source.
    pub fn with_ingested(mut self, source: &str, rows: usize) -> Self {
        *self.ingested.entry(source.to_string()).or_insert(0) += rows;
        self
    }

    /// Count one dropped row.
    pub fn with_drop(mut self, rejection: Rejection) -> Self {
        *self.dropped.entry(rejection.reason).or_insert(0) += 1;
        self.rejections.push(rejection);
        self
    }

    /// Combine two tallies. Rejections keep their order: `self` first.
    pub fn merge(mut self, other: Tally) -> Self {
        for (source, rows) in other.ingested {
            *self.ingested.entry(source).or_insert(0) += rows;
        }
        for (reason, count) in other.dropped {
            *self.dropped.entry(reason).or_insert(0) += count;
        }
        self.rejections.extend(other.rejections);
        self
    }

    pub fn ingested(&self) -> &BTreeMap<String, usize> {
        &self.ingested
    }

    pub fn total_ingested(&self) -> usize {
        self.ingested.values().sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn dropped(&self, reason: DropReason) -> usize {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn dropped_by_reason(&self) -> BTreeMap<String, usize> {
        self.dropped
            .iter()
            .map(|(reason, count)| (reason.label(), *count))
            .collect()
    }

    pub fn dropped_by_stage(&self) -> BTreeMap<Stage, usize> {
        let mut by_stage = BTreeMap::new();
        for (reason, count) in &self.dropped {
            *by_stage.entry(reason.stage()).or_insert(0) += count;
        }
        by_stage
    }

    /// Dropped rows of one source, across all stages.
    pub fn dropped_for_source(&self, source: &str) -> usize {
        self.rejections.iter().filter(|r| r.source == source).count()
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    /// Whether every ingested row is either dropped or retained.
    pub fn is_balanced(&self, retained: usize) -> bool {
        self.total_dropped() + retained == self.total_ingested()
    }
}
