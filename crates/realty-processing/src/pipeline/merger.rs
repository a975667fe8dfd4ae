//! Record merger.
//!
//! Concatenates per-source batches into one stream in declared source order,
//! stamping each record with its source rank.

use crate::pipeline::tally::Tally;
use crate::sources::{SourceBatch, SourceStatus};
use crate::types::ListingRecord;
use serde::Serialize;
use std::path::PathBuf;

/// What the loader did with one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLoad {
    pub name: String,
    pub file: PathBuf,
    pub priority: usize,
    #[serde(flatten)]
    pub status: SourceStatus,
    pub rows_read: usize,
    pub rows_accepted: usize,
}

/// All sources' records, in one stream.
#[derive(Debug, Clone, Default)]
pub struct MergedStream {
    pub records: Vec<ListingRecord>,
    pub tally: Tally,
    pub sources: Vec<SourceLoad>,
}

pub struct RecordMerger;

impl RecordMerger {
    /// Merge batches. Batches may arrive in any order; output follows
    /// priority, and within a source, row order.
    pub fn merge(mut batches: Vec<SourceBatch>) -> MergedStream {
        batches.sort_by_key(|b| b.priority);

        let capacity = batches.iter().map(|b| b.records.len()).sum();
        let mut merged = MergedStream {
            records: Vec::with_capacity(capacity),
            ..MergedStream::default()
        };

        for batch in batches {
            merged.sources.push(SourceLoad {
                name: batch.source,
                file: batch.file,
                priority: batch.priority,
                status: batch.status,
                rows_read: batch.rows_read,
                rows_accepted: batch.records.len(),
            });
            let rank = batch.priority;
            merged
                .records
                .extend(batch.records.into_iter().map(|r| r.with_source_rank(rank)));
            merged.tally = merged.tally.merge(batch.tally);
        }

        merged
    }
}
