//! Source adapters.
//!
//! Each of the 16 listing exports is described by a [`SourceLayout`] and run
//! through the same [`MappedAdapter`]. [`ingest_source`] reads one file,
//! checks its layout and normalizes every row, returning the records and a
//! [`Tally`] of what was dropped. Failures stay local to the source.
//!
//! Rows without a scrape time take the snapshot time embedded in the export's
//! file name (`myhome_listings_20250929_003143.csv`). The file's metadata is
//! never consulted, so copies of the same export give the same records.

pub mod adapter;
pub mod catalog;
pub mod layout;
pub mod reader;

pub use adapter::{MappedAdapter, RowContext, SourceAdapter};
pub use catalog::{BUILTIN_SOURCES, builtin_layout, builtin_layouts};
pub use layout::{Fallback, FieldMapping, SourceLayout, ValueSource};
pub use reader::{
    RawRow, RawTable, is_spreadsheet, read_delimited, read_source, read_spreadsheet,
};

use crate::error::PipelineError;
use crate::pipeline::tally::{DropReason, Rejection, Tally};
use crate::types::ListingRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of loading one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Loaded,
    SchemaMismatch { missing_columns: Vec<String> },
    Unreadable { error: String },
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::Unreadable { .. } => "unreadable",
        }
    }
}

/// Records and accounting of one source.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: String,
    pub file: PathBuf,
    /// Position in the declared source order; lower wins ties.
    pub priority: usize,
    pub status: SourceStatus,
    pub rows_read: usize,
    pub records: Vec<ListingRecord>,
    pub tally: Tally,
}

/// Read and normalize one source file.
///
/// Never fails: an unreadable file or a layout mismatch is reported in the
/// batch status, and rows of a mismatched file are counted as ingested and
/// dropped.
pub fn ingest_source(
    adapter: &dyn SourceAdapter,
    path: &Path,
    delimiter: char,
    priority: usize,
) -> SourceBatch {
    let name = adapter.name().to_string();
    let batch = |status, rows_read, records, tally| SourceBatch {
        source: name.clone(),
        file: path.to_path_buf(),
        priority,
        status,
        rows_read,
        records,
        tally,
    };

    let table = match read_source(path, delimiter) {
        Ok(table) => table,
        Err(e) => {
            let error = PipelineError::SourceUnreadable {
                source_name: name.clone(),
                reason: e.to_string(),
            };
            warn!("{}", error);
            let status = SourceStatus::Unreadable {
                error: e.to_string(),
            };
            return batch(status, 0, Vec::new(), Tally::new().with_ingested(&name, 0));
        }
    };

    let rows_read = table.height();
    let tally = Tally::new().with_ingested(&name, rows_read);

    if let Err(e) = adapter.check_layout(&table) {
        warn!("{}", e);
        let missing_columns = match e {
            PipelineError::SchemaMismatch {
                missing_columns, ..
            } => missing_columns,
            _ => Vec::new(),
        };
        let detail = format!("missing columns: {}", missing_columns.join(", "));
        let tally = table.rows().fold(tally, |tally, row| {
            tally.with_drop(Rejection::new(
                format!("{}-{}", name, row.number()),
                &name,
                DropReason::SchemaMismatch,
                &detail,
            ))
        });
        let status = SourceStatus::SchemaMismatch { missing_columns };
        return batch(status, rows_read, Vec::new(), tally);
    }

    let ctx = RowContext {
        scraped_at: snapshot_time(path),
    };

    let mut records = Vec::with_capacity(rows_read);
    let mut tally = tally;
    for row in table.rows() {
        match adapter.normalize(&row, &ctx) {
            Ok(record) => records.push(record),
            Err(e) => {
                let record_id = format!("{}-{}", name, row.number());
                debug!("Dropping {}: {}", record_id, e);
                tally = tally.with_drop(Rejection::new(
                    record_id,
                    &name,
                    DropReason::from(&e),
                    e.to_string(),
                ));
            }
        }
    }

    info!(
        "Loaded {}: {} rows read, {} accepted",
        name,
        rows_read,
        records.len()
    );

    batch(SourceStatus::Loaded, rows_read, records, tally)
}

static STAMP_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{8}_\d{6})").expect("Invalid regex: datetime stamp"));

static STAMP_EPOCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|_)(\d{10})(?:_|$)").expect("Invalid regex: epoch stamp"));

static STAMP_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|_)(\d{1,2}_[a-z]{3}_\d{4})(?:_|$)").expect("Invalid regex: date stamp")
});

/// Snapshot time embedded in an export's file name.
///
/// Recognizes `20250929_003143`, unix seconds (`1758793717`) and
/// `25_feb_2025` (midnight). Returns `None` for names without a stamp.
pub fn snapshot_time(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?;

    if let Some(caps) = STAMP_DATETIME.captures(stem)
        && let Ok(ts) = NaiveDateTime::parse_from_str(&caps[1], "%Y%m%d_%H%M%S")
    {
        return Some(ts);
    }
    if let Some(caps) = STAMP_EPOCH.captures(stem)
        && let Some(ts) = caps[1]
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    {
        return Some(ts.naive_utc());
    }
    STAMP_DATE
        .captures(stem)
        .and_then(|caps| NaiveDate::parse_from_str(&caps[1], "%d_%b_%Y").ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrencyConfig;
    use crate::types::RecordLimits;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn at(s: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()
    }

    fn adapter(name: &str) -> MappedAdapter {
        MappedAdapter::new(
            builtin_layout(name).unwrap(),
            CurrencyConfig::default(),
            RecordLimits::default(),
        )
    }

    #[test]
    fn test_ingest_counts_drops() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("myhome_listings_20250929_003143.csv");
        fs::write(
            &path,
            "id,area,room_count,price,city\n1,60,2,90000,Bakı\n2,55,2,-500,Bakı\n3,,1,40000,Bakı\n",
        )
        .unwrap();

        let batch = ingest_source(&adapter("myhome"), &path, ',', 6);
        assert_eq!(batch.status, SourceStatus::Loaded);
        assert_eq!(batch.rows_read, 3);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.priority, 6);
        assert_eq!(batch.tally.total_ingested(), 3);
        assert_eq!(batch.tally.total_dropped(), 2);
        assert!(batch.tally.is_balanced(batch.records.len()));
        assert_eq!(batch.records[0].scraped_at, at("2025-09-29 00:31:43"));
    }

    #[test]
    fn test_snapshot_time_from_file_name() {
        assert_eq!(
            snapshot_time(Path::new("data/bina_sale_20251117_213934.csv")),
            at("2025-11-17 21:39:34")
        );
        assert_eq!(
            snapshot_time(Path::new("binam_listings_1758793717.csv")),
            at("2025-09-25 09:48:37")
        );
        assert_eq!(
            snapshot_time(Path::new("real_estate_data_25_feb_2025.csv")),
            at("2025-02-25 00:00:00")
        );
        assert_eq!(snapshot_time(Path::new("unvan.xlsx")), None);
        assert_eq!(snapshot_time(Path::new("evv_az_listings.csv")), None);
    }

    #[test]
    fn test_modification_time_does_not_change_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evv_az_listings.csv");
        fs::write(&path, "listing_id,area,rooms,price\n1,60,2,90000\n2,75,3,120000\n").unwrap();
        let adapter = adapter("evv_az");

        let touch = |secs: u64| {
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
                .unwrap();
        };

        touch(1_600_000_000);
        let before = ingest_source(&adapter, &path, ',', 13);
        touch(1_750_000_000);
        let after = ingest_source(&adapter, &path, ',', 13);

        assert_eq!(before.records, after.records);
        assert!(after.records.iter().all(|r| r.scraped_at.is_none()));
    }

    #[test]
    fn test_schema_mismatch_drops_every_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mulk.csv");
        fs::write(&path, "listing_id,area_numeric\n1,80\n2,90\n").unwrap();

        let batch = ingest_source(&adapter("mulk"), &path, ',', 8);
        assert_eq!(
            batch.status,
            SourceStatus::SchemaMismatch {
                missing_columns: vec!["price_numeric".to_string()]
            }
        );
        assert!(batch.records.is_empty());
        assert_eq!(batch.tally.dropped(DropReason::SchemaMismatch), 2);
        assert!(batch.tally.is_balanced(0));
    }

    #[test]
    fn test_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let batch = ingest_source(&adapter("unvan"), &dir.path().join("missing.csv"), ',', 7);
        assert!(matches!(batch.status, SourceStatus::Unreadable { .. }));
        assert_eq!(batch.rows_read, 0);
        assert_eq!(batch.tally.total_ingested(), 0);
        assert_eq!(batch.tally.ingested().get("unvan"), Some(&0));
    }
}
