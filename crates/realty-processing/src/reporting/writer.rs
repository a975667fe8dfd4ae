use crate::error::{PipelineError, Result};
use crate::pipeline::tally::Rejection;
use crate::reporting::RunSummary;
use crate::types::{CANONICAL_AREA_UNITS, CanonicalField, EnrichedRecord, SOURCE_COLUMN};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn format_timestamp(ts: Option<NaiveDateTime>) -> Option<String> {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
}

/// Photos are written as a JSON array; an empty list is null.
fn format_photos(photos: &[String]) -> Option<String> {
    if photos.is_empty() {
        None
    } else {
        serde_json::to_string(photos).ok()
    }
}

fn canonical_column(field: CanonicalField, records: &[EnrichedRecord]) -> Column {
    let name = PlSmallStr::from_static(field.column_name());
    let rs = records.iter().map(|e| &e.record);

    let series = match field {
        CanonicalField::RecordId => {
            Series::new(name, rs.map(|r| r.record_id.as_str()).collect::<Vec<_>>())
        }
        CanonicalField::SourceId => {
            Series::new(name, rs.map(|r| r.source_id.as_deref()).collect::<Vec<_>>())
        }
        CanonicalField::AreaValue => {
            Series::new(name, rs.map(|r| r.area_value).collect::<Vec<_>>())
        }
        CanonicalField::AreaUnits => Series::new(name, vec![CANONICAL_AREA_UNITS; records.len()]),
        CanonicalField::Leased => Series::new(name, rs.map(|r| r.leased).collect::<Vec<_>>()),
        CanonicalField::Floor => Series::new(name, rs.map(|r| r.floor).collect::<Vec<_>>()),
        CanonicalField::Floors => Series::new(name, rs.map(|r| r.floors).collect::<Vec<_>>()),
        CanonicalField::Rooms => Series::new(name, rs.map(|r| r.rooms).collect::<Vec<_>>()),
        CanonicalField::CityId => {
            Series::new(name, rs.map(|r| r.city_id.as_deref()).collect::<Vec<_>>())
        }
        CanonicalField::CityName => {
            Series::new(name, rs.map(|r| r.city_name.as_deref()).collect::<Vec<_>>())
        }
        CanonicalField::LocationId => {
            Series::new(name, rs.map(|r| r.location_id.as_deref()).collect::<Vec<_>>())
        }
        CanonicalField::LocationName => Series::new(
            name,
            rs.map(|r| r.location_name.as_deref()).collect::<Vec<_>>(),
        ),
        CanonicalField::LocationFullName => Series::new(
            name,
            rs.map(|r| r.location_full_name.as_deref())
                .collect::<Vec<_>>(),
        ),
        CanonicalField::PriceValue => {
            Series::new(name, rs.map(|r| r.price_value).collect::<Vec<_>>())
        }
        CanonicalField::PriceCurrency => {
            Series::new(name, rs.map(|r| r.price_currency.code()).collect::<Vec<_>>())
        }
        CanonicalField::CompanyId => {
            Series::new(name, rs.map(|r| r.company_id.as_deref()).collect::<Vec<_>>())
        }
        CanonicalField::CompanyName => {
            Series::new(name, rs.map(|r| r.company_name.as_deref()).collect::<Vec<_>>())
        }
        CanonicalField::CompanyTargetType => Series::new(
            name,
            rs.map(|r| r.company_target_type.as_deref())
                .collect::<Vec<_>>(),
        ),
        CanonicalField::HasMortgage => {
            Series::new(name, rs.map(|r| r.has_mortgage).collect::<Vec<_>>())
        }
        CanonicalField::HasBillOfSale => {
            Series::new(name, rs.map(|r| r.has_bill_of_sale).collect::<Vec<_>>())
        }
        CanonicalField::HasRepair => {
            Series::new(name, rs.map(|r| r.has_repair).collect::<Vec<_>>())
        }
        CanonicalField::PaidDaily => {
            Series::new(name, rs.map(|r| r.paid_daily).collect::<Vec<_>>())
        }
        CanonicalField::IsBusiness => {
            Series::new(name, rs.map(|r| r.is_business).collect::<Vec<_>>())
        }
        CanonicalField::Vipped => Series::new(name, rs.map(|r| r.vipped).collect::<Vec<_>>()),
        CanonicalField::Featured => Series::new(name, rs.map(|r| r.featured).collect::<Vec<_>>()),
        CanonicalField::UpdatedAt => Series::new(
            name,
            rs.map(|r| format_timestamp(r.updated_at))
                .collect::<Vec<_>>(),
        ),
        CanonicalField::Path => Series::new(name, rs.map(|r| r.path.as_deref()).collect::<Vec<_>>()),
        CanonicalField::PhotosCount => {
            Series::new(name, rs.map(|r| r.photos_count).collect::<Vec<_>>())
        }
        CanonicalField::Photos => Series::new(
            name,
            rs.map(|r| format_photos(&r.photos)).collect::<Vec<_>>(),
        ),
        CanonicalField::Url => Series::new(name, rs.map(|r| r.url.as_deref()).collect::<Vec<_>>()),
        CanonicalField::ScrapedAt => Series::new(
            name,
            rs.map(|r| format_timestamp(r.scraped_at))
                .collect::<Vec<_>>(),
        ),
    };

    series.into()
}

fn derived_columns(records: &[EnrichedRecord]) -> Vec<Column> {
    let ds = || records.iter().map(|e| &e.derived);
    vec![
        Series::new(
            "price_per_area".into(),
            ds().map(|d| d.price_per_area).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "area_per_room".into(),
            ds().map(|d| d.area_per_room).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "price_segment".into(),
            ds().map(|d| d.price_segment.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "floor_category".into(),
            ds().map(|d| d.floor_category.map(|c| c.as_str()))
                .collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "building_type".into(),
            ds().map(|d| d.building_type.map(|b| b.as_str()))
                .collect::<Vec<_>>(),
        )
        .into(),
    ]
}

/// Build the output frame: canonical columns, then `source`, then the
/// derived columns.
pub fn records_to_frame(records: &[EnrichedRecord]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = CanonicalField::ALL
        .iter()
        .map(|&field| canonical_column(field, records))
        .collect();

    columns.push(
        Series::new(
            SOURCE_COLUMN.into(),
            records
                .iter()
                .map(|e| e.record.source.as_str())
                .collect::<Vec<_>>(),
        )
        .into(),
    );
    columns.extend(derived_columns(records));

    Ok(DataFrame::new(columns)?)
}

/// Writes the canonical dataset, the rejection audit trail and the run
/// summary into the output directory.
#[derive(Debug, Clone)]
pub struct CanonicalWriter {
    output_dir: PathBuf,
    output_name: String,
    write_rejections: bool,
}

impl CanonicalWriter {
    pub fn new(output_dir: PathBuf, output_name: impl Into<String>, write_rejections: bool) -> Self {
        Self {
            output_dir,
            output_name: output_name.into(),
            write_rejections,
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.csv", self.output_name))
    }

    /// `None` when the audit trail is disabled.
    pub fn rejections_path(&self) -> Option<PathBuf> {
        self.write_rejections
            .then(|| self.output_dir.join(format!("{}_rejections.csv", self.output_name)))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_summary.json", self.output_name))
    }

    /// Write the dataset, replacing any previous file in one rename.
    pub fn write_dataset(&self, frame: &mut DataFrame) -> Result<PathBuf> {
        let path = self.dataset_path();
        write_csv_atomic(&path, frame)?;
        info!(
            "Dataset saved: {} ({} rows, {} columns)",
            path.display(),
            frame.height(),
            frame.width()
        );
        Ok(path)
    }

    /// Write the rejection audit trail if enabled.
    pub fn write_rejections(&self, rejections: &[Rejection]) -> Result<Option<PathBuf>> {
        let Some(path) = self.rejections_path() else {
            debug!("Rejection file disabled");
            return Ok(None);
        };

        let mut frame = df![
            "record_id" => rejections.iter().map(|r| r.record_id.as_str()).collect::<Vec<_>>(),
            "source" => rejections.iter().map(|r| r.source.as_str()).collect::<Vec<_>>(),
            "stage" => rejections.iter().map(|r| r.reason.stage().as_str()).collect::<Vec<_>>(),
            "reason" => rejections.iter().map(|r| r.reason.label()).collect::<Vec<_>>(),
            "detail" => rejections.iter().map(|r| r.detail.as_str()).collect::<Vec<_>>(),
        ]?;

        write_csv_atomic(&path, &mut frame)?;
        info!("Rejections saved: {} ({} rows)", path.display(), frame.height());
        Ok(Some(path))
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let path = self.summary_path();
        let json = summary.to_json_pretty()?;

        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&self.output_dir)?;
            let mut file = File::create(&path)?;
            file.write_all(json.as_bytes())
        };
        write().map_err(|e| write_failed(&path, e))?;

        info!("Summary saved: {}", path.display());
        Ok(path)
    }
}

fn write_failed(path: &Path, error: impl std::fmt::Display) -> PipelineError {
    PipelineError::WriteFailed(format!("{}: {}", path.display(), error))
}

/// Write a CSV next to its target and rename it into place.
fn write_csv_atomic(path: &Path, frame: &mut DataFrame) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| write_failed(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    let written = File::create(&tmp_path)
        .map_err(|e| write_failed(&tmp_path, e))
        .and_then(|mut file| {
            CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(b',')
                .with_quote_char(b'"')
                .finish(frame)
                .map_err(|e| write_failed(&tmp_path, e))
        });

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path).map_err(|e| write_failed(path, e))
}
