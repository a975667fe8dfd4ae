//! Integration tests for the listing unification pipeline.
//!
//! Each test writes small source exports into a temporary directory and runs
//! the whole pipeline over them.

use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use realty_processing::pipeline::outliers::quantile;
use realty_processing::{
    Pipeline, PipelineConfig, PipelineError, PipelineStage, PriceSegment, SourceStatus,
    builtin_layout, types::output_columns,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

struct Workspace {
    _root: TempDir,
    data: PathBuf,
    output: PathBuf,
}

fn workspace() -> Workspace {
    let root = TempDir::new().unwrap();
    let data = root.path().join("data");
    let output = root.path().join("output");
    fs::create_dir_all(&data).unwrap();
    Workspace {
        data,
        output,
        _root: root,
    }
}

/// Write the export of a built-in source under its declared file name.
fn write_source(dir: &Path, source: &str, contents: &str) {
    let layout = builtin_layout(source).unwrap();
    fs::write(dir.join(&layout.file), contents).unwrap();
}

fn config_for(ws: &Workspace, sources: &[&str]) -> PipelineConfig {
    PipelineConfig::builder()
        .data_dir(&ws.data)
        .output_dir(&ws.output)
        .sources(sources.iter().map(|s| builtin_layout(s).unwrap()).collect())
        .build()
        .unwrap()
}

fn run(config: PipelineConfig) -> realty_processing::PipelineResult<realty_processing::PipelineOutcome> {
    Pipeline::builder().config(config).build().unwrap().run()
}

fn read_output(path: &Path) -> DataFrame {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn string_column(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    df.column(name)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(String::from))
        .collect()
}

const MULK_HEADER: &str = "listing_id,area_numeric,rooms_numeric,current_floor,total_floors,price_numeric,location_district,scraped_at\n";

// ============================================================================
// End-to-End
// ============================================================================

#[test]
fn test_same_listing_at_two_times_and_negative_price() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!("{MULK_HEADER}1,100,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n"),
    );
    write_source(
        &ws.data,
        "real_estate_feb_2025",
        "id,area,rooms,floor,total_floors,price,currency,location,created_at\n\
         77,100,3,4,9,150000,AZN,yasamal,2025-02-20T10:00:00Z\n",
    );
    write_source(
        &ws.data,
        "myhome",
        "id,area,room_count,floor,floor_count,city,region,price\n\
         5,60,2,1,5,Bakı,Nəsimi,-500\n",
    );

    let outcome = run(config_for(&ws, &["mulk", "real_estate_feb_2025", "myhome"])).unwrap();

    assert_eq!(outcome.records.len(), 1);
    let kept = &outcome.records[0];
    assert_eq!(kept.record.record_id, "real_estate_feb_2025-1");
    assert_eq!(kept.record.source, "real_estate_feb_2025");
    assert_eq!(kept.derived.price_per_area, 1500.0);
    assert!((kept.derived.area_per_room.unwrap() - 33.333).abs() < 1e-3);
    assert_eq!(kept.derived.price_segment, PriceSegment::MidRange);

    let summary = &outcome.summary;
    assert_eq!(summary.totals.ingested, 3);
    assert_eq!(summary.totals.retained, 1);
    assert_eq!(summary.dropped_by_reason.get("invariant:negative_price"), Some(&1));
    assert_eq!(summary.dropped_by_reason.get("duplicate"), Some(&1));
    assert!(summary.is_balanced());

    let df = read_output(&outcome.output_path);
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, output_columns());
    assert_eq!(df.height(), 1);
    assert_eq!(
        string_column(&df, "record_id"),
        vec![Some("real_estate_feb_2025-1".to_string())]
    );
    assert_eq!(
        string_column(&df, "price_segment"),
        vec![Some("mid-range".to_string())]
    );
    assert_eq!(string_column(&df, "area_units"), vec![Some("m²".to_string())]);
}

#[test]
fn test_output_files_written() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!(
            "{MULK_HEADER}1,100,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n\
             2,abc,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n"
        ),
    );

    let outcome = run(config_for(&ws, &["mulk"])).unwrap();

    let summary_path = ws.output.join("combined_real_estate_summary.json");
    let rejections_path = ws.output.join("combined_real_estate_rejections.csv");
    assert_eq!(outcome.output_path, ws.output.join("combined_real_estate.csv"));
    assert!(summary_path.exists());

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(summary_path).unwrap()).unwrap();
    assert_eq!(summary["totals"]["ingested"], 2);
    assert_eq!(summary["dropped_by_reason"]["normalization:area_value"], 1);
    assert_eq!(summary["sources"][0]["name"], "mulk");
    assert_eq!(summary["sources"][0]["rows_retained"], 1);

    let rejections = read_output(&rejections_path);
    assert_eq!(rejections.height(), 1);
    assert_eq!(
        string_column(&rejections, "record_id"),
        vec![Some("mulk-2".to_string())]
    );
    assert_eq!(
        string_column(&rejections, "stage"),
        vec![Some("validation".to_string())]
    );
}

#[test]
fn test_no_rejections_file_when_disabled() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!("{MULK_HEADER}1,100,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n"),
    );

    let mut config = config_for(&ws, &["mulk"]);
    config.write_rejections = false;
    let outcome = run(config).unwrap();

    assert!(outcome.summary.rejections_file.is_none());
    assert!(!ws.output.join("combined_real_estate_rejections.csv").exists());
}

#[test]
fn test_spreadsheet_source() {
    use rust_xlsxwriter::Workbook;

    let ws = workspace();
    let layout = builtin_layout("unvan").unwrap();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in ["id", "area", "room_count", "price", "address"].iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }
    sheet.write_number(1, 0, 501.0).unwrap();
    sheet.write_number(1, 1, 80.0).unwrap();
    sheet.write_string(1, 2, "2 otaqlı").unwrap();
    sheet.write_string(1, 3, "95 000 AZN").unwrap();
    sheet.write_string(1, 4, "Nərimanov r.").unwrap();
    sheet.write_number(2, 0, 502.0).unwrap();
    sheet.write_number(2, 1, 120.0).unwrap();
    sheet.write_string(2, 2, "4 otaqlı").unwrap();
    sheet.write_string(2, 3, "$100,000").unwrap();
    workbook.save(ws.data.join(&layout.file)).unwrap();

    let outcome = run(config_for(&ws, &["unvan"])).unwrap();

    assert_eq!(outcome.summary.sources[0].status, SourceStatus::Loaded);
    assert_eq!(outcome.summary.sources[0].rows_read, 2);
    assert_eq!(outcome.records.len(), 2);

    let by_id = |id: &str| {
        outcome
            .records
            .iter()
            .find(|r| r.record.source_id.as_deref() == Some(id))
            .unwrap()
    };
    let azn = by_id("501");
    assert_eq!(azn.record.rooms, Some(2));
    assert_eq!(azn.record.price_value, 95_000.0);
    assert_eq!(azn.record.location_name.as_deref(), Some("Nərimanov r."));

    let usd = by_id("502");
    assert_eq!(usd.record.rooms, Some(4));
    assert!((usd.record.price_value - 170_000.0).abs() < 1e-6);
}

// ============================================================================
// Determinism and Accounting
// ============================================================================

#[test]
fn test_runs_are_idempotent() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!(
            "{MULK_HEADER}1,100,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n\
             2,75,2,2,5,98000,Xətai,2025-02-03T10:00:00Z\n\
             3,75,2,2,5,98000,Xətai,2025-02-04T10:00:00Z\n"
        ),
    );
    write_source(
        &ws.data,
        "myhome",
        "id,area,room_count,floor,floor_count,city,region,price\n\
         5,60,2,1,5,Bakı,Nəsimi,70000\n\
         6,55,1,3,9,Bakı,Səbail,120000\n",
    );

    let first = run(config_for(&ws, &["mulk", "myhome"])).unwrap();
    let first_csv = fs::read(&first.output_path).unwrap();
    let second = run(config_for(&ws, &["mulk", "myhome"])).unwrap();
    let second_csv = fs::read(&second.output_path).unwrap();

    assert_eq!(first_csv, second_csv);
    assert_eq!(first.summary.totals, second.summary.totals);
    assert_eq!(first.summary.dropped_by_reason, second.summary.dropped_by_reason);
    assert_eq!(first.summary.totals.retained, 4);
}

#[test]
fn test_output_ignores_file_modification_time() {
    use std::time::{Duration, SystemTime};

    let ws = workspace();
    write_source(
        &ws.data,
        "myhome",
        "id,area,room_count,floor,floor_count,city,region,price\n\
         5,60,2,1,5,Bakı,Nəsimi,70000\n",
    );
    write_source(
        &ws.data,
        "evv_az",
        "listing_id,area,rooms,price,location\n\
         5,60,2,70000,Nəsimi\n\
         6,90,3,150000,Xətai\n",
    );
    let touch = |source: &str, secs: u64| {
        let path = ws.data.join(builtin_layout(source).unwrap().file);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    };

    touch("myhome", 1_600_000_000);
    touch("evv_az", 1_700_000_000);
    let first = run(config_for(&ws, &["myhome", "evv_az"])).unwrap();
    let first_csv = fs::read(&first.output_path).unwrap();

    touch("myhome", 1_700_000_000);
    touch("evv_az", 1_600_000_000);
    let second = run(config_for(&ws, &["myhome", "evv_az"])).unwrap();
    let second_csv = fs::read(&second.output_path).unwrap();

    assert_eq!(first_csv, second_csv);
    assert_eq!(first.summary.totals, second.summary.totals);

    let scraped = string_column(&read_output(&second.output_path), "scraped_at");
    assert!(scraped.contains(&Some("2025-09-29T00:31:43".to_string())));
}

#[test]
fn test_every_row_is_accounted_for() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!(
            "{MULK_HEADER}1,100,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n\
             2,abc,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n\
             3,80,25,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n\
             4,80,2,10,9,150000,Yasamal,2025-02-01T10:00:00Z\n\
             5,,2,1,9,150000,Yasamal,2025-02-01T10:00:00Z\n\
             6,90,2,1,9,N/A,Yasamal,2025-02-01T10:00:00Z\n"
        ),
    );

    let outcome = run(config_for(&ws, &["mulk"])).unwrap();
    let summary = &outcome.summary;

    assert_eq!(summary.totals.ingested, 6);
    assert_eq!(summary.totals.retained, 1);
    assert_eq!(summary.totals.dropped, 5);
    assert!(summary.is_balanced());

    let reasons: Vec<&str> = summary.dropped_by_reason.keys().map(|k| k.as_str()).collect();
    assert_eq!(
        reasons,
        vec![
            "invariant:floor_above_floors",
            "invariant:missing_area",
            "invariant:missing_price",
            "invariant:rooms_out_of_range",
            "normalization:area_value",
        ]
    );
    let by_reason_total: usize = summary.dropped_by_reason.values().sum();
    assert_eq!(by_reason_total + summary.totals.retained, summary.totals.ingested);

    for enriched in &outcome.records {
        let r = &enriched.record;
        assert!(r.area_value > 0.0);
        assert!(r.price_value >= 0.0);
        if let (Some(floor), Some(floors)) = (r.floor, r.floors) {
            assert!(floor <= floors);
        }
    }
}

// ============================================================================
// Source Isolation
// ============================================================================

#[test]
fn test_schema_mismatch_is_local_to_its_source() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!("{MULK_HEADER}1,100,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n"),
    );
    // no price column
    write_source(
        &ws.data,
        "myhome",
        "id,area,room_count,city\n5,60,2,Bakı\n6,70,3,Bakı\n",
    );

    let outcome = run(config_for(&ws, &["mulk", "myhome", "unvan"])).unwrap();
    let summary = &outcome.summary;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(summary.sources[0].status, SourceStatus::Loaded);
    assert_eq!(
        summary.sources[1].status,
        SourceStatus::SchemaMismatch {
            missing_columns: vec!["price".to_string()]
        }
    );
    assert!(matches!(summary.sources[2].status, SourceStatus::Unreadable { .. }));
    assert_eq!(summary.sources[1].rows_read, 2);
    assert_eq!(summary.dropped_by_reason.get("schema_mismatch"), Some(&2));
    assert_eq!(summary.totals.ingested, 3);
    assert!(summary.is_balanced());
}

#[test]
fn test_no_survivors_is_an_error() {
    let ws = workspace();
    write_source(
        &ws.data,
        "myhome",
        "id,area,room_count,floor,floor_count,city,region,price\n\
         5,60,2,1,5,Bakı,Nəsimi,-500\n\
         6,0,2,1,5,Bakı,Nəsimi,90000\n",
    );

    let err = run(config_for(&ws, &["myhome"])).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyResult { ingested: 2 }));
    assert_eq!(err.error_code(), "EMPTY_RESULT");
    assert!(!ws.output.join("combined_real_estate.csv").exists());
}

// ============================================================================
// Outliers and Derived Fields
// ============================================================================

#[test]
fn test_stratified_price_band() {
    let ws = workspace();
    let mut prices: Vec<f64> = (0..40).map(|i| 100_000.0 + i as f64 * 1_000.0).collect();
    prices.push(1_000.0);
    prices.push(10_000_000.0);

    let mut contents = MULK_HEADER.to_string();
    for (i, price) in prices.iter().enumerate() {
        contents.push_str(&format!(
            "{},80,2,1,9,{},Nərimanov,2025-02-01T10:00:00Z\n",
            i + 1,
            price
        ));
    }
    write_source(&ws.data, "mulk", &contents);

    let outcome = run(config_for(&ws, &["mulk"])).unwrap();

    let mut sorted = prices.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let lower = quantile(&sorted, 0.01).unwrap();
    let upper = quantile(&sorted, 0.99).unwrap();

    assert_eq!(outcome.records.len(), 40);
    for enriched in &outcome.records {
        let price = enriched.record.price_value;
        assert!(price >= lower && price <= upper, "{price} outside [{lower}, {upper}]");
    }
    assert_eq!(
        outcome.summary.dropped_by_reason.get("outlier:price_value"),
        Some(&2)
    );
}

#[test]
fn test_price_segment_boundaries() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!(
            "{MULK_HEADER}1,100,3,4,9,79999,Yasamal,2025-02-01T10:00:00Z\n\
             2,100,3,4,9,80000,Xətai,2025-02-01T10:00:00Z\n\
             3,100,3,4,9,200001,Səbail,2025-02-01T10:00:00Z\n"
        ),
    );

    let outcome = run(config_for(&ws, &["mulk"])).unwrap();
    let segments: Vec<PriceSegment> = outcome
        .records
        .iter()
        .map(|e| e.derived.price_segment)
        .collect();
    assert_eq!(
        segments,
        vec![
            PriceSegment::Budget,
            PriceSegment::MidRange,
            PriceSegment::Luxury
        ]
    );

    let df = read_output(&outcome.output_path);
    assert_eq!(
        string_column(&df, "price_segment"),
        vec![
            Some("budget".to_string()),
            Some("mid-range".to_string()),
            Some("luxury".to_string())
        ]
    );
}

// ============================================================================
// Progress Reporting
// ============================================================================

#[test]
fn test_progress_stages_reported() {
    let ws = workspace();
    write_source(
        &ws.data,
        "mulk",
        &format!("{MULK_HEADER}1,100,3,4,9,150000,Yasamal,2025-02-01T10:00:00Z\n"),
    );

    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);

    Pipeline::builder()
        .config(config_for(&ws, &["mulk"]))
        .on_progress(move |update| sink.lock().unwrap().push(update.stage))
        .build()
        .unwrap()
        .run()
        .unwrap();

    let stages = stages.lock().unwrap();
    for stage in [
        PipelineStage::Initializing,
        PipelineStage::Loading,
        PipelineStage::Merging,
        PipelineStage::Deduplicating,
        PipelineStage::OutlierFiltering,
        PipelineStage::Enriching,
        PipelineStage::Writing,
    ] {
        assert!(stages.contains(&stage), "missing {stage:?}");
    }
    assert_eq!(stages.last(), Some(&PipelineStage::Complete));
}
