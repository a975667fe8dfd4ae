//! Output generation.
//!
//! The [`CanonicalWriter`] writes three files into the output directory:
//!
//! - `<output_name>.csv`: the canonical dataset, one row per surviving record
//! - `<output_name>_rejections.csv`: one row per dropped record (optional)
//! - `<output_name>_summary.json`: the [`RunSummary`]
//!
//! # Example
//!
//! ```rust,ignore
//! use realty_processing::reporting::{CanonicalWriter, records_to_frame};
//!
//! let mut frame = records_to_frame(&enriched)?;
//! let writer = CanonicalWriter::new(PathBuf::from("output"), "combined_real_estate", true);
//! writer.write_dataset(&mut frame)?;
//! ```

mod summary;
mod writer;

pub use summary::{
    ColumnCompleteness, RunSummary, RunTotals, SourceReport, SummaryParams, column_completeness,
};
pub use writer::{CanonicalWriter, records_to_frame};
