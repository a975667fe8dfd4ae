//! Real-Estate Listing Unification Library
//!
//! A batch pipeline, built with Rust and Polars, that merges listing exports
//! from many independent sources into one canonical dataset.
//!
//! # Overview
//!
//! Each source has its own column names, units, encodings and missing-value
//! conventions. The pipeline:
//!
//! - **Normalizes** raw values (prices with currency symbols, areas in mixed
//!   units, boolean-like flags, floor fractions, timestamps) into typed values
//! - **Adapts** every source through a declarative [`SourceLayout`]
//! - **Merges** all sources in priority order
//! - **Deduplicates** listings re-posted across platforms or re-scraped
//! - **Trims outliers** by percentile, within room-count (or city) strata
//! - **Enriches** survivors with price-per-m², area-per-room and bands
//! - **Writes** the canonical CSV, a rejection audit trail and a run summary
//!
//! Every dropped row is accounted for: `dropped + retained == ingested`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use realty_processing::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .data_dir("data")
//!     .output_dir("output")
//!     .build()?;
//!
//! let outcome = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//!
//! println!("{} listings written to {}", outcome.records.len(), outcome.output_path.display());
//! ```
//!
//! # Sources
//!
//! The 16 built-in layouts are listed in [`BUILTIN_SOURCES`]. Layouts are plain
//! data and can be replaced or extended from a JSON configuration file:
//!
//! ```rust,ignore
//! use realty_processing::sources::{FieldMapping, SourceLayout};
//! use realty_processing::normalizer::{AreaUnit, ValueKind};
//! use realty_processing::types::CanonicalField;
//!
//! let layout = SourceLayout::new("agency_feed", "agency.csv")
//!     .map(FieldMapping::column(CanonicalField::SourceId, "id", ValueKind::Text))
//!     .map(FieldMapping::column(CanonicalField::AreaValue, "area", ValueKind::Area { unit: AreaUnit::SquareMeters }).required())
//!     .map(FieldMapping::column(CanonicalField::PriceValue, "price", ValueKind::Price).required());
//! ```

pub mod config;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod reporting;
pub mod sources;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    BandConfig, ConfigValidationError, CurrencyConfig, DedupConfig, OutlierConfig,
    PipelineConfig, PipelineConfigBuilder, StratifyBy,
};
pub use error::{
    InvariantKind, InvariantViolation, NormalizationError, PipelineError, Result as PipelineResult,
    ResultExt, RowError,
};
pub use normalizer::{AreaUnit, CanonicalValue, Currency, ValueKind, normalize_value};
pub use pipeline::{
    ClosureProgressReporter, DropReason, Pipeline, PipelineBuilder, PipelineOutcome,
    PipelineStage, ProgressReporter, ProgressUpdate, Rejection, Stage, Tally,
};
pub use reporting::{CanonicalWriter, RunSummary, SourceReport};
pub use sources::{
    BUILTIN_SOURCES, MappedAdapter, SourceAdapter, SourceLayout, SourceStatus, builtin_layout,
    builtin_layouts,
};
pub use types::{
    BuildingType, CanonicalField, EnrichedRecord, FloorCategory, ListingRecord, PriceSegment,
};
pub use utils::{clean_numeric_string, is_placeholder, parse_numeric_string};
