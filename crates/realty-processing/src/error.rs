//! Error types for the listing unification pipeline.
//!
//! Two layers of errors exist:
//!
//! - [`PipelineError`] covers run-level and source-level failures (a source
//!   whose layout does not match its file, an empty result, IO problems).
//! - [`RowError`] covers a single raw row that cannot become a canonical
//!   record. Row errors never abort a run; they are counted in the tally.
//!
//! Errors are serializable so that run summaries and the `--json` CLI mode
//! can report them with a stable code.

use crate::types::CanonicalField;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A source file does not carry the columns its layout requires.
    #[error("Source '{source_name}' does not match its declared layout; missing columns: {}", .missing_columns.join(", "))]
    SchemaMismatch {
        source_name: String,
        missing_columns: Vec<String>,
    },

    /// A source file could not be read at all.
    #[error("Source '{source_name}' could not be read: {reason}")]
    SourceUnreadable { source_name: String, reason: String },

    /// Every record was dropped; no dataset can be written.
    #[error("Pipeline produced no surviving records ({ingested} rows ingested)")]
    EmptyResult { ingested: usize },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing the canonical dataset or its summary failed.
    #[error("Failed to write output: {0}")]
    WriteFailed(String),

    /// Internal error (e.g., thread join failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet reading error.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for reports and the CLI.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::SourceUnreadable { .. } => "SOURCE_UNREADABLE",
            Self::EmptyResult { .. } => "EMPTY_RESULT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::WriteFailed(_) => "WRITE_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Spreadsheet(_) => "SPREADSHEET_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error only affects a single source.
    ///
    /// Source-local failures are recorded in the run summary and the run
    /// continues with the remaining sources.
    pub fn is_source_local(&self) -> bool {
        match self {
            Self::SchemaMismatch { .. } | Self::SourceUnreadable { .. } => true,
            Self::WithContext { source, .. } => source.is_source_local(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).with_context(context))
    }
}

// =============================================================================
// Row-level errors
// =============================================================================

/// A single field of a single row could not be coerced to its canonical type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot normalize {field} from '{raw}': {reason}")]
pub struct NormalizationError {
    pub field: CanonicalField,
    pub raw: String,
    pub reason: String,
}

impl NormalizationError {
    pub fn new(field: CanonicalField, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

/// Categories of canonical invariant violations, used as tally keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantKind {
    MissingArea,
    NonPositiveArea,
    MissingPrice,
    NegativePrice,
    RoomsOutOfRange,
    NegativeFloor,
    InvalidFloorCount,
    FloorAboveFloors,
}

impl InvariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingArea => "missing_area",
            Self::NonPositiveArea => "non_positive_area",
            Self::MissingPrice => "missing_price",
            Self::NegativePrice => "negative_price",
            Self::RoomsOutOfRange => "rooms_out_of_range",
            Self::NegativeFloor => "negative_floor",
            Self::InvalidFloorCount => "invalid_floor_count",
            Self::FloorAboveFloors => "floor_above_floors",
        }
    }
}

/// A structurally valid row that breaks a canonical invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("area_value is missing")]
    MissingArea,

    #[error("area_value must be positive, got {0}")]
    NonPositiveArea(f64),

    #[error("price_value is missing")]
    MissingPrice,

    #[error("price_value must not be negative, got {0}")]
    NegativePrice(f64),

    #[error("rooms must be between 1 and {max}, got {rooms}")]
    RoomsOutOfRange { rooms: i64, max: i64 },

    #[error("floor must not be negative, got {0}")]
    NegativeFloor(i64),

    #[error("floors must be at least 1, got {0}")]
    InvalidFloorCount(i64),

    #[error("floor {floor} is above the building's {floors} floors")]
    FloorAboveFloors { floor: i64, floors: i64 },
}

impl InvariantViolation {
    pub fn kind(&self) -> InvariantKind {
        match self {
            Self::MissingArea => InvariantKind::MissingArea,
            Self::NonPositiveArea(_) => InvariantKind::NonPositiveArea,
            Self::MissingPrice => InvariantKind::MissingPrice,
            Self::NegativePrice(_) => InvariantKind::NegativePrice,
            Self::RoomsOutOfRange { .. } => InvariantKind::RoomsOutOfRange,
            Self::NegativeFloor(_) => InvariantKind::NegativeFloor,
            Self::InvalidFloorCount(_) => InvariantKind::InvalidFloorCount,
            Self::FloorAboveFloors { .. } => InvariantKind::FloorAboveFloors,
        }
    }
}

/// Why a raw row did not become a canonical record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}
