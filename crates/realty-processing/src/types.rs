//! Core data types for the listing unification pipeline.
//!
//! A raw row becomes a [`RecordDraft`] inside a source adapter. The draft is
//! the only mutable shape in the pipeline; [`RecordDraft::into_record`]
//! enforces the canonical invariants and yields a [`ListingRecord`], which
//! later stages move along without modifying. The Feature Enricher wraps
//! surviving records into [`EnrichedRecord`]s.

use crate::error::{InvariantViolation, NormalizationError};
use crate::normalizer::{CanonicalValue, Currency};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Canonical fields
// =============================================================================

/// The 31 canonical columns, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    RecordId,
    SourceId,
    AreaValue,
    AreaUnits,
    Leased,
    Floor,
    Floors,
    Rooms,
    CityId,
    CityName,
    LocationId,
    LocationName,
    LocationFullName,
    PriceValue,
    PriceCurrency,
    CompanyId,
    CompanyName,
    CompanyTargetType,
    HasMortgage,
    HasBillOfSale,
    HasRepair,
    PaidDaily,
    IsBusiness,
    Vipped,
    Featured,
    UpdatedAt,
    Path,
    PhotosCount,
    Photos,
    Url,
    ScrapedAt,
}

/// Value shape a canonical field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Bool,
    Currency,
    Timestamp,
    List,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 31] = [
        Self::RecordId,
        Self::SourceId,
        Self::AreaValue,
        Self::AreaUnits,
        Self::Leased,
        Self::Floor,
        Self::Floors,
        Self::Rooms,
        Self::CityId,
        Self::CityName,
        Self::LocationId,
        Self::LocationName,
        Self::LocationFullName,
        Self::PriceValue,
        Self::PriceCurrency,
        Self::CompanyId,
        Self::CompanyName,
        Self::CompanyTargetType,
        Self::HasMortgage,
        Self::HasBillOfSale,
        Self::HasRepair,
        Self::PaidDaily,
        Self::IsBusiness,
        Self::Vipped,
        Self::Featured,
        Self::UpdatedAt,
        Self::Path,
        Self::PhotosCount,
        Self::Photos,
        Self::Url,
        Self::ScrapedAt,
    ];

    /// Column name in the canonical output.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::RecordId => "record_id",
            Self::SourceId => "source_id",
            Self::AreaValue => "area_value",
            Self::AreaUnits => "area_units",
            Self::Leased => "leased",
            Self::Floor => "floor",
            Self::Floors => "floors",
            Self::Rooms => "rooms",
            Self::CityId => "city_id",
            Self::CityName => "city_name",
            Self::LocationId => "location_id",
            Self::LocationName => "location_name",
            Self::LocationFullName => "location_full_name",
            Self::PriceValue => "price_value",
            Self::PriceCurrency => "price_currency",
            Self::CompanyId => "company_id",
            Self::CompanyName => "company_name",
            Self::CompanyTargetType => "company_target_type",
            Self::HasMortgage => "has_mortgage",
            Self::HasBillOfSale => "has_bill_of_sale",
            Self::HasRepair => "has_repair",
            Self::PaidDaily => "paid_daily",
            Self::IsBusiness => "is_business",
            Self::Vipped => "vipped",
            Self::Featured => "featured",
            Self::UpdatedAt => "updated_at",
            Self::Path => "path",
            Self::PhotosCount => "photos_count",
            Self::Photos => "photos",
            Self::Url => "url",
            Self::ScrapedAt => "scraped_at",
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Self::AreaValue | Self::PriceValue => FieldType::Real,
            Self::Floor | Self::Floors | Self::Rooms | Self::PhotosCount => FieldType::Integer,
            Self::Leased
            | Self::HasMortgage
            | Self::HasBillOfSale
            | Self::HasRepair
            | Self::PaidDaily
            | Self::IsBusiness
            | Self::Vipped
            | Self::Featured => FieldType::Bool,
            Self::PriceCurrency => FieldType::Currency,
            Self::UpdatedAt | Self::ScrapedAt => FieldType::Timestamp,
            Self::Photos => FieldType::List,
            _ => FieldType::Text,
        }
    }

    /// Whether a source layout may map a raw column onto this field.
    ///
    /// `record_id` is assigned by the adapter and `area_units` is fixed to
    /// square meters after normalization.
    pub fn is_mappable(&self) -> bool {
        !matches!(self, Self::RecordId | Self::AreaUnits)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Canonical area unit label written to the output.
pub const CANONICAL_AREA_UNITS: &str = "m²";

/// Provenance column written after the canonical columns.
pub const SOURCE_COLUMN: &str = "source";

/// Derived columns written after the provenance column.
pub const DERIVED_COLUMNS: [&str; 5] = [
    "price_per_area",
    "area_per_room",
    "price_segment",
    "floor_category",
    "building_type",
];

/// Full column order of the canonical output file.
pub fn output_columns() -> Vec<&'static str> {
    CanonicalField::ALL
        .iter()
        .map(|f| f.column_name())
        .chain(std::iter::once(SOURCE_COLUMN))
        .chain(DERIVED_COLUMNS)
        .collect()
}

// =============================================================================
// Draft and record
// =============================================================================

/// Limits applied by the invariant gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordLimits {
    pub max_rooms: i64,
}

impl Default for RecordLimits {
    fn default() -> Self {
        Self { max_rooms: 20 }
    }
}

/// A partially populated record, built field by field from one raw row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub source_id: Option<String>,
    pub area_value: Option<f64>,
    pub leased: Option<bool>,
    pub floor: Option<i64>,
    pub floors: Option<i64>,
    pub rooms: Option<i64>,
    pub city_id: Option<String>,
    pub city_name: Option<String>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub location_full_name: Option<String>,
    pub price_value: Option<f64>,
    pub price_currency: Option<Currency>,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub company_target_type: Option<String>,
    pub has_mortgage: Option<bool>,
    pub has_bill_of_sale: Option<bool>,
    pub has_repair: Option<bool>,
    pub paid_daily: Option<bool>,
    pub is_business: Option<bool>,
    pub vipped: Option<bool>,
    pub featured: Option<bool>,
    pub updated_at: Option<NaiveDateTime>,
    pub path: Option<String>,
    pub photos_count: Option<u32>,
    pub photos: Option<Vec<String>>,
    pub url: Option<String>,
    pub scraped_at: Option<NaiveDateTime>,
}

impl RecordDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a field already holds a value.
    pub fn is_set(&self, field: CanonicalField) -> bool {
        match field {
            CanonicalField::RecordId | CanonicalField::AreaUnits => true,
            CanonicalField::SourceId => self.source_id.is_some(),
            CanonicalField::AreaValue => self.area_value.is_some(),
            CanonicalField::Leased => self.leased.is_some(),
            CanonicalField::Floor => self.floor.is_some(),
            CanonicalField::Floors => self.floors.is_some(),
            CanonicalField::Rooms => self.rooms.is_some(),
            CanonicalField::CityId => self.city_id.is_some(),
            CanonicalField::CityName => self.city_name.is_some(),
            CanonicalField::LocationId => self.location_id.is_some(),
            CanonicalField::LocationName => self.location_name.is_some(),
            CanonicalField::LocationFullName => self.location_full_name.is_some(),
            CanonicalField::PriceValue => self.price_value.is_some(),
            CanonicalField::PriceCurrency => self.price_currency.is_some(),
            CanonicalField::CompanyId => self.company_id.is_some(),
            CanonicalField::CompanyName => self.company_name.is_some(),
            CanonicalField::CompanyTargetType => self.company_target_type.is_some(),
            CanonicalField::HasMortgage => self.has_mortgage.is_some(),
            CanonicalField::HasBillOfSale => self.has_bill_of_sale.is_some(),
            CanonicalField::HasRepair => self.has_repair.is_some(),
            CanonicalField::PaidDaily => self.paid_daily.is_some(),
            CanonicalField::IsBusiness => self.is_business.is_some(),
            CanonicalField::Vipped => self.vipped.is_some(),
            CanonicalField::Featured => self.featured.is_some(),
            CanonicalField::UpdatedAt => self.updated_at.is_some(),
            CanonicalField::Path => self.path.is_some(),
            CanonicalField::PhotosCount => self.photos_count.is_some(),
            CanonicalField::Photos => self.photos.is_some(),
            CanonicalField::Url => self.url.is_some(),
            CanonicalField::ScrapedAt => self.scraped_at.is_some(),
        }
    }

    /// Store a normalized value. The first non-null value for a field wins,
    /// so layouts can list fallback columns after the primary one.
    pub fn assign(
        &mut self,
        field: CanonicalField,
        value: CanonicalValue,
    ) -> Result<(), NormalizationError> {
        if self.is_set(field) {
            return Ok(());
        }

        let mismatch = |value: &CanonicalValue| {
            NormalizationError::new(
                field,
                value.to_string(),
                format!("value does not fit a {:?} field", field.field_type()),
            )
        };

        match (field, value) {
            (CanonicalField::SourceId, CanonicalValue::Text(v)) => self.source_id = Some(v),
            (CanonicalField::CityId, CanonicalValue::Text(v)) => self.city_id = Some(v),
            (CanonicalField::CityName, CanonicalValue::Text(v)) => self.city_name = Some(v),
            (CanonicalField::LocationId, CanonicalValue::Text(v)) => self.location_id = Some(v),
            (CanonicalField::LocationName, CanonicalValue::Text(v)) => {
                self.location_name = Some(v)
            }
            (CanonicalField::LocationFullName, CanonicalValue::Text(v)) => {
                self.location_full_name = Some(v)
            }
            (CanonicalField::CompanyId, CanonicalValue::Text(v)) => self.company_id = Some(v),
            (CanonicalField::CompanyName, CanonicalValue::Text(v)) => self.company_name = Some(v),
            (CanonicalField::CompanyTargetType, CanonicalValue::Text(v)) => {
                self.company_target_type = Some(v)
            }
            (CanonicalField::Path, CanonicalValue::Text(v)) => self.path = Some(v),
            (CanonicalField::Url, CanonicalValue::Text(v)) => self.url = Some(v),
            (CanonicalField::AreaValue, CanonicalValue::Real(v)) => self.area_value = Some(v),
            (CanonicalField::PriceValue, CanonicalValue::Real(v)) => self.price_value = Some(v),
            (CanonicalField::Floor, CanonicalValue::Integer(v)) => self.floor = Some(v),
            (CanonicalField::Floors, CanonicalValue::Integer(v)) => self.floors = Some(v),
            (CanonicalField::Rooms, CanonicalValue::Integer(v)) => self.rooms = Some(v),
            (CanonicalField::PhotosCount, CanonicalValue::Integer(v)) => {
                let count = u32::try_from(v).map_err(|_| {
                    NormalizationError::new(field, v.to_string(), "photo count out of range")
                })?;
                self.photos_count = Some(count)
            }
            (CanonicalField::Leased, CanonicalValue::Bool(v)) => self.leased = Some(v),
            (CanonicalField::HasMortgage, CanonicalValue::Bool(v)) => self.has_mortgage = Some(v),
            (CanonicalField::HasBillOfSale, CanonicalValue::Bool(v)) => {
                self.has_bill_of_sale = Some(v)
            }
            (CanonicalField::HasRepair, CanonicalValue::Bool(v)) => self.has_repair = Some(v),
            (CanonicalField::PaidDaily, CanonicalValue::Bool(v)) => self.paid_daily = Some(v),
            (CanonicalField::IsBusiness, CanonicalValue::Bool(v)) => self.is_business = Some(v),
            (CanonicalField::Vipped, CanonicalValue::Bool(v)) => self.vipped = Some(v),
            (CanonicalField::Featured, CanonicalValue::Bool(v)) => self.featured = Some(v),
            (CanonicalField::PriceCurrency, CanonicalValue::Currency(v)) => {
                self.price_currency = Some(v)
            }
            (CanonicalField::UpdatedAt, CanonicalValue::Timestamp(v)) => self.updated_at = Some(v),
            (CanonicalField::ScrapedAt, CanonicalValue::Timestamp(v)) => self.scraped_at = Some(v),
            (CanonicalField::Photos, CanonicalValue::List(v)) => self.photos = Some(v),
            (_, other) => return Err(mismatch(&other)),
        }

        Ok(())
    }

    /// Enforce the canonical invariants and freeze the draft into a record.
    pub fn into_record(
        self,
        record_id: String,
        source: String,
        limits: &RecordLimits,
    ) -> Result<ListingRecord, InvariantViolation> {
        let area_value = match self.area_value {
            None => return Err(InvariantViolation::MissingArea),
            Some(v) if !(v.is_finite() && v > 0.0) => {
                return Err(InvariantViolation::NonPositiveArea(v));
            }
            Some(v) => v,
        };

        let price_value = match self.price_value {
            None => return Err(InvariantViolation::MissingPrice),
            Some(v) if !v.is_finite() || v < 0.0 => {
                return Err(InvariantViolation::NegativePrice(v));
            }
            Some(v) => v,
        };

        if let Some(rooms) = self.rooms
            && !(1..=limits.max_rooms).contains(&rooms)
        {
            return Err(InvariantViolation::RoomsOutOfRange {
                rooms,
                max: limits.max_rooms,
            });
        }

        if let Some(floor) = self.floor
            && floor < 0
        {
            return Err(InvariantViolation::NegativeFloor(floor));
        }

        if let Some(floors) = self.floors
            && floors < 1
        {
            return Err(InvariantViolation::InvalidFloorCount(floors));
        }

        if let (Some(floor), Some(floors)) = (self.floor, self.floors)
            && floor > floors
        {
            return Err(InvariantViolation::FloorAboveFloors { floor, floors });
        }

        let photos = self.photos.unwrap_or_default();
        let photos_count = self
            .photos_count
            .unwrap_or_else(|| u32::try_from(photos.len()).unwrap_or(u32::MAX));

        Ok(ListingRecord {
            record_id,
            source,
            source_rank: 0,
            source_id: self.source_id,
            area_value,
            leased: self.leased.unwrap_or(false),
            floor: self.floor,
            floors: self.floors,
            rooms: self.rooms,
            city_id: self.city_id,
            city_name: self.city_name,
            location_id: self.location_id,
            location_name: self.location_name,
            location_full_name: self.location_full_name,
            price_value,
            price_currency: self.price_currency.unwrap_or_default(),
            company_id: self.company_id,
            company_name: self.company_name,
            company_target_type: self.company_target_type,
            has_mortgage: self.has_mortgage.unwrap_or(false),
            has_bill_of_sale: self.has_bill_of_sale.unwrap_or(false),
            has_repair: self.has_repair.unwrap_or(false),
            paid_daily: self.paid_daily.unwrap_or(false),
            is_business: self.is_business.unwrap_or(false),
            vipped: self.vipped.unwrap_or(false),
            featured: self.featured.unwrap_or(false),
            updated_at: self.updated_at,
            path: self.path,
            photos_count,
            photos,
            url: self.url,
            scraped_at: self.scraped_at,
        })
    }
}

/// A validated listing in the canonical schema.
///
/// Every instance satisfies `area_value > 0`, `price_value >= 0`,
/// `rooms` in `1..=max_rooms`, `floor >= 0`, `floors >= 1` and
/// `floor <= floors` when both are known.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub record_id: String,
    /// Declared name of the source this record came from.
    pub source: String,
    /// Position of the source in the declared order, stamped by the merger.
    pub source_rank: usize,
    pub source_id: Option<String>,
    pub area_value: f64,
    pub leased: bool,
    pub floor: Option<i64>,
    pub floors: Option<i64>,
    pub rooms: Option<i64>,
    pub city_id: Option<String>,
    pub city_name: Option<String>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub location_full_name: Option<String>,
    pub price_value: f64,
    pub price_currency: Currency,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub company_target_type: Option<String>,
    pub has_mortgage: bool,
    pub has_bill_of_sale: bool,
    pub has_repair: bool,
    pub paid_daily: bool,
    pub is_business: bool,
    pub vipped: bool,
    pub featured: bool,
    pub updated_at: Option<NaiveDateTime>,
    pub path: Option<String>,
    pub photos_count: u32,
    pub photos: Vec<String>,
    pub url: Option<String>,
    pub scraped_at: Option<NaiveDateTime>,
}

impl ListingRecord {
    /// Return the record stamped with its source priority rank.
    pub fn with_source_rank(self, source_rank: usize) -> Self {
        Self {
            source_rank,
            ..self
        }
    }

    /// Price per square meter in the reference currency.
    pub fn price_per_area(&self) -> f64 {
        self.price_value / self.area_value
    }
}

// =============================================================================
// Derived fields
// =============================================================================

/// Price band of a listing in the reference currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceSegment {
    Budget,
    MidRange,
    Luxury,
}

impl PriceSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::MidRange => "mid-range",
            Self::Luxury => "luxury",
        }
    }
}

/// Floor band of the unit within its building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FloorCategory {
    Ground,
    Low,
    Mid,
    High,
    VeryHigh,
}

impl FloorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
            Self::VeryHigh => "very-high",
        }
    }
}

/// Building height class from the total number of floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildingType {
    LowRise,
    MidRise,
    HighRise,
    Skyscraper,
}

impl BuildingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowRise => "low-rise",
            Self::MidRise => "mid-rise",
            Self::HighRise => "high-rise",
            Self::Skyscraper => "skyscraper",
        }
    }
}

/// Fields computed by the Feature Enricher.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub price_per_area: f64,
    pub area_per_room: Option<f64>,
    pub price_segment: PriceSegment,
    pub floor_category: Option<FloorCategory>,
    pub building_type: Option<BuildingType>,
}

/// A surviving record together with its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub record: ListingRecord,
    pub derived: DerivedFields,
}
