//! Derived listing features.

use crate::config::BandConfig;
use crate::types::{
    BuildingType, DerivedFields, EnrichedRecord, FloorCategory, ListingRecord, PriceSegment,
};

/// Computes ratios and categorical bands for surviving records.
#[derive(Debug, Clone)]
pub struct FeatureEnricher {
    bands: BandConfig,
}

impl FeatureEnricher {
    pub fn new(bands: BandConfig) -> Self {
        Self { bands }
    }

    pub fn price_segment(&self, price: f64) -> PriceSegment {
        if price < self.bands.budget_below {
            PriceSegment::Budget
        } else if price > self.bands.luxury_above {
            PriceSegment::Luxury
        } else {
            PriceSegment::MidRange
        }
    }

    pub fn floor_category(&self, floor: i64) -> FloorCategory {
        let b = &self.bands;
        if floor <= b.ground_floor_max {
            FloorCategory::Ground
        } else if floor <= b.low_floor_max {
            FloorCategory::Low
        } else if floor <= b.mid_floor_max {
            FloorCategory::Mid
        } else if floor <= b.high_floor_max {
            FloorCategory::High
        } else {
            FloorCategory::VeryHigh
        }
    }

    pub fn building_type(&self, floors: i64) -> BuildingType {
        let b = &self.bands;
        if floors <= b.low_rise_max {
            BuildingType::LowRise
        } else if floors <= b.mid_rise_max {
            BuildingType::MidRise
        } else if floors <= b.high_rise_max {
            BuildingType::HighRise
        } else {
            BuildingType::Skyscraper
        }
    }

    pub fn derive(&self, record: &ListingRecord) -> DerivedFields {
        DerivedFields {
            price_per_area: record.price_per_area(),
            area_per_room: record
                .rooms
                .filter(|&rooms| rooms != 0)
                .map(|rooms| record.area_value / rooms as f64),
            price_segment: self.price_segment(record.price_value),
            floor_category: record.floor.map(|f| self.floor_category(f)),
            building_type: record.floors.map(|f| self.building_type(f)),
        }
    }

    pub fn enrich(&self, records: Vec<ListingRecord>) -> Vec<EnrichedRecord> {
        records
            .into_iter()
            .map(|record| EnrichedRecord {
                derived: self.derive(&record),
                record,
            })
            .collect()
    }
}
