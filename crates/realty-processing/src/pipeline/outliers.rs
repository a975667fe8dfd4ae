//! Stratified outlier filtering.
//!
//! Bands are percentile ranges computed per stratum (by default, per room
//! count) on the stage's input, before anything is removed. A record is kept
//! when every configured field lies inside its band, bounds included.

use crate::config::{OutlierConfig, StratifyBy};
use crate::pipeline::tally::{DropReason, Rejection, Tally};
use crate::types::ListingRecord;
use crate::utils::normalize_key_text;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Numeric field checked by the outlier filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierField {
    PriceValue,
    AreaValue,
    PricePerArea,
}

impl OutlierField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceValue => "price_value",
            Self::AreaValue => "area_value",
            Self::PricePerArea => "price_per_area",
        }
    }

    pub fn value(&self, record: &ListingRecord) -> f64 {
        match self {
            Self::PriceValue => record.price_value,
            Self::AreaValue => record.area_value,
            Self::PricePerArea => record.price_per_area(),
        }
    }
}

/// Stratum a record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum StratumKey {
    Rooms(i64),
    City(String),
}

impl fmt::Display for StratumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rooms(rooms) => write!(f, "rooms={rooms}"),
            Self::City(city) => write!(f, "city={city}"),
        }
    }
}

/// Inclusive value range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileBand {
    pub lower: f64,
    pub upper: f64,
}

impl QuantileBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Quantile of a sorted sample, interpolating linearly between order
/// statistics.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let fraction = position - below as f64;
    Some(sorted[below] + (sorted[above] - sorted[below]) * fraction)
}

/// Bands of one group, or `None` when the group is too small to trim.
type GroupBands = Option<Vec<(OutlierField, QuantileBand)>>;

/// Removes records outside their stratum's percentile bands.
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    config: OutlierConfig,
}

impl OutlierFilter {
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    fn stratum(&self, record: &ListingRecord) -> Option<StratumKey> {
        match self.config.stratify_by {
            StratifyBy::Rooms => record.rooms.map(StratumKey::Rooms),
            StratifyBy::City => record
                .city_name
                .as_deref()
                .map(normalize_key_text)
                .filter(|c| !c.is_empty())
                .map(StratumKey::City),
            StratifyBy::None => None,
        }
    }

    fn bands(&self, records: &[&ListingRecord]) -> GroupBands {
        if records.len() < self.config.min_stratum_size {
            return None;
        }
        let bands = self
            .config
            .fields
            .iter()
            .filter_map(|field| {
                let mut values: Vec<f64> = records.iter().map(|r| field.value(r)).collect();
                values.sort_by(f64::total_cmp);
                let lower = quantile(&values, self.config.lower_quantile)?;
                let upper = quantile(&values, self.config.upper_quantile)?;
                Some((*field, QuantileBand { lower, upper }))
            })
            .collect();
        Some(bands)
    }

    /// Filter records, returning the survivors in input order and the drops.
    pub fn filter(&self, records: Vec<ListingRecord>) -> (Vec<ListingRecord>, Tally) {
        if !self.config.enabled || records.is_empty() {
            return (records, Tally::new());
        }

        let keys: Vec<Option<StratumKey>> = records.iter().map(|r| self.stratum(r)).collect();

        let mut groups: BTreeMap<&StratumKey, Vec<&ListingRecord>> = BTreeMap::new();
        for (record, key) in records.iter().zip(&keys) {
            if let Some(key) = key {
                groups.entry(key).or_default().push(record);
            }
        }

        let global = self.bands(&records.iter().collect::<Vec<_>>());
        let stratified: BTreeMap<&StratumKey, GroupBands> = groups
            .iter()
            .map(|(key, members)| {
                let bands = self.bands(members);
                if bands.is_none() {
                    debug!(
                        "Stratum {} has {} records; left untrimmed",
                        key,
                        members.len()
                    );
                }
                (*key, bands)
            })
            .collect();

        let verdicts: Vec<Option<(OutlierField, String)>> = records
            .iter()
            .zip(&keys)
            .map(|(record, key)| {
                let (bands, group) = match key {
                    Some(key) => (stratified.get(key).and_then(|b| b.as_ref()), key.to_string()),
                    None => (global.as_ref(), "global".to_string()),
                };
                bands?.iter().find_map(|(field, band)| {
                    let value = field.value(record);
                    (!band.contains(value)).then(|| {
                        let detail = format!(
                            "{} {} outside [{}, {}] for {}",
                            field.as_str(),
                            value,
                            band.lower,
                            band.upper,
                            group
                        );
                        (*field, detail)
                    })
                })
            })
            .collect();

        let mut kept = Vec::with_capacity(records.len());
        let mut tally = Tally::new();
        for (record, verdict) in records.into_iter().zip(verdicts) {
            match verdict {
                None => kept.push(record),
                Some((field, detail)) => {
                    tally = tally.with_drop(Rejection::new(
                        record.record_id,
                        record.source,
                        DropReason::Outlier(field),
                        detail,
                    ));
                }
            }
        }

        (kept, tally)
    }
}
