//! Approximate-identity deduplication.
//!
//! Listings are re-posted across platforms and re-scraped over time. Records
//! sharing a location, a rounded area, a rounded price and a room count are
//! treated as one listing; the most recently scraped one survives.

use crate::config::DedupConfig;
use crate::pipeline::tally::{DropReason, Rejection, Tally};
use crate::types::ListingRecord;
use crate::utils::normalize_key_text;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Identity of a physical listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Listing {
        location: String,
        area_bucket: i64,
        price_bucket: i64,
        rooms: Option<i64>,
    },
    /// Records without any location only match re-scrapes of themselves.
    Provenance { source: String, id: String },
}

/// Collapses records that describe the same listing.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    config: DedupConfig,
}

fn bucket(value: f64, step: f64) -> i64 {
    (value / step).round() as i64
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn key(&self, record: &ListingRecord) -> DedupKey {
        let location = [
            &record.location_name,
            &record.city_name,
            &record.location_full_name,
        ]
        .into_iter()
        .flatten()
        .map(|s| normalize_key_text(s))
        .find(|s| !s.is_empty());

        match location {
            Some(location) => DedupKey::Listing {
                location,
                area_bucket: bucket(record.area_value, self.config.area_step),
                price_bucket: bucket(record.price_value, self.config.price_step),
                rooms: record.rooms,
            },
            None => DedupKey::Provenance {
                source: record.source.clone(),
                id: record
                    .source_id
                    .clone()
                    .unwrap_or_else(|| record.record_id.clone()),
            },
        }
    }

    /// Whether `a` should be kept over `b`: fresher scrape first, then
    /// higher-priority source.
    fn preferred(a: &ListingRecord, b: &ListingRecord) -> bool {
        match a.scraped_at.cmp(&b.scraped_at) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => a.source_rank < b.source_rank,
        }
    }

    /// Keep one record per key, preserving input order among survivors.
    pub fn deduplicate(&self, records: Vec<ListingRecord>) -> (Vec<ListingRecord>, Tally) {
        if !self.config.enabled {
            return (records, Tally::new());
        }

        // key -> index of the current best record
        let mut best: HashMap<DedupKey, usize> = HashMap::new();
        let keys: Vec<DedupKey> = records.iter().map(|r| self.key(r)).collect();

        for (idx, key) in keys.iter().enumerate() {
            match best.get_mut(key) {
                Some(current) => {
                    if Self::preferred(&records[idx], &records[*current]) {
                        *current = idx;
                    }
                }
                None => {
                    best.insert(key.clone(), idx);
                }
            }
        }

        let winners: Vec<usize> = keys.iter().map(|key| best[key]).collect();
        let winner_ids: Vec<String> = winners
            .iter()
            .map(|&w| records[w].record_id.clone())
            .collect();

        let mut kept = Vec::with_capacity(best.len());
        let mut tally = Tally::new();
        for (idx, record) in records.into_iter().enumerate() {
            if winners[idx] == idx {
                kept.push(record);
            } else {
                tally = tally.with_drop(Rejection::new(
                    record.record_id,
                    record.source,
                    DropReason::Duplicate,
                    format!("superseded by {}", winner_ids[idx]),
                ));
            }
        }

        (kept, tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordDraft, RecordLimits};
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn at(day: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2025, 2, day).and_then(|d| d.and_hms_opt(12, 0, 0))
    }

    fn listing(
        id: &str,
        source: &str,
        rank: usize,
        location: Option<&str>,
        scraped_at: Option<NaiveDateTime>,
    ) -> ListingRecord {
        RecordDraft {
            source_id: Some(id.to_string()),
            area_value: Some(100.0),
            price_value: Some(150_000.0),
            rooms: Some(3),
            location_name: location.map(String::from),
            scraped_at,
            ..RecordDraft::default()
        }
        .into_record(id.to_string(), source.to_string(), &RecordLimits::default())
        .unwrap()
        .with_source_rank(rank)
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(DedupConfig::default())
    }

    #[test]
    fn test_later_scrape_wins() {
        let records = vec![
            listing("a", "bina_sale", 0, Some("Yasamal r."), at(1)),
            listing("b", "mulk", 8, Some("yasamal r"), at(5)),
        ];
        let (kept, tally) = dedup().deduplicate(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record_id, "b");
        assert_eq!(tally.dropped(DropReason::Duplicate), 1);
        assert_eq!(tally.rejections()[0].detail, "superseded by b");
    }

    #[test]
    fn test_unknown_scrape_time_is_oldest() {
        let records = vec![
            listing("a", "bina_sale", 0, Some("Nəsimi"), None),
            listing("b", "mulk", 8, Some("Nəsimi"), at(1)),
        ];
        let (kept, _) = dedup().deduplicate(records);
        assert_eq!(kept[0].record_id, "b");
    }

    #[test]
    fn test_tie_broken_by_source_priority() {
        let records = vec![
            listing("a", "evv_az", 13, Some("Xətai"), at(3)),
            listing("b", "ipoteka_csv", 2, Some("Xətai"), at(3)),
        ];
        let (kept, _) = dedup().deduplicate(records);
        assert_eq!(kept[0].record_id, "b");
    }

    #[test]
    fn test_tie_broken_by_input_order() {
        let records = vec![
            listing("a", "mulk", 8, Some("Xətai"), at(3)),
            listing("b", "mulk", 8, Some("Xətai"), at(3)),
        ];
        let (kept, _) = dedup().deduplicate(records);
        assert_eq!(kept[0].record_id, "a");
    }

    #[test]
    fn test_rounding_tolerance() {
        let mut near = listing("b", "mulk", 8, Some("Xətai"), at(2));
        near.area_value = 100.3;
        near.price_value = 150_400.0;
        let records = vec![listing("a", "mulk", 8, Some("Xətai"), at(1)), near];
        let (kept, _) = dedup().deduplicate(records);
        assert_eq!(kept.len(), 1);

        let mut far = listing("c", "mulk", 8, Some("Xətai"), at(2));
        far.price_value = 152_000.0;
        let records = vec![listing("a", "mulk", 8, Some("Xətai"), at(1)), far];
        let (kept, _) = dedup().deduplicate(records);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_records_without_location_use_provenance() {
        let records = vec![
            listing("1", "unvan", 7, None, at(1)),
            listing("2", "unvan", 7, None, at(2)),
            listing("1", "unvan", 7, None, at(3)),
        ];
        let (kept, tally) = dedup().deduplicate(records);
        let ids: Vec<_> = kept.iter().map(|r| r.source_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("2"), Some("1")]);
        assert_eq!(tally.total_dropped(), 1);
    }

    #[test]
    fn test_survivors_keep_input_order() {
        let records = vec![
            listing("a", "mulk", 8, Some("Binəqədi"), at(1)),
            listing("b", "mulk", 8, Some("Səbail"), at(1)),
            listing("c", "mulk", 8, Some("Binəqədi"), at(2)),
        ];
        let (kept, _) = dedup().deduplicate(records);
        let ids: Vec<_> = kept.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
