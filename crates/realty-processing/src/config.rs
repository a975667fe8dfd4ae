//! Configuration types for the unification pipeline.

use crate::error::{PipelineError, Result};
use crate::normalizer::Currency;
use crate::pipeline::outliers::OutlierField;
use crate::sources::{SourceLayout, builtin_layouts};
use crate::types::RecordLimits;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Field used to split records into outlier strata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StratifyBy {
    /// One stratum per room count
    #[default]
    Rooms,
    /// One stratum per city
    City,
    /// A single global distribution
    None,
}

/// Reference currency and exchange rates.
///
/// Rates are expressed against any common base; only their ratios matter.
/// The reference currency must have a rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Default: AZN
    pub reference: Currency,

    /// Default: AZN 1.0, USD 1.70, EUR 1.85, RUB 0.019
    pub rates: BTreeMap<Currency, f64>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            reference: Currency::Azn,
            rates: BTreeMap::from([
                (Currency::Azn, 1.0),
                (Currency::Usd, 1.70),
                (Currency::Eur, 1.85),
                (Currency::Rub, 0.019),
            ]),
        }
    }
}

impl CurrencyConfig {
    /// Convert an amount into the reference currency. `None` when either
    /// currency has no rate.
    pub fn convert(&self, amount: f64, from: Currency) -> Option<f64> {
        if from == self.reference {
            return Some(amount);
        }
        let from_rate = self.rates.get(&from)?;
        let reference_rate = self.rates.get(&self.reference)?;
        Some(amount * from_rate / reference_rate)
    }
}

/// Deduplication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Default: true
    pub enabled: bool,

    /// Area rounding step in m².
    /// Default: 1.0
    pub area_step: f64,

    /// Price rounding step in the reference currency.
    /// Default: 1000.0
    pub price_step: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            area_step: 1.0,
            price_step: 1000.0,
        }
    }
}

/// Stratified percentile trimming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Default: true
    pub enabled: bool,

    /// Default: 0.01
    pub lower_quantile: f64,

    /// Default: 0.99
    pub upper_quantile: f64,

    /// Default: Rooms
    pub stratify_by: StratifyBy,

    /// Strata smaller than this are left untrimmed.
    /// Default: 30
    pub min_stratum_size: usize,

    /// Fields checked, in order; the first one out of band names the drop.
    /// Default: price_value, area_value, price_per_area
    pub fields: Vec<OutlierField>,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lower_quantile: 0.01,
            upper_quantile: 0.99,
            stratify_by: StratifyBy::default(),
            min_stratum_size: 30,
            fields: vec![
                OutlierField::PriceValue,
                OutlierField::AreaValue,
                OutlierField::PricePerArea,
            ],
        }
    }
}

/// Band boundaries for the derived categorical fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    /// Prices strictly below are budget. Default: 80000
    pub budget_below: f64,
    /// Prices strictly above are luxury. Default: 200000
    pub luxury_above: f64,

    /// Default: 1
    pub ground_floor_max: i64,
    /// Default: 3
    pub low_floor_max: i64,
    /// Default: 6
    pub mid_floor_max: i64,
    /// Default: 10
    pub high_floor_max: i64,

    /// Default: 5
    pub low_rise_max: i64,
    /// Default: 10
    pub mid_rise_max: i64,
    /// Default: 16
    pub high_rise_max: i64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            budget_below: 80_000.0,
            luxury_above: 200_000.0,
            ground_floor_max: 1,
            low_floor_max: 3,
            mid_floor_max: 6,
            high_floor_max: 10,
            low_rise_max: 5,
            mid_rise_max: 10,
            high_rise_max: 16,
        }
    }
}

impl BandConfig {
    fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        let ordered = self.budget_below.is_finite()
            && self.luxury_above.is_finite()
            && self.budget_below <= self.luxury_above;
        if !ordered {
            return Err(ConfigValidationError::InvalidBands(format!(
                "budget_below ({}) must not exceed luxury_above ({})",
                self.budget_below, self.luxury_above
            )));
        }

        let floors = [
            self.ground_floor_max,
            self.low_floor_max,
            self.mid_floor_max,
            self.high_floor_max,
        ];
        if floors.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigValidationError::InvalidBands(format!(
                "floor bands must be ascending, got {floors:?}"
            )));
        }

        let buildings = [self.low_rise_max, self.mid_rise_max, self.high_rise_max];
        if buildings.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigValidationError::InvalidBands(format!(
                "building bands must be ascending, got {buildings:?}"
            )));
        }

        Ok(())
    }
}

/// Configuration for a pipeline run.
///
/// Every field has a default, so a JSON file only needs to list overrides.
///
/// # Example
///
/// ```rust,ignore
/// use realty_processing::config::{PipelineConfig, StratifyBy};
///
/// let config = PipelineConfig::builder()
///     .data_dir("exports")
///     .stratify_by(StratifyBy::City)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory source files are resolved against.
    /// Default: "data"
    pub data_dir: PathBuf,

    /// Source layouts in priority order.
    /// Default: the 16 built-in layouts
    pub sources: Vec<SourceLayout>,

    /// Default: "output"
    pub output_dir: PathBuf,

    /// Output file stem.
    /// Default: "combined_real_estate"
    pub output_name: String,

    /// Whether to write `<output_name>_rejections.csv`.
    /// Default: true
    pub write_rejections: bool,

    /// Worker threads for source loading; 0 uses the available parallelism.
    /// Default: 0
    pub max_workers: usize,

    /// Upper bound for `rooms`.
    /// Default: 20
    pub max_rooms: i64,

    pub currency: CurrencyConfig,
    pub dedup: DedupConfig,
    pub outliers: OutlierConfig,
    pub bands: BandConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sources: builtin_layouts(),
            output_dir: PathBuf::from("output"),
            output_name: "combined_real_estate".to_string(),
            write_rejections: true,
            max_workers: 0,
            max_rooms: RecordLimits::default().max_rooms,
            currency: CurrencyConfig::default(),
            dedup: DedupConfig::default(),
            outliers: OutlierConfig::default(),
            bands: BandConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn limits(&self) -> RecordLimits {
        RecordLimits {
            max_rooms: self.max_rooms,
        }
    }

    /// Path of a source file.
    pub fn source_path(&self, layout: &SourceLayout) -> PathBuf {
        self.data_dir.join(&layout.file)
    }

    /// Worker count for source loading, never more than the number of sources.
    pub fn effective_workers(&self) -> usize {
        let requested = if self.max_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.max_workers
        };
        requested.min(self.sources.len()).max(1)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.sources.is_empty() {
            return Err(ConfigValidationError::NoSources);
        }

        let mut seen = HashSet::new();
        for layout in &self.sources {
            if !seen.insert(layout.name.as_str()) {
                return Err(ConfigValidationError::DuplicateSource(layout.name.clone()));
            }
            layout.validate()?;
        }

        if self.output_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptyOutputName);
        }

        if self.max_rooms < 1 {
            return Err(ConfigValidationError::InvalidMaxRooms(self.max_rooms));
        }

        if !self.currency.rates.contains_key(&self.currency.reference) {
            return Err(ConfigValidationError::MissingExchangeRate(
                self.currency.reference,
            ));
        }
        for (currency, rate) in &self.currency.rates {
            if !(rate.is_finite() && *rate > 0.0) {
                return Err(ConfigValidationError::InvalidExchangeRate {
                    currency: *currency,
                    value: *rate,
                });
            }
        }

        for (field, value) in [
            ("dedup.area_step", self.dedup.area_step),
            ("dedup.price_step", self.dedup.price_step),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigValidationError::InvalidStep {
                    field: field.to_string(),
                    value,
                });
            }
        }

        for (field, value) in [
            ("outliers.lower_quantile", self.outliers.lower_quantile),
            ("outliers.upper_quantile", self.outliers.upper_quantile),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }
        if self.outliers.lower_quantile >= self.outliers.upper_quantile {
            return Err(ConfigValidationError::InvalidQuantileRange {
                lower: self.outliers.lower_quantile,
                upper: self.outliers.upper_quantile,
            });
        }

        self.bands.validate()
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid quantile range: lower {lower} must be below upper {upper}")]
    InvalidQuantileRange { lower: f64, upper: f64 },

    #[error("Invalid rounding step for '{field}': {value} (must be positive)")]
    InvalidStep { field: String, value: f64 },

    #[error("Invalid bands: {0}")]
    InvalidBands(String),

    #[error("No exchange rate for the reference currency {0}")]
    MissingExchangeRate(Currency),

    #[error("Invalid exchange rate for {currency}: {value} (must be positive)")]
    InvalidExchangeRate { currency: Currency, value: f64 },

    #[error("Invalid max_rooms: {0} (must be at least 1)")]
    InvalidMaxRooms(i64),

    #[error("Output name must not be empty")]
    EmptyOutputName,

    #[error("No sources configured")]
    NoSources,

    #[error("Source '{0}' is declared more than once")]
    DuplicateSource(String),

    #[error("Invalid layout for source '{source_name}': {reason}")]
    InvalidLayout { source_name: String, reason: String },
}

impl From<ConfigValidationError> for PipelineError {
    fn from(error: ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(error.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    data_dir: Option<PathBuf>,
    sources: Option<Vec<SourceLayout>>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
    write_rejections: Option<bool>,
    max_workers: Option<usize>,
    max_rooms: Option<i64>,
    currency: Option<CurrencyConfig>,
    dedup: Option<DedupConfig>,
    outliers: Option<OutlierConfig>,
    bands: Option<BandConfig>,
}

impl PipelineConfigBuilder {
    /// Set the directory source files are read from.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Replace the source layouts. Order sets source priority.
    pub fn sources(mut self, sources: Vec<SourceLayout>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the output file stem (without extension).
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn write_rejections(mut self, write: bool) -> Self {
        self.write_rejections = Some(write);
        self
    }

    /// Set the number of loader threads; 0 uses the available parallelism.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn max_rooms(mut self, max_rooms: i64) -> Self {
        self.max_rooms = Some(max_rooms);
        self
    }

    pub fn currency(mut self, currency: CurrencyConfig) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = Some(dedup);
        self
    }

    pub fn outliers(mut self, outliers: OutlierConfig) -> Self {
        self.outliers = Some(outliers);
        self
    }

    /// Set the outlier stratification key, keeping other outlier settings.
    pub fn stratify_by(mut self, stratify_by: StratifyBy) -> Self {
        let outliers = self.outliers.take().unwrap_or_default();
        self.outliers = Some(OutlierConfig {
            stratify_by,
            ..outliers
        });
        self
    }

    pub fn bands(mut self, bands: BandConfig) -> Self {
        self.bands = Some(bands);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            sources: self.sources.unwrap_or(defaults.sources),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            output_name: self.output_name.unwrap_or(defaults.output_name),
            write_rejections: self.write_rejections.unwrap_or(defaults.write_rejections),
            max_workers: self.max_workers.unwrap_or(defaults.max_workers),
            max_rooms: self.max_rooms.unwrap_or(defaults.max_rooms),
            currency: self.currency.unwrap_or(defaults.currency),
            dedup: self.dedup.unwrap_or(defaults.dedup),
            outliers: self.outliers.unwrap_or(defaults.outliers),
            bands: self.bands.unwrap_or(defaults.bands),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.sources.len(), 16);
        assert_eq!(config.output_name, "combined_real_estate");
        assert_eq!(config.max_rooms, 20);
        assert_eq!(config.outliers.min_stratum_size, 30);
        assert_eq!(config.outliers.stratify_by, StratifyBy::Rooms);
        assert_eq!(config.dedup.price_step, 1000.0);
        assert_eq!(config.bands.budget_below, 80_000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .data_dir("exports")
            .output_name("listings")
            .stratify_by(StratifyBy::City)
            .max_workers(2)
            .write_rejections(false)
            .build()
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("exports"));
        assert_eq!(config.output_name, "listings");
        assert_eq!(config.outliers.stratify_by, StratifyBy::City);
        assert_eq!(config.outliers.lower_quantile, 0.01);
        assert_eq!(config.effective_workers(), 2);
        assert!(!config.write_rejections);
    }

    #[test]
    fn test_validation_quantiles() {
        let result = PipelineConfig::builder()
            .outliers(OutlierConfig {
                upper_quantile: 1.5,
                ..OutlierConfig::default()
            })
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));

        let result = PipelineConfig::builder()
            .outliers(OutlierConfig {
                lower_quantile: 0.9,
                upper_quantile: 0.1,
                ..OutlierConfig::default()
            })
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidQuantileRange { .. }
        ));
    }

    #[test]
    fn test_validation_bands() {
        let result = PipelineConfig::builder()
            .bands(BandConfig {
                budget_below: 300_000.0,
                ..BandConfig::default()
            })
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidBands(_)
        ));
    }

    #[test]
    fn test_validation_currency() {
        let result = PipelineConfig::builder()
            .currency(CurrencyConfig {
                reference: Currency::Gbp,
                ..CurrencyConfig::default()
            })
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::MissingExchangeRate(Currency::Gbp)
        ));
    }

    #[test]
    fn test_validation_duplicate_source() {
        let mut sources = builtin_layouts();
        sources.push(sources[0].clone());
        let result = PipelineConfig::builder().sources(sources).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::DuplicateSource(name) if name == "bina_sale"
        ));
    }

    #[test]
    fn test_currency_convert() {
        let currency = CurrencyConfig::default();
        assert_eq!(currency.convert(100.0, Currency::Azn), Some(100.0));
        assert!((currency.convert(100.0, Currency::Usd).unwrap() - 170.0).abs() < 1e-9);
        assert_eq!(currency.convert(100.0, Currency::Gbp), None);

        let usd = CurrencyConfig {
            reference: Currency::Usd,
            ..CurrencyConfig::default()
        };
        assert!((usd.convert(170.0, Currency::Azn).unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "data_dir": "/srv/exports",
            "outliers": {"stratify_by": "city", "min_stratum_size": 50},
            "currency": {"rates": {"AZN": 1.0, "USD": 1.7}}
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/exports"));
        assert_eq!(config.outliers.stratify_by, StratifyBy::City);
        assert_eq!(config.outliers.min_stratum_size, 50);
        assert_eq!(config.outliers.upper_quantile, 0.99);
        assert_eq!(config.currency.reference, Currency::Azn);
        assert_eq!(config.currency.rates.len(), 2);
        assert_eq!(config.sources.len(), 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let config = PipelineConfig::default();
        let json = config.to_json_pretty().unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_source_path() {
        let config = PipelineConfig::builder().data_dir("in").build().unwrap();
        let mulk = &config.sources[8];
        assert_eq!(
            config.source_path(mulk),
            PathBuf::from("in/mulk_data_20250929_143644.csv")
        );
    }
}
