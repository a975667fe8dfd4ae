//! The source adapter capability and its layout-driven implementation.

use super::layout::{Fallback, SourceLayout, ValueSource};
use super::reader::{RawRow, RawTable};
use crate::config::CurrencyConfig;
use crate::error::{NormalizationError, PipelineError, Result, RowError};
use crate::normalizer::{CanonicalValue, ValueKind, normalize_value, price_cell_currency};
use crate::types::{CanonicalField, ListingRecord, RecordDraft, RecordLimits};
use crate::utils::{extract_rooms_from_text, non_placeholder};
use chrono::NaiveDateTime;
use std::borrow::Cow;

/// Per-file information available to every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowContext {
    /// Snapshot time of the export, used as `scraped_at` when the row carries
    /// none.
    pub scraped_at: Option<NaiveDateTime>,
}

/// Turns raw rows of one source into canonical records.
///
/// Adapters hold no mutable state and never see each other's data, so they
/// can run on any thread.
pub trait SourceAdapter: Send + Sync {
    /// Declared source name.
    fn name(&self) -> &str;

    /// Columns the file must carry.
    fn required_columns(&self) -> Vec<String>;

    /// Fail the source when a required column is missing.
    fn check_layout(&self, table: &RawTable) -> Result<()> {
        let missing: Vec<String> = self
            .required_columns()
            .into_iter()
            .filter(|c| !table.has_column(c))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::SchemaMismatch {
                source_name: self.name().to_string(),
                missing_columns: missing,
            })
        }
    }

    /// Normalize one raw row into a validated record.
    fn normalize(
        &self,
        row: &RawRow<'_>,
        ctx: &RowContext,
    ) -> std::result::Result<ListingRecord, RowError>;
}

/// Adapter driven by a declarative [`SourceLayout`].
#[derive(Debug, Clone)]
pub struct MappedAdapter {
    layout: SourceLayout,
    currency: CurrencyConfig,
    limits: RecordLimits,
}

static_assertions::assert_impl_all!(MappedAdapter: Send, Sync);

impl MappedAdapter {
    pub fn new(layout: SourceLayout, currency: CurrencyConfig, limits: RecordLimits) -> Self {
        Self {
            layout,
            currency,
            limits,
        }
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    fn resolve<'a>(source: &'a ValueSource, row: &RawRow<'a>) -> Option<Cow<'a, str>> {
        match source {
            ValueSource::Column(column) => row.get(column).map(Cow::Borrowed),
            ValueSource::Columns(columns) => columns
                .iter()
                .find_map(|c| non_placeholder(row.get(c)))
                .map(Cow::Borrowed),
            ValueSource::Constant(value) => Some(Cow::Borrowed(value.as_str())),
            ValueSource::Template { column, prefix } => {
                non_placeholder(row.get(column)).map(|value| {
                    if value.starts_with("http://") || value.starts_with("https://") {
                        Cow::Borrowed(value)
                    } else {
                        Cow::Owned(format!("{prefix}{value}"))
                    }
                })
            }
            ValueSource::RowNumber => Some(Cow::Owned(row.number().to_string())),
        }
    }

    fn apply_fallbacks(
        &self,
        row: &RawRow<'_>,
        draft: &mut RecordDraft,
    ) -> std::result::Result<(), NormalizationError> {
        for fallback in &self.layout.fallbacks {
            match fallback {
                Fallback::RoomsFromText { column } => {
                    if draft.rooms.is_none()
                        && let Some(rooms) = row.get(column).and_then(extract_rooms_from_text)
                    {
                        draft.assign(CanonicalField::Rooms, CanonicalValue::Integer(rooms))?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Express the price in the reference currency.
    ///
    /// A currency column wins over a marker in the price cell; with neither,
    /// the price is already in the reference currency.
    fn convert_price(&self, draft: &mut RecordDraft) -> std::result::Result<(), NormalizationError> {
        let reference = self.currency.reference;
        let from = draft.price_currency.unwrap_or(reference);

        if let Some(price) = draft.price_value
            && from != reference
        {
            let converted = self.currency.convert(price, from).ok_or_else(|| {
                NormalizationError::new(
                    CanonicalField::PriceCurrency,
                    from.code(),
                    format!("no exchange rate to {reference}"),
                )
            })?;
            draft.price_value = Some(converted);
        }

        draft.price_currency = Some(reference);
        Ok(())
    }
}

impl SourceAdapter for MappedAdapter {
    fn name(&self) -> &str {
        &self.layout.name
    }

    fn required_columns(&self) -> Vec<String> {
        self.layout.required_columns()
    }

    fn normalize(
        &self,
        row: &RawRow<'_>,
        ctx: &RowContext,
    ) -> std::result::Result<ListingRecord, RowError> {
        let mut draft = RecordDraft::new();
        let mut cell_currency = None;

        for mapping in &self.layout.fields {
            if draft.is_set(mapping.field) {
                continue;
            }
            let raw = Self::resolve(&mapping.source, row);
            let unit_cell = mapping.unit_column.as_deref().and_then(|c| row.get(c));
            if let Some(value) =
                normalize_value(mapping.field, raw.as_deref(), &mapping.kind, unit_cell)?
            {
                if mapping.field == CanonicalField::PriceValue
                    && matches!(mapping.kind, ValueKind::Price)
                {
                    cell_currency = price_cell_currency(mapping.field, raw.as_deref())?;
                }
                draft.assign(mapping.field, value)?;
            }
        }

        if draft.price_currency.is_none() {
            draft.price_currency = cell_currency;
        }

        self.apply_fallbacks(row, &mut draft)?;
        self.convert_price(&mut draft)?;

        if draft.scraped_at.is_none() {
            draft.scraped_at = ctx.scraped_at;
        }

        let record_id = format!("{}-{}", self.layout.name, row.number());
        let record = draft.into_record(record_id, self.layout.name.clone(), &self.limits)?;
        Ok(record)
    }
}
