//! Declarative source layouts.
//!
//! A [`SourceLayout`] says which raw column feeds which canonical field and
//! how to interpret it. Layouts are plain data: they serialize to JSON so a
//! configuration file can override or add sources without code changes.

use crate::config::ConfigValidationError;
use crate::normalizer::ValueKind;
use crate::types::CanonicalField;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_delimiter() -> char {
    ','
}

/// Where the raw value of a mapping comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// A single column.
    Column(String),
    /// Several columns; the first non-placeholder cell wins.
    Columns(Vec<String>),
    /// The same value for every row.
    Constant(String),
    /// A column value appended to a fixed prefix, e.g. a URL template.
    Template { column: String, prefix: String },
    /// The 1-based row number, for exports without an id column.
    RowNumber,
}

impl ValueSource {
    /// Raw columns this source reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Column(column) | Self::Template { column, .. } => vec![column.as_str()],
            Self::Columns(columns) => columns.iter().map(String::as_str).collect(),
            Self::Constant(_) | Self::RowNumber => Vec::new(),
        }
    }
}

/// One canonical field fed from a raw value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: CanonicalField,
    pub source: ValueSource,
    pub kind: ValueKind,

    /// A required column must exist in the file, otherwise the whole source
    /// is rejected.
    #[serde(default)]
    pub required: bool,

    /// Column holding a per-row area unit label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_column: Option<String>,
}

impl FieldMapping {
    pub fn new(field: CanonicalField, source: ValueSource, kind: ValueKind) -> Self {
        Self {
            field,
            source,
            kind,
            required: false,
            unit_column: None,
        }
    }

    /// Map a single column.
    pub fn column(field: CanonicalField, column: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(field, ValueSource::Column(column.into()), kind)
    }

    /// Map the first non-empty of several columns.
    pub fn first_of(field: CanonicalField, columns: &[&str], kind: ValueKind) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        Self::new(field, ValueSource::Columns(columns), kind)
    }

    /// Map a constant.
    pub fn constant(field: CanonicalField, value: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(field, ValueSource::Constant(value.into()), kind)
    }

    /// Map a prefixed column value.
    pub fn template(
        field: CanonicalField,
        prefix: impl Into<String>,
        column: impl Into<String>,
        kind: ValueKind,
    ) -> Self {
        let source = ValueSource::Template {
            column: column.into(),
            prefix: prefix.into(),
        };
        Self::new(field, source, kind)
    }

    /// Map the row number.
    pub fn row_number(field: CanonicalField) -> Self {
        Self::new(field, ValueSource::RowNumber, ValueKind::Text)
    }

    /// Mark the mapped column(s) as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Read the area unit from another column.
    pub fn unit_column(mut self, column: impl Into<String>) -> Self {
        self.unit_column = Some(column.into());
        self
    }
}

/// Source-specific rules applied after the mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    /// Infer `rooms` from free text ("3 otaqlı mənzil") when no mapping
    /// produced a value.
    RoomsFromText { column: String },
}

impl Fallback {
    pub fn column(&self) -> &str {
        match self {
            Self::RoomsFromText { column } => column,
        }
    }
}

/// Layout of one source export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLayout {
    /// Source name, used for provenance and record ids.
    pub name: String,

    /// File name, resolved against the data directory when relative.
    pub file: PathBuf,

    /// Field separator. Default: `,`
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    pub fields: Vec<FieldMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<Fallback>,
}

impl SourceLayout {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            delimiter: default_delimiter(),
            fields: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn map(mut self, mapping: FieldMapping) -> Self {
        self.fields.push(mapping);
        self
    }

    pub fn fallback(mut self, fallback: Fallback) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    /// Columns the file must carry, in declaration order, without repeats.
    pub fn required_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for mapping in self.fields.iter().filter(|m| m.required) {
            for column in mapping.source.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        columns
    }

    /// Check the layout is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let invalid = |reason: String| ConfigValidationError::InvalidLayout {
            source_name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("source name is empty".to_string()));
        }
        if self.file.as_os_str().is_empty() {
            return Err(invalid("file name is empty".to_string()));
        }
        if !self.delimiter.is_ascii() {
            return Err(invalid(format!(
                "delimiter '{}' is not an ASCII character",
                self.delimiter
            )));
        }
        if self.fields.is_empty() {
            return Err(invalid("no field mappings".to_string()));
        }

        for mapping in &self.fields {
            if !mapping.field.is_mappable() {
                return Err(invalid(format!("{} cannot be mapped", mapping.field)));
            }
            if mapping.kind.output_type() != mapping.field.field_type() {
                return Err(invalid(format!(
                    "{} expects {:?} values but its mapping produces {:?}",
                    mapping.field,
                    mapping.field.field_type(),
                    mapping.kind.output_type()
                )));
            }
            if mapping.unit_column.is_some() && !matches!(mapping.kind, ValueKind::Area { .. }) {
                return Err(invalid(format!(
                    "{} declares a unit column but is not an area",
                    mapping.field
                )));
            }
            if mapping.required && mapping.source.columns().is_empty() {
                return Err(invalid(format!(
                    "{} is required but reads no column",
                    mapping.field
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::AreaUnit;
    use pretty_assertions::assert_eq;

    fn sample() -> SourceLayout {
        SourceLayout::new("sample", "sample.csv")
            .map(FieldMapping::column(CanonicalField::SourceId, "id", ValueKind::Text).required())
            .map(
                FieldMapping::column(
                    CanonicalField::AreaValue,
                    "area",
                    ValueKind::Area {
                        unit: AreaUnit::SquareMeters,
                    },
                )
                .required(),
            )
            .map(FieldMapping::first_of(
                CanonicalField::LocationName,
                &["district", "address"],
                ValueKind::Text,
            ))
            .map(FieldMapping::column(CanonicalField::PriceValue, "price", ValueKind::Price).required())
            .fallback(Fallback::RoomsFromText {
                column: "title".to_string(),
            })
    }

    #[test]
    fn test_required_columns() {
        assert_eq!(sample().required_columns(), vec!["id", "area", "price"]);
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_kind_mismatch() {
        let layout = sample().map(FieldMapping::column(
            CanonicalField::Rooms,
            "rooms",
            ValueKind::Text,
        ));
        let err = layout.validate().unwrap_err();
        assert!(err.to_string().contains("rooms"));
    }

    #[test]
    fn test_validate_rejects_unmappable_field() {
        let layout = sample().map(FieldMapping::constant(
            CanonicalField::AreaUnits,
            "m²",
            ValueKind::Text,
        ));
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unit_column_on_non_area() {
        let layout = sample().map(
            FieldMapping::column(CanonicalField::PriceValue, "cost", ValueKind::Price)
                .unit_column("unit"),
        );
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_layout_json_defaults() {
        let json = r#"{
            "name": "custom",
            "file": "custom.csv",
            "fields": [
                {"field": "area_value", "source": {"column": "m2"}, "kind": {"kind": "decimal"}, "required": true},
                {"field": "url", "source": {"template": {"column": "href", "prefix": "https://x.az"}}, "kind": {"kind": "url"}},
                {"field": "source_id", "source": "row_number", "kind": {"kind": "text"}}
            ]
        }"#;
        let layout: SourceLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.delimiter, ',');
        assert!(layout.fallbacks.is_empty());
        assert_eq!(layout.required_columns(), vec!["m2"]);
        assert_eq!(layout.fields[2].source, ValueSource::RowNumber);
        assert!(layout.validate().is_ok());
    }
}
