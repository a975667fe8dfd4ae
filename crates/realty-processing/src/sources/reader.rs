//! Source file reading.
//!
//! Delimited files are read with polars, spreadsheets with calamine. Both end
//! up as a [`RawTable`] of optional strings. No type inference happens here:
//! cells stay as text until the normalizer decides what they mean.

use crate::error::{PipelineError, Result};
use calamine::{Data, DataType as _, Reader, open_workbook_auto};
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

/// File extensions read as spreadsheets.
pub const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// A raw source file: trimmed header names and column-major string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    cells: Vec<Vec<Option<String>>>,
    height: usize,
}

impl RawTable {
    /// Build a table from header names and rows. Short rows are padded with
    /// nulls.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| clean_header(c)).collect();
        let height = rows.len();
        let mut cells = vec![Vec::with_capacity(height); columns.len()];
        for row in rows {
            for (idx, column) in cells.iter_mut().enumerate() {
                column.push(row.get(idx).cloned().flatten());
            }
        }
        Self {
            columns,
            cells,
            height,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> impl Iterator<Item = RawRow<'_>> {
        (0..self.height).map(move |index| RawRow { table: self, index })
    }
}

/// One row of a [`RawTable`].
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    table: &'a RawTable,
    index: usize,
}

impl<'a> RawRow<'a> {
    /// Cell content for a column, `None` when the column is absent or the
    /// cell is empty.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.table.column_index(column)?;
        self.table.cells[idx][self.index].as_deref()
    }

    /// 1-based row number, not counting the header.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Whether a file is read as a spreadsheet, judged by its extension.
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Read a source file as text: spreadsheets by extension, anything else as
/// delimited text.
pub fn read_source(path: &Path, delimiter: char) -> Result<RawTable> {
    if is_spreadsheet(path) {
        read_spreadsheet(path)
    } else {
        read_delimited(path, delimiter)
    }
}

/// Read the first worksheet of a workbook. The first row holds the headers.
///
/// Numbers are written without a trailing `.0`, dates as ISO timestamps, and
/// error cells are treated as empty.
pub fn read_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(calamine::Error::Msg("workbook has no worksheets"))??;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };
    let rows: Vec<Vec<Option<String>>> = rows
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    debug!(
        "Read {} rows x {} columns from {}",
        rows.len(),
        columns.len(),
        path.display()
    );

    Ok(RawTable::from_rows(columns, rows))
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
        other => Some(other.to_string()),
    }
}

/// Read a delimited file with every column as text.
///
/// Invalid UTF-8 is replaced rather than rejected, and ragged lines are
/// truncated or padded.
pub fn read_delimited(path: &Path, delimiter: char) -> Result<RawTable> {
    let separator = u8::try_from(delimiter).map_err(|_| {
        PipelineError::InvalidConfig(format!("delimiter '{delimiter}' is not a single byte"))
    })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"'))
                .with_encoding(CsvEncoding::LossyUtf8)
                .with_truncate_ragged_lines(true),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    debug!(
        "Read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );

    table_from_frame(&df)
}

fn table_from_frame(df: &DataFrame) -> Result<RawTable> {
    let mut columns = Vec::with_capacity(df.width());
    let mut cells = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        columns.push(clean_header(column.name().as_str()));

        let as_text = column.cast(&DataType::String)?;
        let values: Vec<Option<String>> = as_text
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        cells.push(values);
    }

    Ok(RawTable {
        columns,
        cells,
        height: df.height(),
    })
}

fn clean_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}').trim().to_string()
}
