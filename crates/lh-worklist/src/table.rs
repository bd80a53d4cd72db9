//! Header-addressed CSV table shared by the worklist formats.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use lh_core::{LhError, Volume, WellId};

/// A parsed CSV body addressed by column name.
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    records: Vec<StringRecord>,
    line_offset: u64,
}

/// Cursor into one data row of a [`CsvTable`].
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    table: &'a CsvTable,
    index: usize,
}

impl CsvTable {
    /// Reads a comma-delimited body whose first line is the header row.
    ///
    /// `line_offset` is the number of lines preceding the header in the
    /// original file, so reported line numbers match what the operator sees.
    pub fn read<R: Read>(reader: R, line_offset: u64) -> Result<Self, LhError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|err| csv_error(err, line_offset))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect::<Vec<_>>();
        let mut records = Vec::new();
        for record in csv_reader.records() {
            let record = record.map_err(|err| csv_error(err, line_offset))?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            records.push(record);
        }
        Ok(Self {
            headers,
            records,
            line_offset,
        })
    }

    /// Number of non-blank data rows.
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Resolves every required column, failing on the first missing one.
    pub fn require_columns<const N: usize>(&self, names: [&str; N]) -> Result<[usize; N], LhError> {
        let mut indices = [0usize; N];
        for (slot, name) in indices.iter_mut().zip(names) {
            *slot = self
                .headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| {
                    LhError::parse("lh_worklist.missing_column", "required column is missing")
                        .with_context("column", name)
                        .with_context("headers", self.headers.join(","))
                })?;
        }
        Ok(indices)
    }

    /// Iterates over the data rows in file order.
    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        (0..self.records.len()).map(move |index| TableRow { table: self, index })
    }
}

impl<'a> TableRow<'a> {
    /// One-based data row number (the header is not counted).
    pub fn number(&self) -> usize {
        self.index + 1
    }

    fn line(&self) -> u64 {
        self.table.records[self.index]
            .position()
            .map(|pos| pos.line() + self.table.line_offset)
            .unwrap_or(self.table.line_offset + 2 + self.index as u64)
    }

    /// Raw field at `column`, trimmed.
    pub fn field(&self, column: usize, name: &str) -> Result<&'a str, LhError> {
        let value = self.table.records[self.index].get(column).unwrap_or("");
        if value.is_empty() {
            return Err(self
                .annotate(LhError::parse(
                    "lh_worklist.empty_field",
                    "required field is empty",
                ))
                .with_context("column", name));
        }
        Ok(value)
    }

    /// Parses the field at `column` as a well identifier.
    pub fn well(&self, column: usize, name: &str) -> Result<WellId, LhError> {
        let raw = self.field(column, name)?;
        raw.parse::<WellId>()
            .map_err(|err| self.annotate(err).with_context("column", name))
    }

    /// Parses the field at `column` as a positive volume in microlitres.
    pub fn volume(&self, column: usize, name: &str) -> Result<Volume, LhError> {
        let raw = self.field(column, name)?;
        let not_numeric = || {
            self.annotate(LhError::parse(
                "lh_worklist.volume_not_numeric",
                "volume field is not numeric",
            ))
            .with_context("column", name)
            .with_context("value", raw)
        };
        let value: f64 = raw.parse().map_err(|_| not_numeric())?;
        // `NaN`, `inf` and overflowing literals parse as f64 but are not volumes.
        if !value.is_finite() {
            return Err(not_numeric());
        }
        Volume::new(value).map_err(|err| self.annotate(err).with_context("column", name))
    }

    fn annotate(&self, err: LhError) -> LhError {
        err.with_context("row", self.number().to_string())
            .with_context("line", self.line().to_string())
    }
}

fn csv_error(err: csv::Error, line_offset: u64) -> LhError {
    let mut parsed = LhError::parse("lh_worklist.csv", err.to_string());
    if let Some(pos) = err.position() {
        parsed = parsed.with_context("line", (pos.line() + line_offset).to_string());
    }
    parsed
}
