use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LhError;

/// Well identifier in row-letter/column-number form (`A1`, `H12`).
///
/// Rows are stored zero-based, columns one-based, matching the way plates are
/// labelled. Parsing is case-insensitive; display is always upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellId {
    row: u16,
    column: u16,
}

impl WellId {
    /// Creates a well identifier from a zero-based row and one-based column.
    pub fn new(row: u16, column: u16) -> Result<Self, LhError> {
        if column == 0 {
            return Err(LhError::parse(
                "lh_core.well_column",
                "well columns are numbered from 1",
            ));
        }
        Ok(Self { row, column })
    }

    /// Zero-based row index (`A` is 0).
    pub fn row(&self) -> u16 {
        self.row
    }

    /// One-based column number.
    pub fn column(&self) -> u16 {
        self.column
    }

    fn row_label(&self) -> String {
        let mut label = Vec::new();
        let mut index = self.row as u32 + 1;
        while index > 0 {
            let rem = (index - 1) % 26;
            label.push(b'A' + rem as u8);
            index = (index - 1) / 26;
        }
        label.reverse();
        String::from_utf8_lossy(&label).into_owned()
    }
}

impl FromStr for WellId {
    type Err = LhError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let split = trimmed
            .find(|ch: char| !ch.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (letters, digits) = trimmed.split_at(split);
        let malformed = || {
            LhError::parse("lh_core.well_id", "malformed well identifier")
                .with_context("value", raw)
                .with_hint("expected a row letter followed by a column number, e.g. A1")
        };
        if letters.is_empty() || letters.len() > 2 || digits.is_empty() {
            return Err(malformed());
        }
        if !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(malformed());
        }
        let mut row: u32 = 0;
        for ch in letters.chars() {
            row = row * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        let column: u16 = digits.parse().map_err(|_| malformed())?;
        WellId::new((row - 1) as u16, column).map_err(|_| malformed())
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_label(), self.column)
    }
}

impl TryFrom<String> for WellId {
    type Error = LhError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WellId> for String {
    fn from(value: WellId) -> Self {
        value.to_string()
    }
}

/// Liquid volume in microlitres. Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Volume(f64);

impl Volume {
    /// Creates a volume, rejecting zero, negative and non-finite values.
    pub fn new(microlitres: f64) -> Result<Self, LhError> {
        if !microlitres.is_finite() || microlitres <= 0.0 {
            return Err(LhError::configuration(
                "lh_core.volume_non_positive",
                "transfer volume must be a positive number of microlitres",
            )
            .with_context("volume", microlitres.to_string()));
        }
        Ok(Self(microlitres))
    }

    /// Returns the raw microlitre value.
    pub fn as_ul(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}uL", self.0)
    }
}

impl TryFrom<f64> for Volume {
    type Error = LhError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Volume::new(value)
    }
}

impl From<Volume> for f64 {
    fn from(value: Volume) -> Self {
        value.0
    }
}

/// Single source to destination transfer read from a worklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRow {
    /// Well the liquid is taken from.
    pub source: WellId,
    /// Well the liquid is delivered to.
    pub destination: WellId,
    /// Volume moved by this row.
    pub volume: Volume,
}

/// Ordered, immutable sequence of transfer rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Worklist {
    rows: Vec<TransferRow>,
}

impl Worklist {
    /// Wraps the provided rows, preserving their order.
    pub fn new(rows: Vec<TransferRow>) -> Self {
        Self { rows }
    }

    /// Rows in dispense order.
    pub fn rows(&self) -> &[TransferRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the worklist has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of all row volumes in microlitres.
    pub fn total_volume(&self) -> f64 {
        self.rows.iter().map(|row| row.volume.as_ul()).sum()
    }
}
