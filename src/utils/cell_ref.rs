use std::fmt;
use std::str::FromStr;

use crate::error::{RefreshError, RefreshResult};
use crate::utils::helpers::{MAX_ROWS, col_name_to_index, index_to_col_name};

/// A single cell address, both parts 1-based.
///
/// Ordering is row-major so maps keyed by coordinates iterate the way a sheet
/// is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub row: u32,
    pub col: usize,
}

impl CellCoord {
    pub fn new(col: usize, row: u32) -> Self {
        Self { row, col }
    }

    pub fn column_name(&self) -> String {
        index_to_col_name(self.col)
    }
}

impl Ord for CellCoord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

impl PartialOrd for CellCoord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_name(), self.row)
    }
}

impl FromStr for CellCoord {
    type Err = RefreshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (letters, row) = extract_cell_info(s)?;
        let col = col_name_to_index(&letters)
            .ok_or_else(|| RefreshError::InvalidCellReference(s.to_string()))?;
        Ok(CellCoord::new(col, row))
    }
}

/// Parses a column given as letters (`"AC"`) into its 1-based index.
pub fn parse_column(name: &str) -> RefreshResult<usize> {
    col_name_to_index(name.trim()).ok_or_else(|| RefreshError::InvalidColumn(name.to_string()))
}

/// Splits `"AB123"` into `("AB", 123)`. `$` anchors are ignored.
pub fn extract_cell_info(reference: &str) -> RefreshResult<(String, u32)> {
    let invalid = || RefreshError::InvalidCellReference(reference.to_string());
    let cleaned: String = reference.trim().chars().filter(|c| *c != '$').collect();

    let split = cleaned
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = cleaned.split_at(split);

    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    let row: u32 = digits.parse().map_err(|_| invalid())?;
    if row == 0 || row > MAX_ROWS {
        return Err(invalid());
    }

    Ok((letters.to_ascii_uppercase(), row))
}

/// Expands a rectangular range into its cell references, column by column
/// (`excel_range("A1", "B2")` is `[A1, A2, B1, B2]`).
pub fn excel_range(start: &str, end: &str) -> RefreshResult<Vec<String>> {
    let start: CellCoord = start.parse()?;
    let end: CellCoord = end.parse()?;

    let (first_col, last_col) = (start.col.min(end.col), start.col.max(end.col));
    let (first_row, last_row) = (start.row.min(end.row), start.row.max(end.row));

    let mut cells = Vec::with_capacity((last_col - first_col + 1) * (last_row - first_row + 1) as usize);
    for col in first_col..=last_col {
        for row in first_row..=last_row {
            cells.push(CellCoord::new(col, row).to_string());
        }
    }

    Ok(cells)
}
