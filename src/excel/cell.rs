use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub(crate) const SECONDS_PER_DAY: f64 = 86_400.0;

/// A literal value as stored in a cell or returned by a query.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Int(i64),
    Bool(bool),
    /// Excel serial date: whole days since 1899-12-30, time as the fraction.
    DateTime(f64),
    Error(String),
}

/// A grid cell. Whether a cell holds a formula comes from the workbook's
/// stored metadata, so a literal string starting with `=` stays a literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Literal(CellValue),
    /// Formula source text, as stored (without the leading `=`).
    Formula(String),
}

impl Cell {
    pub fn empty() -> Self {
        Cell::Literal(CellValue::Empty)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Literal(CellValue::Text(value.into()))
    }

    pub fn number(value: f64) -> Self {
        Cell::Literal(CellValue::Number(value))
    }

    pub fn formula(source: impl Into<String>) -> Self {
        Cell::Formula(source.into())
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Cell::Formula(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Literal(CellValue::Empty))
    }

    pub fn formula_text(&self) -> Option<&str> {
        match self {
            Cell::Formula(source) => Some(source),
            Cell::Literal(_) => None,
        }
    }

    pub fn value(&self) -> Option<&CellValue> {
        match self {
            Cell::Literal(value) => Some(value),
            Cell::Formula(_) => None,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::empty()
    }
}

impl From<CellValue> for Cell {
    fn from(value: CellValue) -> Self {
        Cell::Literal(value)
    }
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::DateTime(date_to_excel_serial(value))
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(datetime_to_excel_serial(value))
    }
}

impl From<NaiveTime> for CellValue {
    fn from(value: NaiveTime) -> Self {
        CellValue::DateTime(time_to_excel_serial(value))
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

pub(crate) fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

pub fn datetime_to_excel_serial(value: NaiveDateTime) -> f64 {
    let delta = value - excel_epoch();
    delta.num_seconds() as f64 / SECONDS_PER_DAY
}

pub fn date_to_excel_serial(value: NaiveDate) -> f64 {
    (value - excel_epoch().date()).num_days() as f64
}

pub fn time_to_excel_serial(value: NaiveTime) -> f64 {
    f64::from(value.num_seconds_from_midnight()) / SECONDS_PER_DAY
}

/// Largest magnitude a spreadsheet number (an `f64`) holds without rounding.
pub(crate) const MAX_EXACT_INT: u64 = 1 << 53;

/// `value` as a number cell, or `None` when the conversion would round it.
pub(crate) fn exact_int(value: i64) -> Option<f64> {
    (value.unsigned_abs() <= MAX_EXACT_INT).then_some(value as f64)
}
