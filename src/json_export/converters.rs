use chrono::Duration;
use serde_json::{Value, json};

use crate::excel::{Cell, CellValue, SECONDS_PER_DAY, excel_epoch};

/// Converts an Excel serial to an ISO 8601 string: a date for whole days, a
/// time of day below 1, a datetime otherwise. Serials outside chrono's range
/// come back as plain numbers.
pub fn excel_date_to_iso_string(serial: f64) -> String {
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;

    let Some(datetime) = Duration::try_seconds(seconds)
        .and_then(|delta| excel_epoch().checked_add_signed(delta))
    else {
        return serial.to_string();
    };

    if seconds % 86_400 == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else if (0.0..1.0).contains(&serial) {
        datetime.format("%H:%M:%S").to_string()
    } else {
        datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

pub fn cell_value_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => Value::Null,
        CellValue::Text(s) | CellValue::Error(s) => json!(s),
        CellValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                json!(n.trunc() as i64)
            } else {
                json!(n)
            }
        }
        CellValue::Int(i) => json!(i),
        CellValue::Bool(b) => json!(b),
        CellValue::DateTime(serial) if *serial >= 0.0 => json!(excel_date_to_iso_string(*serial)),
        CellValue::DateTime(serial) => json!(serial),
    }
}

// Formulas are reported by their source, prefixed with `=`
pub fn process_cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Formula(source) => json!(format!("={source}")),
        Cell::Literal(value) => cell_value_to_json(value),
    }
}
