use crate::excel::{Cell, Sheet};
use crate::json_export::converters::process_cell_value;
use crate::json_export::types::SheetFormulas;
use crate::utils::CellCoord;

/// Header names from row 1, by column. Blank headers get a positional
/// `Unnamed: N` name (0-based), so every column up to the sheet extent is
/// addressable.
pub fn extract_headers(sheet: &Sheet) -> Vec<(usize, String)> {
    (1..=sheet.max_cols)
        .map(|col| {
            let header = match process_cell_value(sheet.get(CellCoord::new(col, 1))) {
                serde_json::Value::Null => format!("Unnamed: {}", col - 1),
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (col, header)
        })
        .collect()
}

pub fn extract_formulas(sheet: &Sheet) -> SheetFormulas {
    sheet
        .used_cells()
        .filter_map(|(coord, cell)| match cell {
            Cell::Formula(source) => Some((coord.to_string(), format!("={source}"))),
            Cell::Literal(_) => None,
        })
        .collect()
}
