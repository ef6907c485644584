use crate::db::TableData;
use crate::error::{RefreshError, RefreshResult};
use crate::excel::Sheet;
use crate::update::{ColumnMapping, FormulaMap, UpdatedRows};
use crate::utils::CellCoord;
use crate::utils::helpers::MAX_ROWS;

/// First sheet row receiving data; row 1 holds the headers.
pub const FIRST_DATA_ROW: u32 = 2;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub updated_rows: UpdatedRows,
    pub cells_written: usize,
}

/// Writes `data` row by row from row 2 into the mapped columns.
///
/// Formula cells are skipped, as are mapped source columns missing from
/// `data`. Values are copied as-is. Every target row lands in the updated set,
/// even when all of its cells were skipped.
pub fn write_data(
    sheet: &mut Sheet,
    data: &TableData,
    mapping: &ColumnMapping,
    formulas: &FormulaMap,
) -> RefreshResult<WriteOutcome> {
    let targets: Vec<(usize, usize)> = mapping
        .iter()
        .filter_map(|(col, source)| data.column_index(source).map(|idx| (col, idx)))
        .collect();

    check_rows_fit(&sheet.name, FIRST_DATA_ROW, data.len())?;

    let mut outcome = WriteOutcome::default();

    for (target_row, values) in (FIRST_DATA_ROW..).zip(&data.rows) {
        outcome.updated_rows.insert(target_row);

        for &(col, idx) in &targets {
            let coord = CellCoord::new(col, target_row);
            if formulas.contains_key(&coord) {
                continue;
            }
            let value = values.get(idx).cloned().unwrap_or_default();
            sheet.set_value(coord, value);
            outcome.cells_written += 1;
        }
    }

    Ok(outcome)
}

/// Fails when `rows` rows starting at `first_row` would run past the last
/// sheet row.
pub(crate) fn check_rows_fit(sheet: &str, first_row: u32, rows: usize) -> RefreshResult<()> {
    let available = (MAX_ROWS + 1).saturating_sub(first_row) as usize;
    if rows > available {
        return Err(RefreshError::TooManyRows {
            sheet: sheet.to_string(),
            rows,
            first_row,
        });
    }
    Ok(())
}
