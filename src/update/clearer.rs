use crate::excel::Sheet;
use crate::update::{ColumnMapping, FormulaMap};
use crate::utils::CellCoord;

/// Blanks the mapped columns from row 2 to the sheet's current extent,
/// leaving every indexed formula cell alone. Returns how many non-empty cells
/// were blanked.
pub fn clear_old_data(sheet: &mut Sheet, mapping: &ColumnMapping, formulas: &FormulaMap) -> usize {
    let mut cleared = 0;

    for row in 2..=sheet.max_rows {
        for col in mapping.columns() {
            let coord = CellCoord::new(col, row);
            if formulas.contains_key(&coord) {
                continue;
            }
            if sheet.clear(coord) {
                cleared += 1;
            }
        }
    }

    cleared
}
