use std::collections::BTreeSet;

use crate::excel::{Cell, Sheet};
use crate::update::FormulaMap;
use crate::utils::CellCoord;

/// Records every formula cell of `columns` over rows `1..=max_rows`.
///
/// Classification reads the cell tag only; text content is never inspected.
pub fn collect_formulas(sheet: &Sheet, columns: &BTreeSet<usize>) -> FormulaMap {
    let mut formulas = FormulaMap::new();

    for &col in columns {
        for row in 1..=sheet.max_rows {
            let coord = CellCoord::new(col, row);
            if let Cell::Formula(source) = sheet.get(coord) {
                formulas.insert(coord, source.clone());
            }
        }
    }

    formulas
}
