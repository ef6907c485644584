use std::path::Path;

use tracing::info;

use crate::db::TableData;
use crate::error::{RefreshError, RefreshResult};
use crate::excel::{CellValue, Sheet, Workbook, open_workbook};
use crate::update::writer::check_rows_fit;
use crate::utils::helpers::MAX_COLUMNS;
use crate::utils::{CellCoord, excel_range, extract_cell_info, index_to_col_name, parse_column};

/// Writes `data` as a block whose top-left cell is `start`, column names
/// first when `header` is set. Cells inside the block are overwritten, null
/// values included; nothing outside it changes.
///
/// Returns the written range (`"C3:E6"`), or `None` when `data` has no
/// columns.
pub fn write_table(
    sheet: &mut Sheet,
    data: &TableData,
    start: &str,
    header: bool,
) -> RefreshResult<Option<String>> {
    let (letters, first_row) = extract_cell_info(start)?;
    let first_col = parse_column(&letters)?;

    let height = data.len() + usize::from(header);
    check_rows_fit(&sheet.name, first_row, height)?;
    if data.columns.is_empty() || height == 0 {
        return Ok(None);
    }

    let last_col = first_col + data.columns.len() - 1;
    if last_col > MAX_COLUMNS {
        return Err(RefreshError::InvalidColumn(index_to_col_name(last_col)));
    }
    let last_row = first_row + (height - 1) as u32;

    let top_left = CellCoord::new(first_col, first_row).to_string();
    let bottom_right = CellCoord::new(last_col, last_row).to_string();

    for reference in excel_range(&top_left, &bottom_right)? {
        let coord: CellCoord = reference.parse()?;
        let col = coord.col - first_col;
        let row = (coord.row - first_row) as usize;

        let value = match (header, row) {
            (true, 0) => CellValue::Text(data.columns[col].clone()),
            (true, row) => table_value(data, row - 1, col),
            (false, row) => table_value(data, row, col),
        };
        sheet.set_value(coord, value);
    }

    Ok(Some(format!("{}:{}", top_left, bottom_right)))
}

fn table_value(data: &TableData, row: usize, col: usize) -> CellValue {
    data.rows
        .get(row)
        .and_then(|values| values.get(col))
        .cloned()
        .unwrap_or_default()
}

/// Writes `data` into `sheet_name` of the workbook at `path`.
///
/// An existing workbook keeps its other sheets and formatting; a missing
/// sheet is appended, and a missing file is created.
pub fn export_table(
    path: &Path,
    sheet_name: &str,
    data: &TableData,
    start: &str,
    header: bool,
) -> RefreshResult<Option<String>> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"));
    if !supported {
        return Err(RefreshError::UnsupportedFormat(path.to_path_buf()));
    }

    let mut workbook = if path.exists() {
        open_workbook(path)?
    } else {
        Workbook::new(path, Vec::new())
    };

    let range = write_table(workbook.sheet_or_insert(sheet_name), data, start, header)?;
    workbook.save_as(path)?;

    match &range {
        Some(range) => info!("Wrote {} rows to '{}'!{} in {}", data.len(), sheet_name, range, path.display()),
        None => info!("No columns to write to '{}' in {}", sheet_name, path.display()),
    }

    Ok(range)
}
