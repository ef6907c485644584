use std::path::Path;

use tracing::{debug, warn};
use umya_spreadsheet::{Cell as PackageCell, Spreadsheet, reader, writer};

use crate::error::{RefreshError, RefreshResult};
use crate::excel::{Cell, CellValue, Workbook, exact_int};

const GENERAL_FORMAT: &str = "General";

/// Whether `path` is a package the in-place save can patch.
pub(crate) fn is_patchable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"))
}

/// Reopens the package `workbook` was loaded from, writes only the cells
/// changed since load and saves the result to `path`.
///
/// Styles, merges, column widths and every untouched cell come through
/// unchanged. Sheets added after load are appended to the package.
pub(crate) fn save_changes(workbook: &Workbook, path: &Path) -> RefreshResult<()> {
    let mut book = reader::xlsx::read(workbook.get_file_path())?;

    for sheet in workbook.sheets() {
        if book.get_sheet_by_name(&sheet.name).is_none() {
            book.new_sheet(&sheet.name).map_err(|reason| RefreshError::AddSheet {
                sheet: sheet.name.clone(),
                reason: reason.to_string(),
            })?;
        }
        let worksheet = book
            .get_sheet_by_name_mut(&sheet.name)
            .ok_or_else(|| RefreshError::SheetNotFound(sheet.name.clone()))?;

        let mut patched = 0;
        for (coord, cell) in sheet.touched_cells() {
            let position = (coord.col as u32, coord.row);
            if cell.is_empty() && worksheet.get_cell(position).is_none() {
                continue;
            }
            patch_cell(worksheet.get_cell_mut(position), cell, &coord.to_string());
            patched += 1;
        }
        debug!("Patched {} cells on sheet '{}'", patched, sheet.name);
    }

    write_package(&mut book, path)
}

fn patch_cell(target: &mut PackageCell, cell: &Cell, reference: &str) {
    match cell {
        Cell::Formula(source) => {
            target.set_formula(source.as_str());
        }
        Cell::Literal(value) => match value {
            CellValue::Empty => {
                target.set_blank();
            }
            CellValue::Text(s) => {
                target.set_value_string(s.as_str());
            }
            CellValue::Number(n) => {
                target.set_value_number(*n);
            }
            CellValue::Int(i) => match exact_int(*i) {
                Some(n) => {
                    target.set_value_number(n);
                }
                None => {
                    warn!("{} holds {} which a number cell cannot keep exactly; writing text", reference, i);
                    target.set_value_string(i.to_string());
                }
            },
            CellValue::Bool(b) => {
                target.set_value_bool(*b);
            }
            CellValue::DateTime(serial) => {
                target.set_value_number(*serial);
                let general = target
                    .get_style()
                    .get_number_format()
                    .is_none_or(|format| format.get_format_code() == GENERAL_FORMAT);
                if general {
                    target
                        .get_style_mut()
                        .get_number_format_mut()
                        .set_format_code(date_format_code(*serial));
                }
            }
            CellValue::Error(e) => {
                target.set_value_string(e.as_str());
            }
        },
    }
}

/// Number format for a serial: time of day, whole date or date and time.
pub(crate) fn date_format_code(serial: f64) -> &'static str {
    if serial < 1.0 {
        "hh:mm:ss"
    } else if serial.fract() == 0.0 {
        "yyyy-mm-dd"
    } else {
        "yyyy-mm-dd hh:mm:ss"
    }
}

fn write_package(book: &mut Spreadsheet, path: &Path) -> RefreshResult<()> {
    // Every sheet must be deserialized before the writer runs.
    for index in 0..book.get_sheet_count() {
        book.read_sheet(index);
    }
    writer::xlsx::write(book, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_existing_xlsx_packages_are_patched() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book.xlsx");
        std::fs::write(&book, b"").unwrap();

        assert!(is_patchable(&book));
        assert!(!is_patchable(&dir.path().join("absent.xlsx")));

        let csv = dir.path().join("book.csv");
        std::fs::write(&csv, b"a,b").unwrap();
        assert!(!is_patchable(&csv));
    }

    #[test]
    fn date_formats_follow_the_serial() {
        assert_eq!(date_format_code(0.5), "hh:mm:ss");
        assert_eq!(date_format_code(45658.0), "yyyy-mm-dd");
        assert_eq!(date_format_code(45658.25), "yyyy-mm-dd hh:mm:ss");
    }
}
