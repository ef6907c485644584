use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, Formula, Workbook as XlsxWorkbook, Worksheet};
use tracing::{debug, warn};

use crate::error::{RefreshError, RefreshResult};
use crate::excel::package::{date_format_code, is_patchable, save_changes};
use crate::excel::{Cell, CellValue, Sheet, exact_int};
use crate::utils::CellCoord;

/// Suffix inserted before the extension of every refreshed workbook.
pub const OUTPUT_SUFFIX: &str = "_update";

#[derive(Clone, Debug)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    file_path: PathBuf,
}

pub fn open_workbook<P: AsRef<Path>>(path: P) -> RefreshResult<Workbook> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(RefreshError::WorkbookNotFound(path.to_path_buf()));
    }

    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names().to_vec();

    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in &sheet_names {
        let range = workbook.worksheet_range(name)?;
        // Formats without formula support report an error here; treat as none.
        let formulas = workbook.worksheet_formula(name).ok();

        let mut sheet = create_sheet_from_ranges(name, &range, formulas.as_ref());
        sheet.mark_clean();
        debug!(
            "Loaded sheet '{}' ({} rows x {} cols)",
            name, sheet.max_rows, sheet.max_cols
        );
        sheets.push(sheet);
    }

    Ok(Workbook {
        sheets,
        file_path: path.to_path_buf(),
    })
}

fn create_sheet_from_ranges(
    name: &str,
    values: &Range<Data>,
    formulas: Option<&Range<String>>,
) -> Sheet {
    let mut sheet = Sheet::new(name);

    if let Some(end) = values.end() {
        sheet.ensure_cell_exists(end.0 + 1, end.1 as usize + 1);
    }

    let (start_row, start_col) = values.start().unwrap_or_default();
    for (row, col, data) in values.used_cells() {
        let value = convert_data(data);
        if value.is_empty() {
            continue;
        }
        let coord = CellCoord::new(start_col as usize + col + 1, start_row + row as u32 + 1);
        sheet.set_value(coord, value);
    }

    // Formula tags override the cached value calamine reports for the cell
    if let Some(formulas) = formulas {
        let (start_row, start_col) = formulas.start().unwrap_or_default();
        for (row, col, source) in formulas.used_cells() {
            if source.is_empty() {
                continue;
            }
            let source = source.strip_prefix('=').unwrap_or(source);
            let coord = CellCoord::new(start_col as usize + col + 1, start_row + row as u32 + 1);
            sheet.set(coord, Cell::formula(source));
        }
    }

    sheet
}

fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

/// `report.xlsx` -> `report_update.xlsx`, in the same directory.
pub fn derive_output_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());

    let file_name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, OUTPUT_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, OUTPUT_SUFFIX),
    };

    path.with_file_name(file_name)
}

impl Workbook {
    pub fn new(file_path: impl Into<PathBuf>, sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            file_path: file_path.into(),
        }
    }

    pub fn get_file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn get_sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    /// Returns the sheet called `name`, appending an empty one if there is none.
    pub fn sheet_or_insert(&mut self, name: &str) -> &mut Sheet {
        let index = match self.sheets.iter().position(|sheet| sheet.name == name) {
            Some(index) => index,
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    /// Saves the workbook to `path`.
    ///
    /// A workbook loaded from an xlsx/xlsm package is saved by patching the
    /// changed cells into a copy of that package, so formatting survives.
    /// Anything else is rebuilt from cell content alone.
    pub fn save_as(&self, path: &Path) -> RefreshResult<()> {
        if is_patchable(&self.file_path) {
            debug!("Patching package {}", self.file_path.display());
            return save_changes(self, path);
        }
        self.rebuild(path)
    }

    /// Serializes every sheet to a fresh xlsx package at `path`.
    ///
    /// Only cell content survives: literals by type, formulas as formulas.
    fn rebuild(&self, path: &Path) -> RefreshResult<()> {
        let mut workbook = XlsxWorkbook::new();

        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet().set_name(&sheet.name)?;

            for (coord, cell) in sheet.used_cells() {
                let row_idx = coord.row - 1;
                let col_idx = u16::try_from(coord.col - 1)
                    .map_err(|_| RefreshError::InvalidColumn(coord.column_name()))?;

                match cell {
                    Cell::Formula(source) => {
                        worksheet.write_formula(row_idx, col_idx, Formula::new(source))?;
                    }
                    Cell::Literal(value) => write_value(worksheet, (row_idx, col_idx), value)?,
                }
            }
        }

        workbook.save(path)?;
        Ok(())
    }
}

fn write_value(worksheet: &mut Worksheet, (row, col): (u32, u16), value: &CellValue) -> RefreshResult<()> {
    match value {
        CellValue::Empty => {}
        CellValue::Text(s) => {
            worksheet.write_string(row, col, s)?;
        }
        CellValue::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        CellValue::Int(i) => match exact_int(*i) {
            Some(n) => {
                worksheet.write_number(row, col, n)?;
            }
            None => {
                warn!("Integer {} is too large for a number cell; writing text", i);
                worksheet.write_string(row, col, i.to_string())?;
            }
        },
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        CellValue::DateTime(serial) => {
            let format = Format::new().set_num_format(date_format_code(*serial));
            worksheet.write_number_with_format(row, col, *serial, &format)?;
        }
        // Error literals cannot be written as errors; keep their text.
        CellValue::Error(e) => {
            worksheet.write_string(row, col, e)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_output_path_beside_input() {
        assert_eq!(
            derive_output_path(Path::new("/data/report.xlsx")),
            PathBuf::from("/data/report_update.xlsx")
        );
        assert_eq!(
            derive_output_path(Path::new("reports/2025-01 市场数据.xlsm")),
            PathBuf::from("reports/2025-01 市场数据_update.xlsm")
        );
        assert_eq!(derive_output_path(Path::new("plain")), PathBuf::from("plain_update"));
    }

    #[test]
    fn sheet_lookup_by_name() {
        let mut workbook = Workbook::new("book.xlsx", vec![Sheet::new("A"), Sheet::new("B")]);
        assert_eq!(workbook.get_sheet_names(), vec!["A", "B"]);
        assert!(workbook.sheet("B").is_some());
        assert!(workbook.sheet_mut("C").is_none());
    }

    #[test]
    fn sheet_or_insert_appends_once() {
        let mut workbook = Workbook::new("book.xlsx", vec![Sheet::new("A")]);
        workbook.sheet_or_insert("B");
        workbook.sheet_or_insert("A");
        workbook.sheet_or_insert("B");
        assert_eq!(workbook.get_sheet_names(), vec!["A", "B"]);
    }

    #[test]
    fn huge_integers_are_saved_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.xlsx");
        let mut sheet = Sheet::new("Ids");
        sheet.set_value(CellCoord::new(1, 1), CellValue::Int(9_007_199_254_740_993));
        sheet.set_value(CellCoord::new(1, 2), CellValue::Int(42));

        Workbook::new(&path, vec![sheet]).save_as(&path).unwrap();

        let reloaded = open_workbook(&path).unwrap();
        let ids = reloaded.sheet("Ids").unwrap();
        assert_eq!(ids.get(CellCoord::new(1, 1)), &Cell::text("9007199254740993"));
        assert_eq!(ids.get(CellCoord::new(1, 2)), &Cell::number(42.0));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = open_workbook("/definitely/not/here.xlsx").unwrap_err();
        assert!(matches!(err, RefreshError::WorkbookNotFound(_)));
    }
}
