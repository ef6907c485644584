use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{RefreshError, RefreshResult};
use crate::excel::{Sheet, Workbook, open_workbook};
use crate::json_export::converters::process_cell_value;
use crate::json_export::extractors::{extract_formulas, extract_headers};
use crate::json_export::types::{OrderedSheetData, WorkbookFormulas};
use crate::utils::CellCoord;

pub fn serialize_to_json<T: Serialize>(data: &T) -> RefreshResult<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

pub fn write_json_to_file<T: Serialize>(data: &T, path: &Path) -> RefreshResult<()> {
    let mut file = File::create(path)?;
    let json_string = serialize_to_json(data)?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Rows 2.. of `sheet` keyed by the row-1 headers. `usecols` restricts and
/// orders the output columns by header name; an unknown name is an error.
/// Rows with no value in any selected column are dropped.
pub fn process_sheet_for_json(
    sheet: &Sheet,
    usecols: Option<&[String]>,
) -> RefreshResult<OrderedSheetData> {
    let headers = extract_headers(sheet);

    let selected: Vec<(usize, String)> = match usecols {
        None => headers,
        Some(names) => names
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .find(|(_, header)| header == name)
                    .cloned()
                    .ok_or_else(|| {
                        RefreshError::InvalidColumn(format!(
                            "'{}' is not a header of sheet '{}'",
                            name, sheet.name
                        ))
                    })
            })
            .collect::<RefreshResult<_>>()?,
    };

    let row_count = sheet.max_rows.saturating_sub(1) as usize;
    let mut sheet_data = Vec::with_capacity(row_count);

    for row in 2..=sheet.max_rows {
        let row_data: IndexMap<String, serde_json::Value> = selected
            .iter()
            .map(|(col, header)| {
                let cell = sheet.get(CellCoord::new(*col, row));
                (header.clone(), process_cell_value(cell))
            })
            .collect();

        if row_data.values().any(|value| !value.is_null()) {
            sheet_data.push(row_data);
        }
    }

    Ok(sheet_data)
}

pub fn read_excel_sheet(
    path: &Path,
    sheet_name: &str,
    usecols: Option<&[String]>,
) -> RefreshResult<OrderedSheetData> {
    let workbook = open_workbook(path)?;
    let sheet = workbook
        .sheet(sheet_name)
        .ok_or_else(|| RefreshError::SheetNotFound(sheet_name.to_string()))?;

    process_sheet_for_json(sheet, usecols)
}

/// Formulas of one sheet, or of every sheet when `sheet_name` is `None`.
/// Sheets without formulas are left out.
pub fn workbook_formulas(
    workbook: &Workbook,
    sheet_name: Option<&str>,
) -> RefreshResult<WorkbookFormulas> {
    let sheets: Vec<&Sheet> = match sheet_name {
        Some(name) => vec![
            workbook
                .sheet(name)
                .ok_or_else(|| RefreshError::SheetNotFound(name.to_string()))?,
        ],
        None => workbook.sheets().iter().collect(),
    };

    Ok(sheets
        .into_iter()
        .map(|sheet| (sheet.name.clone(), extract_formulas(sheet)))
        .filter(|(_, formulas)| !formulas.is_empty())
        .collect())
}

pub fn find_formulas_in_excel(
    path: &Path,
    sheet_name: Option<&str>,
) -> RefreshResult<WorkbookFormulas> {
    let workbook = open_workbook(path)?;
    workbook_formulas(&workbook, sheet_name)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::excel::Cell;

    fn coord(s: &str) -> CellCoord {
        s.parse().unwrap()
    }

    fn sample_sheet() -> Sheet {
        let mut sheet = Sheet::new("Data");
        sheet.set(coord("A1"), Cell::text("name"));
        sheet.set(coord("B1"), Cell::text("qty"));
        sheet.set(coord("C1"), Cell::text("total"));
        sheet.set(coord("A2"), Cell::text("a"));
        sheet.set(coord("B2"), Cell::number(2.0));
        sheet.set(coord("C2"), Cell::formula("B2*10"));
        sheet.set(coord("A4"), Cell::text("b"));
        sheet
    }

    #[test]
    fn rows_are_keyed_by_header() {
        let rows = process_sheet_for_json(&sample_sheet(), None).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            serde_json::to_value(&rows[0]).unwrap(),
            json!({ "name": "a", "qty": 2, "total": "=B2*10" })
        );
        assert_eq!(rows[1]["qty"], serde_json::Value::Null);
    }

    #[test]
    fn usecols_selects_and_orders() {
        let cols = vec!["total".to_string(), "name".to_string()];
        let rows = process_sheet_for_json(&sample_sheet(), Some(&cols)).unwrap();
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["total", "name"]);

        let unknown = vec!["missing".to_string()];
        assert!(matches!(
            process_sheet_for_json(&sample_sheet(), Some(&unknown)),
            Err(RefreshError::InvalidColumn(_))
        ));
    }

    #[test]
    fn formula_listing_skips_empty_sheets() {
        let workbook = Workbook::new("book.xlsx", vec![sample_sheet(), Sheet::new("Empty")]);

        let all = workbook_formulas(&workbook, None).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["Data"]);
        assert_eq!(all["Data"]["C2"], "=B2*10");

        assert!(workbook_formulas(&workbook, Some("Empty")).unwrap().is_empty());
        assert!(matches!(
            workbook_formulas(&workbook, Some("Nope")),
            Err(RefreshError::SheetNotFound(_))
        ));
    }

    #[test]
    fn json_file_matches_printed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let rows = process_sheet_for_json(&sample_sheet(), None).unwrap();

        write_json_to_file(&rows, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, serialize_to_json(&rows).unwrap());
    }
}
