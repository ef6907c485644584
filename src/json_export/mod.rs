mod converters;
mod exporters;
mod extractors;
mod types;

pub use converters::{cell_value_to_json, excel_date_to_iso_string, process_cell_value};
pub use exporters::{
    find_formulas_in_excel, process_sheet_for_json, read_excel_sheet, serialize_to_json,
    workbook_formulas, write_json_to_file,
};
pub use types::{OrderedSheetData, SheetFormulas, WorkbookFormulas};
