mod cell;
mod package;
mod sheet;
mod workbook;

pub(crate) use cell::{SECONDS_PER_DAY, excel_epoch, exact_int};
pub use cell::{
    Cell, CellValue, date_to_excel_serial, datetime_to_excel_serial, time_to_excel_serial,
};
pub use sheet::Sheet;
pub use workbook::{OUTPUT_SUFFIX, Workbook, derive_output_path, open_workbook};
