pub mod cell_ref;
pub mod helpers;
pub mod timer;

pub use cell_ref::{CellCoord, excel_range, extract_cell_info, parse_column};
pub use helpers::{cell_reference, col_name_to_index, index_to_col_name};
pub use timer::{timed, timed_debug};
