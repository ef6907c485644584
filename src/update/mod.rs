//! Formula-preserving refresh of workbook data regions.
//!
//! Each sheet goes through the same pipeline: index the formulas of the
//! touched columns, clear the old data, write the new rows, then put the
//! formulas back on the rows that received data. Fetched tables can also be
//! written as a plain block at any anchor cell.

use std::collections::{BTreeMap, BTreeSet};

use crate::utils::CellCoord;

mod clearer;
mod export;
mod formula_index;
mod mapping;
mod orchestrator;
mod restorer;
mod writer;

pub use clearer::clear_old_data;
pub use export::{export_table, write_table};
pub use formula_index::collect_formulas;
pub use mapping::{ColumnMapping, SheetUpdate, SourceUpdate, columns_to_check};
pub use orchestrator::{
    SheetReport, UpdateOptions, apply_multi_source, apply_single_source, refresh,
    update_excel_file, update_excel_file_multi_sources,
};
pub use restorer::{RestorePolicy, RestoreStats, restore_formulas};
pub use writer::{FIRST_DATA_ROW, WriteOutcome, write_data};

/// Formula text per coordinate, for one sheet and one update.
pub type FormulaMap = BTreeMap<CellCoord, String>;

/// Sheet rows that received data.
pub type UpdatedRows = BTreeSet<u32>;
