//! Refreshes the data regions of Excel workbooks from MySQL while keeping
//! the formulas the workbook carries.

pub mod config;
pub mod db;
pub mod error;
pub mod excel;
pub mod json_export;
pub mod update;
pub mod utils;

pub use config::RefreshJob;
pub use error::{RefreshError, RefreshResult};
pub use update::{refresh, update_excel_file, update_excel_file_multi_sources};
