use std::path::PathBuf;

use thiserror::Error;

pub type RefreshResult<T> = Result<T, RefreshError>;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to read workbook: {0}")]
    Read(#[from] calamine::Error),

    #[error("Unable to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("Unable to update workbook package: {0}")]
    Package(#[from] umya_spreadsheet::XlsxError),

    #[error("Cannot add worksheet '{sheet}': {reason}")]
    AddSheet { sheet: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel file does not exist: {}", .0.display())]
    WorkbookNotFound(PathBuf),

    #[error("Unsupported workbook format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Worksheet '{0}' does not exist")]
    SheetNotFound(String),

    #[error("Invalid cell reference: {0}")]
    InvalidCellReference(String),

    #[error("{rows} data rows do not fit on sheet '{sheet}' starting at row {first_row}")]
    TooManyRows {
        sheet: String,
        rows: usize,
        first_row: u32,
    },

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Time column '{column}' does not exist in table '{table}'")]
    MissingTimeColumn { table: String, column: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),
}
