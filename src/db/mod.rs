//! MySQL data loading: connection settings, parameterized query building and
//! the row fetcher feeding the workbook update.

mod config;
mod fetcher;
pub mod query;
mod table;

pub use config::DatabaseConfig;
pub use fetcher::{MySqlFetcher, RowFetcher};
pub use query::{Period, SourceKind, SourceQuery};
pub use table::TableData;
