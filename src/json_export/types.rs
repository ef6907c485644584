use indexmap::IndexMap;
use serde_json::Value;

/// Sheet rows as JSON objects keyed by header, in column order.
pub type OrderedSheetData = Vec<IndexMap<String, Value>>;

/// `coordinate -> =formula` for one sheet, row by row.
pub type SheetFormulas = IndexMap<String, String>;

/// Sheet name -> formulas, in workbook order.
pub type WorkbookFormulas = IndexMap<String, SheetFormulas>;
