use indexmap::IndexMap;
use serde_json::Value;

use crate::excel::CellValue;
use crate::json_export::cell_value_to_json;

/// Rows returned by a query, keyed by source column name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TableData {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from column names and rows; short rows are padded with
    /// empty values.
    pub fn from_rows<C, R>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<CellValue>>,
    {
        let mut table = Self::new(columns.into_iter().map(Into::into).collect());
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Rows as JSON objects keyed by column name, in column order.
    pub fn to_json_rows(&self) -> Vec<IndexMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), cell_value_to_json(value)))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> TableData {
        TableData::from_rows(
            ["日期", "统调负荷"],
            vec![
                vec![CellValue::DateTime(45658.0), CellValue::Number(1.5)],
                vec![CellValue::DateTime(45659.0)],
            ],
        )
    }

    #[test]
    fn pads_short_rows() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, "统调负荷"), Some(&CellValue::Empty));
        assert_eq!(table.value(0, "missing"), None);
        assert!(table.has_column("日期"));
    }

    #[test]
    fn serializes_rows_in_column_order() {
        let rows = sample().to_json_rows();
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["日期", "统调负荷"]);
        assert_eq!(rows[0]["日期"], json!("2025-01-01"));
        assert_eq!(rows[1]["统调负荷"], Value::Null);
    }
}
