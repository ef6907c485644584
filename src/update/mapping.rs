use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::error::{RefreshError, RefreshResult};
use crate::utils::{index_to_col_name, parse_column};

/// Spreadsheet column (1-based) -> source column name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "IndexMap<String, String>")]
pub struct ColumnMapping {
    entries: IndexMap<usize, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from `("C", "日期")`-style pairs. Column letters are
    /// validated and must be unique (case-insensitively).
    pub fn from_letters<I, K, V>(pairs: I) -> RefreshResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut mapping = Self::new();
        for (letters, source) in pairs {
            let col = parse_column(letters.as_ref())?;
            if mapping.entries.insert(col, source.into()).is_some() {
                return Err(RefreshError::Config(format!(
                    "Column {} is mapped more than once",
                    index_to_col_name(col)
                )));
            }
        }
        Ok(mapping)
    }

    pub fn insert(&mut self, col: usize, source: impl Into<String>) -> Option<String> {
        self.entries.insert(col, source.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(|(col, source)| (*col, source.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn source_for(&self, col: usize) -> Option<&str> {
        self.entries.get(&col).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<IndexMap<String, String>> for ColumnMapping {
    type Error = RefreshError;

    fn try_from(value: IndexMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_letters(value)
    }
}

/// Update of one sheet from the single data set of a single-source run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetUpdate {
    pub column_mapping: ColumnMapping,
    /// Columns outside the mapping whose formulas are tracked too.
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub known_formula_columns: Vec<usize>,
}

impl SheetUpdate {
    pub fn new(column_mapping: ColumnMapping) -> Self {
        Self {
            column_mapping,
            known_formula_columns: Vec::new(),
        }
    }

    pub fn with_formula_columns(mut self, columns: &[&str]) -> RefreshResult<Self> {
        for letters in columns {
            self.known_formula_columns.push(parse_column(letters)?);
        }
        Ok(self)
    }

    pub fn columns_to_check(&self) -> BTreeSet<usize> {
        self.column_mapping
            .columns()
            .chain(self.known_formula_columns.iter().copied())
            .collect()
    }
}

/// One entry of a multi-source sheet update: which data set feeds which columns.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceUpdate {
    pub source: String,
    pub column_mapping: ColumnMapping,
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub known_formula_columns: Vec<usize>,
}

impl SourceUpdate {
    pub fn new(source: impl Into<String>, column_mapping: ColumnMapping) -> Self {
        Self {
            source: source.into(),
            column_mapping,
            known_formula_columns: Vec::new(),
        }
    }
}

/// Union of every mapped and known formula column across `updates`.
pub fn columns_to_check(updates: &[SourceUpdate]) -> BTreeSet<usize> {
    updates
        .iter()
        .flat_map(|update| {
            update
                .column_mapping
                .columns()
                .chain(update.known_formula_columns.iter().copied())
        })
        .collect()
}

fn deserialize_columns<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let letters = Vec::<String>::deserialize(deserializer)?;
    letters
        .iter()
        .map(|letters| parse_column(letters).map_err(serde::de::Error::custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_letter_keys() {
        let mapping = ColumnMapping::from_letters([("C", "日期"), ("ac", "价格")]).unwrap();
        assert_eq!(mapping.iter().collect::<Vec<_>>(), vec![(3, "日期"), (29, "价格")]);
        assert_eq!(mapping.source_for(29), Some("价格"));
    }

    #[test]
    fn rejects_duplicate_and_invalid_columns() {
        assert!(ColumnMapping::from_letters([("A", "x"), ("a", "y")]).is_err());
        assert!(ColumnMapping::from_letters([("A1", "x")]).is_err());
    }

    #[test]
    fn deserializes_sheet_update() {
        let update: SheetUpdate =
            serde_yaml::from_str("column_mapping:\n  A: x\n  B: y\nknown_formula_columns: [D, E]\n")
                .unwrap();
        assert_eq!(update.column_mapping.len(), 2);
        assert_eq!(update.known_formula_columns, vec![4, 5]);
        assert_eq!(update.columns_to_check().into_iter().collect::<Vec<_>>(), vec![1, 2, 4, 5]);

        let bad = serde_yaml::from_str::<SheetUpdate>("column_mapping:\n  '1A': x\n");
        assert!(bad.is_err());
    }

    #[test]
    fn unions_columns_across_sources() {
        let first = SourceUpdate::new("a", ColumnMapping::from_letters([("A", "x")]).unwrap());
        let mut second = SourceUpdate::new("b", ColumnMapping::from_letters([("B", "y")]).unwrap());
        second.known_formula_columns = vec![4];

        assert_eq!(
            columns_to_check(&[first, second]).into_iter().collect::<Vec<_>>(),
            vec![1, 2, 4]
        );
    }
}
