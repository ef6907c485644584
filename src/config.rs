use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use crate::db::{DatabaseConfig, SourceQuery};
use crate::error::{RefreshError, RefreshResult};
use crate::update::{RestorePolicy, SourceUpdate, UpdateOptions};

/// A refresh job as read from YAML: where the data comes from and which
/// sheet columns it lands in.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshJob {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    pub workbook: PathBuf,
    #[serde(default)]
    pub sources: IndexMap<String, SourceQuery>,
    pub sheets: IndexMap<String, Vec<SourceUpdate>>,
    /// Keep formulas on rows that received no data instead of dropping them.
    #[serde(default)]
    pub keep_untouched_formulas: bool,
}

impl RefreshJob {
    /// Loads a job file. A relative `workbook` path is taken relative to the
    /// job file's directory.
    pub fn from_file(path: &Path) -> RefreshResult<Self> {
        let contents = fs::read_to_string(path)?;
        let mut job = Self::from_yaml_str(&contents)?;

        if job.workbook.is_relative() {
            if let Some(dir) = path.parent() {
                job.workbook = dir.join(&job.workbook);
            }
        }

        Ok(job)
    }

    pub fn from_yaml_str(contents: &str) -> RefreshResult<Self> {
        let job: Self = serde_yaml::from_str(contents)?;
        job.validate()?;
        Ok(job)
    }

    pub fn validate(&self) -> RefreshResult<()> {
        if self.sheets.is_empty() {
            return Err(RefreshError::Config("Job lists no sheets".to_string()));
        }

        let today = Local::now().date_naive();
        for (name, source) in &self.sources {
            source
                .to_select(today)
                .and_then(|query| query.build())
                .map_err(|e| RefreshError::Config(format!("Source '{}': {}", name, e)))?;
        }

        for (sheet, updates) in &self.sheets {
            for update in updates {
                if !self.sources.contains_key(&update.source) {
                    warn!(
                        "Sheet '{}' refers to undefined source '{}'",
                        sheet, update.source
                    );
                }
            }
        }

        Ok(())
    }

    pub fn options(&self) -> UpdateOptions {
        let restore_policy = if self.keep_untouched_formulas {
            RestorePolicy::KeepUntouched
        } else {
            RestorePolicy::DropUntouched
        };
        UpdateOptions { restore_policy }
    }

    /// Sources used by at least one sheet, in declaration order.
    pub fn referenced_sources(&self) -> IndexMap<String, SourceQuery> {
        self.sources
            .iter()
            .filter(|(name, _)| {
                self.sheets
                    .values()
                    .flatten()
                    .any(|update| &update.source == *name)
            })
            .map(|(name, source)| (name.clone(), source.clone()))
            .collect()
    }

    pub fn database(&self) -> RefreshResult<&DatabaseConfig> {
        self.database
            .as_ref()
            .ok_or_else(|| RefreshError::Config("Job has no database section".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::query::{Aggregation, TimeInterval};
    use crate::db::{Period, SourceKind};

    const JOB: &str = r#"
database:
  host: 127.0.0.1
  user: report
  database: market
workbook: template.xlsx
sources:
  load:
    table: load_data
    time_column: 日期
    period: current_month
  prices:
    table: price_data
    time_column: ts
  unused:
    table: other
    time_column: ts
sheets:
  Daily:
    - source: load
      column_mapping:
        A: 日期
        B: 统调负荷
      known_formula_columns: [D]
    - source: prices
      column_mapping:
        C: price
"#;

    #[test]
    fn parses_a_job() {
        let job = RefreshJob::from_yaml_str(JOB).unwrap();

        assert_eq!(job.database().unwrap().port, 3306);
        assert_eq!(job.sources["load"].period, Period::CurrentMonth);
        assert_eq!(job.sheets["Daily"].len(), 2);
        assert_eq!(job.sheets["Daily"][0].known_formula_columns, vec![4]);
        assert_eq!(job.options(), UpdateOptions::default());
        assert_eq!(
            job.referenced_sources().keys().collect::<Vec<_>>(),
            vec!["load", "prices"]
        );
    }

    #[test]
    fn rejects_bad_jobs() {
        let bad_column = JOB.replace("A: 日期", "A1: 日期");
        assert!(RefreshJob::from_yaml_str(&bad_column).is_err());

        let open_range = JOB.replace("period: current_month", "period: range");
        assert!(matches!(
            RefreshJob::from_yaml_str(&open_range),
            Err(RefreshError::Config(_))
        ));

        let unknown_key = format!("{JOB}retries: 3\n");
        assert!(RefreshJob::from_yaml_str(&unknown_key).is_err());
    }

    #[test]
    fn keep_flag_selects_policy() {
        let job = RefreshJob::from_yaml_str(&format!("{JOB}keep_untouched_formulas: true\n")).unwrap();
        assert_eq!(job.options().restore_policy, RestorePolicy::KeepUntouched);
    }

    #[test]
    fn workbook_path_is_relative_to_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        fs::File::create(&path)
            .unwrap()
            .write_all(JOB.as_bytes())
            .unwrap();

        let job = RefreshJob::from_file(&path).unwrap();
        assert_eq!(job.workbook, dir.path().join("template.xlsx"));
    }

    #[test]
    fn demo_job_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/refresh.yaml");
        let job = RefreshJob::from_file(&path).unwrap();

        assert_eq!(job.sources["prices"].period, Period::Range);
        assert_eq!(job.sources["prices"].filters["区域"], "南方");
        assert_eq!(job.sheets["日数据"][0].known_formula_columns, vec![6, 7]);
    }

    #[test]
    fn source_kinds_parse_with_defaults() {
        let job = JOB.replace(
            "  unused:\n    table: other\n    time_column: ts\n",
            "  unused:\n    kind: aggregate\n    table: other\n    time_column: ts\n    value_column: load\n    interval: 1H\n  devices:\n    kind: table\n    table: devices\n",
        );
        let job = RefreshJob::from_yaml_str(&job).unwrap();

        let unused = &job.sources["unused"];
        assert_eq!(unused.kind, SourceKind::Aggregate);
        assert_eq!(unused.aggregation, Aggregation::Avg);
        assert_eq!(unused.interval, TimeInterval::Hour);
        assert_eq!(job.sources["devices"].kind, SourceKind::Table);
        assert_eq!(job.sources["load"].kind, SourceKind::Period);
    }

    #[test]
    fn aggregate_source_without_value_column_is_rejected() {
        let job = JOB.replace(
            "  unused:\n    table: other\n",
            "  unused:\n    kind: aggregate\n    table: other\n",
        );
        assert!(matches!(
            RefreshJob::from_yaml_str(&job),
            Err(RefreshError::Config(message)) if message.contains("value_column")
        ));
    }
}
