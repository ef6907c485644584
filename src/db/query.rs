//! Parameterized `SELECT` construction.
//!
//! Values always travel as bound parameters (`?` placeholders). Table and
//! column names cannot be bound, so they are validated and backtick-quoted.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{RefreshError, RefreshResult};

#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<NaiveDate> for SqlParam {
    fn from(value: NaiveDate) -> Self {
        SqlParam::Date(value)
    }
}

impl From<NaiveDateTime> for SqlParam {
    fn from(value: NaiveDateTime) -> Self {
        SqlParam::DateTime(value)
    }
}

/// SQL text plus the values for its placeholders, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregation {
    #[default]
    Avg,
    Sum,
    Max,
    Min,
    Count,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Avg => "AVG",
            Aggregation::Sum => "SUM",
            Aggregation::Max => "MAX",
            Aggregation::Min => "MIN",
            Aggregation::Count => "COUNT",
        };
        f.write_str(name)
    }
}

impl FromStr for Aggregation {
    type Err = RefreshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVG" => Ok(Aggregation::Avg),
            "SUM" => Ok(Aggregation::Sum),
            "MAX" => Ok(Aggregation::Max),
            "MIN" => Ok(Aggregation::Min),
            "COUNT" => Ok(Aggregation::Count),
            _ => Err(RefreshError::Config(format!("Unknown aggregation: {}", s))),
        }
    }
}

/// Bucket width for aggregated time series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum TimeInterval {
    #[serde(rename = "1H")]
    Hour,
    #[default]
    #[serde(rename = "1D")]
    Day,
    #[serde(rename = "1W")]
    Week,
    #[serde(rename = "1M")]
    Month,
}

impl FromStr for TimeInterval {
    type Err = RefreshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "1H" => Ok(TimeInterval::Hour),
            "1D" => Ok(TimeInterval::Day),
            "1W" => Ok(TimeInterval::Week),
            "1M" => Ok(TimeInterval::Month),
            _ => Err(RefreshError::Config(format!("Unknown time interval: {}", s))),
        }
    }
}

impl TimeInterval {
    fn bucket_sql(self, column: &str) -> String {
        match self {
            TimeInterval::Hour => format!("DATE_FORMAT({column}, '%Y-%m-%d %H:00:00')"),
            TimeInterval::Day => format!("DATE({column})"),
            TimeInterval::Week => {
                format!("DATE_SUB(DATE({column}), INTERVAL WEEKDAY({column}) DAY)")
            }
            TimeInterval::Month => format!("DATE_FORMAT({column}, '%Y-%m-01')"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Projection {
    Column(String),
    Bucket {
        interval: TimeInterval,
        column: String,
        alias: String,
    },
    Aggregate {
        aggregation: Aggregation,
        column: String,
        alias: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
struct Condition {
    column: String,
    op: CompareOp,
    value: SqlParam,
}

#[derive(Clone, Debug, PartialEq)]
enum Grouping {
    Column(String),
    Alias(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    table: String,
    projections: Vec<Projection>,
    conditions: Vec<Condition>,
    group_by: Vec<Grouping>,
    order_by: Vec<Grouping>,
}

impl SelectQuery {
    /// `SELECT * FROM table` until columns are added.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            projections: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name != "*" {
            self.projections.push(Projection::Column(name));
        }
        self
    }

    pub fn columns<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |query, name| query.column(name))
    }

    pub fn time_bucket(mut self, interval: TimeInterval, column: impl Into<String>, alias: &str) -> Self {
        self.projections.push(Projection::Bucket {
            interval,
            column: column.into(),
            alias: alias.to_string(),
        });
        self
    }

    pub fn aggregate(mut self, aggregation: Aggregation, column: impl Into<String>, alias: &str) -> Self {
        self.projections.push(Projection::Aggregate {
            aggregation,
            column: column.into(),
            alias: alias.to_string(),
        });
        self
    }

    pub fn filter(mut self, column: impl Into<String>, op: CompareOp, value: impl Into<SqlParam>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<SqlParam>) -> Self {
        self.filter(column, CompareOp::Eq, value)
    }

    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(Grouping::Column(column.into()));
        self
    }

    pub fn group_by_alias(mut self, alias: &str) -> Self {
        self.group_by.push(Grouping::Alias(alias.to_string()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(Grouping::Column(column.into()));
        self
    }

    pub fn order_by_alias(mut self, alias: &str) -> Self {
        self.order_by.push(Grouping::Alias(alias.to_string()));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn build(&self) -> RefreshResult<BuiltQuery> {
        let projections = if self.projections.is_empty() {
            "*".to_string()
        } else {
            self.projections
                .iter()
                .map(render_projection)
                .collect::<RefreshResult<Vec<_>>>()?
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", projections, quote_table(&self.table)?);
        let mut params = Vec::with_capacity(self.conditions.len());

        if !self.conditions.is_empty() {
            let mut clauses = Vec::with_capacity(self.conditions.len());
            for condition in &self.conditions {
                clauses.push(format!(
                    "{} {} ?",
                    quote_identifier(&condition.column)?,
                    condition.op.as_sql()
                ));
                params.push(condition.value.clone());
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&render_groupings(&self.group_by)?);
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&render_groupings(&self.order_by)?);
        }

        Ok(BuiltQuery { sql, params })
    }
}

fn render_projection(projection: &Projection) -> RefreshResult<String> {
    Ok(match projection {
        Projection::Column(name) => quote_identifier(name)?,
        Projection::Bucket {
            interval,
            column,
            alias,
        } => format!(
            "{} AS {}",
            interval.bucket_sql(&quote_identifier(column)?),
            quote_identifier(alias)?
        ),
        Projection::Aggregate {
            aggregation,
            column,
            alias,
        } => format!(
            "{}({}) AS {}",
            aggregation,
            quote_identifier(column)?,
            quote_identifier(alias)?
        ),
    })
}

fn render_groupings(groupings: &[Grouping]) -> RefreshResult<String> {
    let rendered = groupings
        .iter()
        .map(|grouping| match grouping {
            Grouping::Column(name) | Grouping::Alias(name) => quote_identifier(name),
        })
        .collect::<RefreshResult<Vec<_>>>()?;
    Ok(rendered.join(", "))
}

/// Backtick-quotes one identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> RefreshResult<String> {
    if name.trim().is_empty() || name.contains('\0') {
        return Err(RefreshError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quotes a table name, honouring a `schema.table` qualifier.
pub fn quote_table(name: &str) -> RefreshResult<String> {
    let (schema, table) = split_table(name);
    match schema {
        Some(schema) => Ok(format!("{}.{}", quote_identifier(schema)?, quote_identifier(table)?)),
        None => quote_identifier(table),
    }
}

fn split_table(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}

/// Counts matching columns in `information_schema`; zero means the column is missing.
pub fn column_exists_query(table: &str, column: &str) -> RefreshResult<BuiltQuery> {
    let (schema, table_name) = split_table(table);
    quote_table(table)?;
    quote_identifier(column)?;

    let mut params = Vec::with_capacity(3);
    let schema_clause = match schema {
        Some(schema) => {
            params.push(SqlParam::from(schema));
            "TABLE_SCHEMA = ?"
        }
        None => "TABLE_SCHEMA = DATABASE()",
    };
    params.push(SqlParam::from(table_name));
    params.push(SqlParam::from(column));

    Ok(BuiltQuery {
        sql: format!(
            "SELECT COUNT(*) FROM information_schema.COLUMNS WHERE {} AND TABLE_NAME = ? AND COLUMN_NAME = ?",
            schema_clause
        ),
        params,
    })
}

/// Time window applied to a source's time column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    All,
    CurrentMonth,
    CurrentYear,
    /// Uses the source's `start`/`end` dates, both inclusive.
    Range,
}

/// First day of the month containing `date`, and of the following month.
pub fn month_bounds(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = date.with_day(1)?;
    let end = start.checked_add_months(chrono::Months::new(1))?;
    Some((start, end))
}

/// January 1st of `date`'s year and of the next one.
pub fn year_bounds(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(date.year(), 1, 1)?;
    let end = NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)?;
    Some((start, end))
}

/// Shape of the rows a source returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Selected columns within the period window.
    #[default]
    Period,
    /// Every row of the table matching the filters.
    Table,
    /// Time and value columns (plus `columns`) ordered by time.
    TimeSeries,
    /// `value_column` aggregated per time bucket.
    Aggregate,
}

/// One named data source of a refresh job.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceQuery {
    #[serde(default)]
    pub kind: SourceKind,
    pub table: String,
    /// Empty selects every column.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Required by every kind except `table`.
    #[serde(default)]
    pub time_column: String,
    #[serde(default)]
    pub period: Period,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    /// Extra equality predicates.
    #[serde(default)]
    pub filters: IndexMap<String, String>,
    /// Measured column of `time_series` and `aggregate` sources.
    #[serde(default)]
    pub value_column: Option<String>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub interval: TimeInterval,
}

impl SourceQuery {
    pub fn new(table: impl Into<String>, time_column: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Period,
            table: table.into(),
            columns: Vec::new(),
            time_column: time_column.into(),
            period: Period::All,
            start: None,
            end: None,
            filters: IndexMap::new(),
            value_column: None,
            group_by: None,
            aggregation: Aggregation::default(),
            interval: TimeInterval::default(),
        }
    }

    /// Half-open `[start, end)` window for `today`, if the period has one.
    pub fn bounds(&self, today: NaiveDate) -> RefreshResult<Option<(NaiveDate, NaiveDate)>> {
        let out_of_range = || RefreshError::Config(format!("Date out of range for {}", self.table));
        match self.period {
            Period::All => Ok(None),
            Period::CurrentMonth => month_bounds(today).map(Some).ok_or_else(out_of_range),
            Period::CurrentYear => year_bounds(today).map(Some).ok_or_else(out_of_range),
            Period::Range => {
                let (Some(start), Some(end)) = (self.start, self.end) else {
                    return Err(RefreshError::Config(format!(
                        "Source on table '{}' uses period 'range' without both start and end",
                        self.table
                    )));
                };
                if end < start {
                    return Err(RefreshError::Config(format!(
                        "Source on table '{}' ends ({}) before it starts ({})",
                        self.table, end, start
                    )));
                }
                let end = end.checked_add_days(Days::new(1)).ok_or_else(out_of_range)?;
                Ok(Some((start, end)))
            }
        }
    }

    /// The query this source runs on `today`, whatever its kind.
    pub fn to_select(&self, today: NaiveDate) -> RefreshResult<SelectQuery> {
        match self.kind {
            SourceKind::Period => self.period_select(today),
            SourceKind::Table => Ok(table_data_query(&self.table, &self.filters)),
            SourceKind::TimeSeries => Ok(self.time_series_request(today)?.to_select()),
            SourceKind::Aggregate => Ok(self.aggregate_request(today)?.to_select()),
        }
    }

    pub fn period_select(&self, today: NaiveDate) -> RefreshResult<SelectQuery> {
        let mut query = SelectQuery::new(&self.table).columns(self.columns.iter().cloned());

        if let Some((start, end)) = self.bounds(today)? {
            query = query
                .filter(&self.time_column, CompareOp::Gte, start)
                .filter(&self.time_column, CompareOp::Lt, end);
        }

        for (column, value) in &self.filters {
            query = query.filter_eq(column, value.as_str());
        }

        Ok(query)
    }

    pub fn time_series_request(&self, today: NaiveDate) -> RefreshResult<TimeSeriesRequest> {
        let (start, end) = self.datetime_bounds(today)?;
        Ok(TimeSeriesRequest {
            table: self.table.clone(),
            time_column: self.time_column.clone(),
            value_column: self.require_value_column()?.to_string(),
            start,
            end,
            group_by: self.group_by.clone(),
            additional_columns: self.columns.clone(),
            filters: self.filters.clone(),
        })
    }

    pub fn aggregate_request(&self, today: NaiveDate) -> RefreshResult<AggregateRequest> {
        let (start, end) = self.datetime_bounds(today)?;
        Ok(AggregateRequest {
            table: self.table.clone(),
            time_column: self.time_column.clone(),
            value_column: self.require_value_column()?.to_string(),
            aggregation: self.aggregation,
            interval: self.interval,
            start,
            end,
            filters: self.filters.clone(),
        })
    }

    fn require_value_column(&self) -> RefreshResult<&str> {
        self.value_column.as_deref().ok_or_else(|| {
            RefreshError::Config(format!(
                "Source on table '{}' needs a value_column",
                self.table
            ))
        })
    }

    /// The period window as inclusive datetimes: midnight of the first day to
    /// the last second of the last one.
    fn datetime_bounds(
        &self,
        today: NaiveDate,
    ) -> RefreshResult<(Option<NaiveDateTime>, Option<NaiveDateTime>)> {
        let Some((start, end)) = self.bounds(today)? else {
            return Ok((None, None));
        };
        let last_second = end
            .and_time(NaiveTime::MIN)
            .checked_sub_signed(Duration::seconds(1))
            .ok_or_else(|| RefreshError::Config(format!("Date out of range for {}", self.table)))?;

        Ok((Some(start.and_time(NaiveTime::MIN)), Some(last_second)))
    }
}

/// `SELECT * FROM table WHERE k = ? AND ...`
pub fn table_data_query(table: &str, filters: &IndexMap<String, String>) -> SelectQuery {
    filters
        .iter()
        .fold(SelectQuery::new(table), |query, (column, value)| {
            query.filter_eq(column, value.as_str())
        })
}

/// Inputs of a raw (ungrouped or grouped) time series query.
#[derive(Clone, Debug, Default)]
pub struct TimeSeriesRequest {
    pub table: String,
    pub time_column: String,
    pub value_column: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub group_by: Option<String>,
    pub additional_columns: Vec<String>,
    pub filters: IndexMap<String, String>,
}

impl TimeSeriesRequest {
    pub fn to_select(&self) -> SelectQuery {
        let mut query = SelectQuery::new(&self.table)
            .column(&self.time_column)
            .column(&self.value_column)
            .columns(self.additional_columns.iter().cloned());

        query = with_time_bounds(query, &self.time_column, self.start, self.end);
        for (column, value) in &self.filters {
            query = query.filter_eq(column, value.as_str());
        }

        if let Some(group_by) = &self.group_by {
            query = query.group_by(group_by);
        }

        query.order_by(&self.time_column)
    }
}

/// Inputs of a bucketed, aggregated time series query.
#[derive(Clone, Debug)]
pub struct AggregateRequest {
    pub table: String,
    pub time_column: String,
    pub value_column: String,
    pub aggregation: Aggregation,
    pub interval: TimeInterval,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub filters: IndexMap<String, String>,
}

/// Column names of an aggregated result.
pub const BUCKET_ALIAS: &str = "time_interval";
pub const VALUE_ALIAS: &str = "value";

impl AggregateRequest {
    pub fn to_select(&self) -> SelectQuery {
        let mut query = SelectQuery::new(&self.table)
            .time_bucket(self.interval, &self.time_column, BUCKET_ALIAS)
            .aggregate(self.aggregation, &self.value_column, VALUE_ALIAS);

        query = with_time_bounds(query, &self.time_column, self.start, self.end);
        for (column, value) in &self.filters {
            query = query.filter_eq(column, value.as_str());
        }

        query.group_by_alias(BUCKET_ALIAS).order_by_alias(BUCKET_ALIAS)
    }
}

fn with_time_bounds(
    mut query: SelectQuery,
    time_column: &str,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> SelectQuery {
    if let Some(start) = start {
        query = query.filter(time_column, CompareOp::Gte, start);
    }
    if let Some(end) = end {
        query = query.filter(time_column, CompareOp::Lte, end);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn select_all_without_columns() {
        let built = SelectQuery::new("load_actual_running").build().unwrap();
        assert_eq!(built.sql, "SELECT * FROM `load_actual_running`");
        assert!(built.params.is_empty());
    }

    #[test]
    fn values_are_bound_not_interpolated() {
        let built = table_data_query(
            "devices",
            &IndexMap::from([("device_type".to_string(), "heater' OR '1'='1".to_string())]),
        )
        .build()
        .unwrap();

        assert_eq!(built.sql, "SELECT * FROM `devices` WHERE `device_type` = ?");
        assert_eq!(built.params, vec![SqlParam::from("heater' OR '1'='1")]);
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("统调负荷").unwrap(), "`统调负荷`");
        assert_eq!(quote_identifier("we`ird").unwrap(), "`we``ird`");
        assert_eq!(quote_table("market.prices").unwrap(), "`market`.`prices`");
        assert!(matches!(
            quote_identifier("  "),
            Err(RefreshError::InvalidIdentifier(_))
        ));
        assert!(SelectQuery::new("").build().is_err());
    }

    #[test]
    fn current_month_source() {
        let mut source = SourceQuery::new("load_forecast", "日期");
        source.columns = vec!["日期".into(), "时刻".into(), "统调负荷".into()];
        source.period = Period::CurrentMonth;
        source.filters.insert("region".into(), "south".into());

        let built = source.to_select(date(2025, 1, 17)).unwrap().build().unwrap();
        assert_eq!(
            built.sql,
            "SELECT `日期`, `时刻`, `统调负荷` FROM `load_forecast` \
             WHERE `日期` >= ? AND `日期` < ? AND `region` = ?"
        );
        assert_eq!(
            built.params,
            vec![
                SqlParam::Date(date(2025, 1, 1)),
                SqlParam::Date(date(2025, 2, 1)),
                SqlParam::from("south"),
            ]
        );
    }

    #[test]
    fn month_bounds_roll_over_december() {
        assert_eq!(
            month_bounds(date(2024, 12, 31)),
            Some((date(2024, 12, 1), date(2025, 1, 1)))
        );
        assert_eq!(
            year_bounds(date(2024, 6, 1)),
            Some((date(2024, 1, 1), date(2025, 1, 1)))
        );
    }

    #[test]
    fn explicit_range_is_inclusive() {
        let mut source = SourceQuery::new("t", "day");
        source.period = Period::Range;
        source.start = Some(date(2025, 3, 1));
        source.end = Some(date(2025, 3, 31));
        assert_eq!(
            source.bounds(date(2000, 1, 1)).unwrap(),
            Some((date(2025, 3, 1), date(2025, 4, 1)))
        );

        source.end = None;
        assert!(source.bounds(date(2000, 1, 1)).is_err());

        source.end = Some(date(2025, 2, 1));
        assert!(source.bounds(date(2000, 1, 1)).is_err());
    }

    #[test]
    fn time_series_query_orders_by_time() {
        let request = TimeSeriesRequest {
            table: "readings".into(),
            time_column: "ts".into(),
            value_column: "load".into(),
            start: Some(date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap()),
            group_by: Some("station".into()),
            additional_columns: vec!["station".into()],
            ..Default::default()
        };

        let built = request.to_select().build().unwrap();
        assert_eq!(
            built.sql,
            "SELECT `ts`, `load`, `station` FROM `readings` WHERE `ts` >= ? \
             GROUP BY `station` ORDER BY `ts`"
        );
        assert_eq!(built.params.len(), 1);
    }

    #[test]
    fn aggregated_query_buckets_by_interval() {
        let request = AggregateRequest {
            table: "readings".into(),
            time_column: "ts".into(),
            value_column: "load".into(),
            aggregation: "max".parse().unwrap(),
            interval: "1w".parse().unwrap(),
            start: None,
            end: Some(date(2025, 1, 31).and_hms_opt(23, 59, 59).unwrap()),
            filters: IndexMap::new(),
        };

        let built = request.to_select().build().unwrap();
        assert_eq!(
            built.sql,
            "SELECT DATE_SUB(DATE(`ts`), INTERVAL WEEKDAY(`ts`) DAY) AS `time_interval`, \
             MAX(`load`) AS `value` FROM `readings` WHERE `ts` <= ? \
             GROUP BY `time_interval` ORDER BY `time_interval`"
        );
    }

    #[test]
    fn column_check_is_parameterized() {
        let built = column_exists_query("load_actual_running", "日期").unwrap();
        assert!(built.sql.contains("TABLE_SCHEMA = DATABASE()"));
        assert_eq!(built.params.len(), 2);

        let qualified = column_exists_query("market.prices", "day").unwrap();
        assert_eq!(
            qualified.params,
            vec![
                SqlParam::from("market"),
                SqlParam::from("prices"),
                SqlParam::from("day")
            ]
        );
    }

    #[test]
    fn parses_aggregations_and_intervals() {
        assert_eq!("avg".parse::<Aggregation>().unwrap(), Aggregation::Avg);
        assert!("median".parse::<Aggregation>().is_err());
        assert_eq!("1D".parse::<TimeInterval>().unwrap(), TimeInterval::Day);
        assert!("2D".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn table_source_ignores_the_period() {
        let mut source = SourceQuery::new("devices", "");
        source.kind = SourceKind::Table;
        source.period = Period::CurrentMonth;
        source.filters.insert("device_type".into(), "heater".into());

        let built = source.to_select(date(2025, 1, 17)).unwrap().build().unwrap();
        assert_eq!(built.sql, "SELECT * FROM `devices` WHERE `device_type` = ?");
    }

    #[test]
    fn time_series_source_uses_inclusive_datetime_window() {
        let mut source = SourceQuery::new("readings", "ts");
        source.kind = SourceKind::TimeSeries;
        source.period = Period::CurrentMonth;
        source.value_column = Some("load".into());

        let built = source.to_select(date(2025, 2, 10)).unwrap().build().unwrap();
        assert_eq!(
            built.sql,
            "SELECT `ts`, `load` FROM `readings` WHERE `ts` >= ? AND `ts` <= ? ORDER BY `ts`"
        );
        assert_eq!(
            built.params,
            vec![
                SqlParam::DateTime(date(2025, 2, 1).and_hms_opt(0, 0, 0).unwrap()),
                SqlParam::DateTime(date(2025, 2, 28).and_hms_opt(23, 59, 59).unwrap()),
            ]
        );
    }

    #[test]
    fn aggregate_source_defaults_to_daily_average() {
        let mut source = SourceQuery::new("readings", "ts");
        source.kind = SourceKind::Aggregate;
        source.value_column = Some("load".into());

        let request = source.aggregate_request(date(2025, 1, 1)).unwrap();
        assert_eq!(request.aggregation, Aggregation::Avg);
        assert_eq!(request.interval, TimeInterval::Day);
        assert_eq!((request.start, request.end), (None, None));

        let built = request.to_select().build().unwrap();
        assert_eq!(
            built.sql,
            "SELECT DATE(`ts`) AS `time_interval`, AVG(`load`) AS `value` FROM `readings` \
             GROUP BY `time_interval` ORDER BY `time_interval`"
        );
    }

    #[test]
    fn measured_kinds_need_a_value_column() {
        let mut source = SourceQuery::new("readings", "ts");
        source.kind = SourceKind::Aggregate;
        assert!(matches!(
            source.to_select(date(2025, 1, 1)),
            Err(RefreshError::Config(_))
        ));
    }

    #[test]
    fn period_source_needs_a_time_column_once_windowed() {
        let mut source = SourceQuery::new("t", "");
        assert!(source.to_select(date(2025, 1, 1)).unwrap().build().is_ok());

        source.period = Period::CurrentYear;
        assert!(source.to_select(date(2025, 1, 1)).unwrap().build().is_err());
    }
}
