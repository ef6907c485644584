use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Decode, Executor, Row, Type, TypeInfo, ValueRef};
use tracing::{debug, error, info};

use crate::db::config::DatabaseConfig;
use crate::db::query::{
    AggregateRequest, BuiltQuery, SourceKind, SourceQuery, SqlParam, TimeSeriesRequest,
    column_exists_query, table_data_query,
};
use crate::db::table::TableData;
use crate::error::{RefreshError, RefreshResult};
use crate::excel::CellValue;

/// Anything that can turn a source definition into rows.
#[async_trait]
pub trait RowFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceQuery) -> RefreshResult<TableData>;
}

/// MySQL-backed fetcher over a connection pool; the pool size bounds how
/// many sources are queried at once.
pub struct MySqlFetcher {
    pool: MySqlPool,
}

impl MySqlFetcher {
    pub async fn connect(config: &DatabaseConfig) -> RefreshResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(config.connect_options())
            .await
            .inspect_err(|e| error!("Error connecting to MySQL database: {}", e))?;

        info!(
            "Connected to MySQL database {}@{}:{}/{}",
            config.user, config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("MySQL connection closed");
    }

    /// Rows of `source` as of `today`, shaped by its kind.
    pub async fn source_data(&self, source: &SourceQuery, today: NaiveDate) -> RefreshResult<TableData> {
        match source.kind {
            SourceKind::Period => self.period_data(source, today).await,
            SourceKind::Table => self.table_data(&source.table, &source.filters).await,
            SourceKind::TimeSeries => {
                self.time_series_data(&source.time_series_request(today)?).await
            }
            SourceKind::Aggregate => {
                self.aggregated_data(&source.aggregate_request(today)?).await
            }
        }
    }

    /// Every row of `table` matching the equality filters.
    pub async fn table_data(
        &self,
        table: &str,
        filters: &IndexMap<String, String>,
    ) -> RefreshResult<TableData> {
        let query = table_data_query(table, filters).build()?;
        self.run(&query).await
    }

    /// Rows of a source restricted to its period, after checking that the
    /// time column exists.
    pub async fn period_data(&self, source: &SourceQuery, today: NaiveDate) -> RefreshResult<TableData> {
        self.ensure_column(&source.table, &source.time_column).await?;
        let query = source.period_select(today)?.build()?;
        self.run(&query).await
    }

    pub async fn time_series_data(&self, request: &TimeSeriesRequest) -> RefreshResult<TableData> {
        let query = request.to_select().build()?;
        self.run(&query).await
    }

    pub async fn aggregated_data(&self, request: &AggregateRequest) -> RefreshResult<TableData> {
        let query = request.to_select().build()?;
        self.run(&query).await
    }

    async fn ensure_column(&self, table: &str, column: &str) -> RefreshResult<()> {
        let check = column_exists_query(table, column)?;
        let mut query = sqlx::query_scalar::<_, i64>(&check.sql);
        for param in &check.params {
            query = query.bind(param_as_text(param));
        }

        let count = query.fetch_one(&self.pool).await?;
        if count == 0 {
            return Err(RefreshError::MissingTimeColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        Ok(())
    }

    pub async fn run(&self, built: &BuiltQuery) -> RefreshResult<TableData> {
        debug!("Executing: {} ({} params)", built.sql, built.params.len());

        let mut query = sqlx::query(&built.sql);
        for param in &built.params {
            query = bind_param(query, param);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| error!("Database query failed: {}", e))?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            // No rows to read names from; ask the server for the result shape.
            None => match (&self.pool).describe(&built.sql).await {
                Ok(describe) => describe.columns().iter().map(|c| c.name().to_string()).collect(),
                Err(_) => Vec::new(),
            },
        };

        let mut table = TableData::new(columns);
        for row in &rows {
            let values = (0..table.columns.len())
                .map(|idx| mysql_cell_to_value(row, idx))
                .collect();
            table.push_row(values);
        }

        Ok(table)
    }
}

#[async_trait]
impl RowFetcher for MySqlFetcher {
    async fn fetch(&self, source: &SourceQuery) -> RefreshResult<TableData> {
        let table = self.source_data(source, Local::now().date_naive()).await?;
        info!("Fetched {} rows from {}", table.len(), source.table);
        Ok(table)
    }
}

fn param_as_text(param: &SqlParam) -> String {
    match param {
        SqlParam::Text(s) => s.clone(),
        SqlParam::Int(i) => i.to_string(),
        SqlParam::Float(f) => f.to_string(),
        SqlParam::Date(d) => d.to_string(),
        SqlParam::DateTime(dt) => dt.to_string(),
    }
}

fn bind_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlParam,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlParam::Text(s) => query.bind(s.as_str()),
        SqlParam::Int(i) => query.bind(*i),
        SqlParam::Float(f) => query.bind(*f),
        SqlParam::Date(d) => query.bind(*d),
        SqlParam::DateTime(dt) => query.bind(*dt),
    }
}

fn decode<'r, T>(row: &'r MySqlRow, idx: usize) -> Option<T>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<T, _>(idx)
        .ok()
        .or_else(|| row.try_get_unchecked::<T, _>(idx).ok())
}

fn mysql_cell_to_value(row: &MySqlRow, idx: usize) -> CellValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return CellValue::Empty,
        Err(_) => return CellValue::Empty,
        Ok(_) => {}
    }

    let type_name = row
        .columns()
        .get(idx)
        .map(|c| c.type_info().name().to_ascii_uppercase())
        .unwrap_or_default();

    let decoded = match type_name.as_str() {
        "BOOLEAN" => decode::<bool>(row, idx).map(CellValue::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            decode::<i64>(row, idx).map(CellValue::Int)
        }
        name if name.ends_with("UNSIGNED") => decode::<u64>(row, idx).map(|v| match i64::try_from(v) {
            Ok(v) => CellValue::Int(v),
            Err(_) => CellValue::Number(v as f64),
        }),
        "FLOAT" | "DOUBLE" => decode::<f64>(row, idx)
            .or_else(|| decode::<f32>(row, idx).map(f64::from))
            .map(CellValue::Number),
        "DECIMAL" => decode::<String>(row, idx).map(|s| match s.parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(s),
        }),
        "DATE" => decode::<NaiveDate>(row, idx).map(CellValue::from),
        "DATETIME" | "TIMESTAMP" => decode::<NaiveDateTime>(row, idx).map(CellValue::from),
        "TIME" => decode::<NaiveTime>(row, idx).map(CellValue::from),
        _ => None,
    };

    decoded
        .or_else(|| decode::<String>(row, idx).map(CellValue::Text))
        .or_else(|| {
            decode::<Vec<u8>>(row, idx).map(|bytes| CellValue::Text(String::from_utf8_lossy(&bytes).into_owned()))
        })
        .unwrap_or(CellValue::Empty)
}
