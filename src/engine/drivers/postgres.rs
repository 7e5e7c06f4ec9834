//! PostgreSQL Driver
//!
//! Implements the DataEngine trait for PostgreSQL using SQLx, one connection
//! per execution.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};

use crate::engine::drivers::encode_credential;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::DataEngine;
use crate::engine::types::{ColumnInfo, QueryOutcome, Row as QRow, RowSet, TargetConfig, Value};

/// PostgreSQL driver implementation.
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }

    fn build_connection_string(config: &TargetConfig) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            encode_credential(&config.username),
            encode_credential(config.password.expose()),
            config.host,
            config.port,
            config.database,
        )
    }

    fn convert_row(pg_row: &PgRow) -> QRow {
        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(pg_row, col.ordinal()))
            .collect();

        QRow { values }
    }

    /// Extracts a value at the given index. `try_get::<Option<T>>` handles
    /// NULLs; the chain walks the common wire types in decreasing width.
    fn extract_value(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return v.map(|f| Value::Float(f as f64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(idx) {
            return v.map(|d| Value::Text(d.to_string())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
            return v.map(|dt| Value::Text(dt.to_rfc3339())).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return v
                .map(|dt| Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(idx) {
            return v
                .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
            return v.map(Value::Json).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }

        Value::Null
    }

    fn get_column_info(row: &PgRow) -> Vec<ColumnInfo> {
        row.columns()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                data_type: col.type_info().name().to_string(),
                nullable: true,
            })
            .collect()
    }

    fn map_error(e: sqlx::Error) -> EngineError {
        let msg = e.to_string();
        if msg.contains("password authentication failed") {
            EngineError::auth_failed(msg)
        } else if msg.contains("syntax") {
            EngineError::syntax_error(msg)
        } else {
            EngineError::execution_error(msg)
        }
    }

    async fn run_statement(pool: &PgPool, sql: &str) -> EngineResult<QueryOutcome> {
        if is_row_returning(sql) {
            let pg_rows: Vec<PgRow> = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(Self::map_error)?;

            if pg_rows.is_empty() {
                return Ok(QueryOutcome::Rows(RowSet {
                    columns: Vec::new(),
                    rows: Vec::new(),
                }));
            }

            let columns = Self::get_column_info(&pg_rows[0]);
            let rows: Vec<QRow> = pg_rows.iter().map(Self::convert_row).collect();

            Ok(QueryOutcome::Rows(RowSet { columns, rows }))
        } else {
            let result = sqlx::query(sql).execute(pool).await.map_err(Self::map_error)?;

            Ok(QueryOutcome::Affected {
                count: result.rows_affected(),
            })
        }
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn is_row_returning(sql: &str) -> bool {
    let trimmed = sql.trim_start().to_uppercase();
    ["SELECT", "SHOW", "EXPLAIN", "WITH", "VALUES", "TABLE"]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

#[async_trait]
impl DataEngine for PostgresDriver {
    fn driver_id(&self) -> &'static str {
        "postgres"
    }

    fn driver_name(&self) -> &'static str {
        "PostgreSQL"
    }

    async fn execute(&self, config: &TargetConfig, sql: &str) -> EngineResult<QueryOutcome> {
        let conn_str = Self::build_connection_string(config);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&conn_str)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("password authentication failed") {
                    EngineError::auth_failed(msg)
                } else {
                    EngineError::connection_failed(msg)
                }
            })?;

        let result = Self::run_statement(&pool, sql).await;
        pool.close().await;
        result
    }
}
