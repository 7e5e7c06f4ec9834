// SPDX-License-Identifier: Apache-2.0

//! SQLite Driver
//!
//! Implements the DataEngine trait for SQLite using SQLx.
//!
//! ## SQLite Specifics
//!
//! - File-based: `database` in TargetConfig is the file path; host/port are
//!   ignored (and SSH tunneling is meaningless for it)
//! - `:memory:` opens an in-memory database scoped to the execution

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::DataEngine;
use crate::engine::types::{ColumnInfo, QueryOutcome, Row as QRow, RowSet, TargetConfig, Value};

/// SQLite driver implementation.
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }

    fn build_connect_options(config: &TargetConfig) -> EngineResult<SqliteConnectOptions> {
        let url = if config.database == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", config.database)
        };

        SqliteConnectOptions::from_str(&url)
            .map(|opts| opts.create_if_missing(true))
            .map_err(|e| EngineError::connection_failed(e.to_string()))
    }

    fn convert_row(sqlite_row: &SqliteRow) -> QRow {
        let values: Vec<Value> = sqlite_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(sqlite_row, col.ordinal()))
            .collect();

        QRow { values }
    }

    fn extract_value(row: &SqliteRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(Value::Bytes).unwrap_or(Value::Null);
        }

        Value::Null
    }

    fn get_column_info(row: &SqliteRow) -> Vec<ColumnInfo> {
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
        if msg.contains("syntax") {
            EngineError::syntax_error(msg)
        } else {
            EngineError::execution_error(msg)
        }
    }

    async fn run_statement(pool: &SqlitePool, sql: &str) -> EngineResult<QueryOutcome> {
        if is_row_returning(sql) {
            let sqlite_rows: Vec<SqliteRow> = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(Self::map_error)?;

            if sqlite_rows.is_empty() {
                return Ok(QueryOutcome::Rows(RowSet {
                    columns: Vec::new(),
                    rows: Vec::new(),
                }));
            }

            let columns = Self::get_column_info(&sqlite_rows[0]);
            let rows: Vec<QRow> = sqlite_rows.iter().map(Self::convert_row).collect();

            Ok(QueryOutcome::Rows(RowSet { columns, rows }))
        } else {
            let result = sqlx::query(sql).execute(pool).await.map_err(Self::map_error)?;

            Ok(QueryOutcome::Affected {
                count: result.rows_affected(),
            })
        }
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn is_row_returning(sql: &str) -> bool {
    let trimmed = sql.trim_start().to_uppercase();
    ["SELECT", "PRAGMA", "EXPLAIN", "WITH", "VALUES"]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

#[async_trait]
impl DataEngine for SqliteDriver {
    fn driver_id(&self) -> &'static str {
        "sqlite"
    }

    fn driver_name(&self) -> &'static str {
        "SQLite"
    }

    async fn execute(&self, config: &TargetConfig, sql: &str) -> EngineResult<QueryOutcome> {
        let opts = Self::build_connect_options(config)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await
            .map_err(|e| EngineError::connection_failed(e.to_string()))?;

        let result = Self::run_statement(&pool, sql).await;
        pool.close().await;
        result
    }
}
