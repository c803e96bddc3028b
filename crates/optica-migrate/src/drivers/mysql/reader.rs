//! MySQL/MariaDB source reader implementation.
//!
//! Implements the `SourceReader` trait for reading whole tables from MySQL.
//! Uses SQLx for connection pooling and async query execution.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Row, ValueRef};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::{SourceReader, SourceRow, Value};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Column name and lowercased INFORMATION_SCHEMA data type.
#[derive(Debug, Clone)]
struct ColumnInfo {
    name: String,
    data_type: String,
}

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    pool: MySqlPool,
    database: String,
}

impl MysqlReader {
    /// Connect to the source and check the connection with a trivial query.
    pub async fn new(config: &SourceConfig, max_conns: usize) -> Result<Self> {
        let endpoint = config.endpoint();
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::connection(&endpoint, e))?;

        info!("Connected to MySQL source: {}", endpoint);

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Load columns for a table, in ordinal order.
    async fn load_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        // CAST to CHAR to handle collation differences where information_schema
        // may return VARBINARY instead of VARCHAR
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::source(table, e))?;

        Ok(rows
            .into_iter()
            .map(|row| ColumnInfo {
                name: row.get::<String, _>("COLUMN_NAME"),
                data_type: row.get::<String, _>("DATA_TYPE").to_lowercase(),
            })
            .collect())
    }

    /// The table's primary key column, when it is a single integer column.
    async fn load_primary_key(&self, table: &str, columns: &[ColumnInfo]) -> Result<Option<String>> {
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::source(table, e))?;

        let pk_columns: Vec<String> = rows.iter().map(|r| r.get("COLUMN_NAME")).collect();
        let [pk] = pk_columns.as_slice() else {
            return Ok(None);
        };
        let is_integer = columns
            .iter()
            .any(|c| &c.name == pk && Self::is_integer_type(&c.data_type));
        Ok(is_integer.then(|| pk.clone()))
    }

    /// Quote a MySQL identifier.
    fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn is_integer_type(data_type: &str) -> bool {
        matches!(
            data_type,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint"
        )
    }

    /// Read an integer of any width or signedness.
    fn read_int(row: &MySqlRow, idx: usize) -> Option<i64> {
        row.try_get::<i64, _>(idx)
            .ok()
            .or_else(|| row.try_get::<i32, _>(idx).ok().map(i64::from))
            .or_else(|| row.try_get::<i16, _>(idx).ok().map(i64::from))
            .or_else(|| row.try_get::<i8, _>(idx).ok().map(i64::from))
            .or_else(|| row.try_get::<u32, _>(idx).ok().map(i64::from))
            .or_else(|| row.try_get::<u16, _>(idx).ok().map(i64::from))
            .or_else(|| row.try_get::<u8, _>(idx).ok().map(i64::from))
            .or_else(|| {
                row.try_get::<u64, _>(idx)
                    .ok()
                    .and_then(|v| i64::try_from(v).ok())
            })
    }

    /// Convert one MySQL cell into a [`Value`].
    fn convert_value(row: &MySqlRow, idx: usize, data_type: &str) -> Value {
        // Handle NULL values
        let is_null: bool = row.try_get_raw(idx).map(|r| r.is_null()).unwrap_or(true);
        if is_null {
            return Value::Null;
        }

        let value = match data_type {
            // Integer types
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                Self::read_int(row, idx).map(Value::Int)
            }

            // Floating point
            "float" => row
                .try_get::<f32, _>(idx)
                .ok()
                .map(|v| Value::Float(f64::from(v))),
            "double" | "real" => row.try_get::<f64, _>(idx).ok().map(Value::Float),

            // Decimal
            "decimal" | "numeric" => row
                .try_get::<rust_decimal::Decimal, _>(idx)
                .ok()
                .map(Value::Decimal),

            // Boolean
            "bit" | "boolean" | "bool" => row.try_get::<bool, _>(idx).ok().map(Value::Bool),

            // Binary types
            "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => {
                row.try_get::<Vec<u8>, _>(idx).ok().map(Value::Bytes)
            }

            // Date/Time types
            "date" => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .ok()
                .map(Value::Date),
            "time" => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .ok()
                .map(Value::Time),
            "datetime" | "timestamp" => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .ok()
                .map(Value::DateTime),

            // String types, JSON and anything else
            _ => row.try_get::<String, _>(idx).ok().map(Value::Text),
        };

        value.unwrap_or_else(|| {
            debug!("Column {} ({}) could not be decoded, storing NULL", idx, data_type);
            Value::Null
        })
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::source("INFORMATION_SCHEMA.TABLES", e))?;

        let tables: Vec<String> = rows.iter().map(|r| r.get("TABLE_NAME")).collect();
        info!(
            "Found {} tables in MySQL database '{}'",
            tables.len(),
            self.database
        );
        Ok(tables)
    }

    async fn read_table(&self, table: &str) -> Result<Vec<SourceRow>> {
        let columns = self.load_columns(table).await?;
        if columns.is_empty() {
            return Err(MigrateError::source(table, "table does not exist"));
        }
        let primary_key = self.load_primary_key(table, &columns).await?;

        let col_list = columns
            .iter()
            .map(|c| Self::quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!("SELECT {} FROM {}", col_list, Self::quote_ident(table));

        let rows: Vec<MySqlRow> = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::source(table, e))?;

        let result: Vec<SourceRow> = rows
            .iter()
            .map(|row| {
                let fields: HashMap<String, Value> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| (col.name.clone(), Self::convert_value(row, i, &col.data_type)))
                    .collect();
                let key = primary_key
                    .as_deref()
                    .and_then(|pk| fields.get(pk))
                    .and_then(Value::as_i64);
                SourceRow::from_fields(table, key, fields)
            })
            .collect();

        debug!("{}: fetched {} rows", table, result.len());
        Ok(result)
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) AS cnt FROM {}", Self::quote_ident(table));

        let row: MySqlRow = sqlx::query(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::source(table, e))?;

        Ok(row.get::<i64, _>("cnt").max(0) as u64)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::source("SELECT 1", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
