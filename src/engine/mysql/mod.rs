//! MySQL Pool Implementation
//!
//! This module implements [`PoolConnector`] and [`ConnectionPool`] for MySQL
//! (including MariaDB) on top of `mysql_async`'s built-in pool.
//!
//! # Implementation Notes
//! - Pools are capped at `PoolSettings::max_connections`, with no idle minimum
//! - Establishment acquires one connection so bad credentials fail at connect time
//! - Statements run over the text protocol; values are typed from column metadata
//! - BLOB data that is not valid UTF-8 is Base64-encoded for JSON safety
//! - No acquisition or statement timeout is applied

use async_trait::async_trait;
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::{
    prelude::*, Column, Conn, OptsBuilder, Pool, PoolConstraints, PoolOpts, Row, Value,
};
use std::sync::Arc;

use crate::config::PoolSettings;
use crate::engine::{ConnectionPool, PoolConnector, QueryOutcome, ResolvedConnection};
use crate::error::{QueryGateError, Result};

/// Creates `mysql_async` pools for resolved targets
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    max_connections: usize,
}

impl MySqlConnector {
    #[must_use]
    pub const fn new(settings: &PoolSettings) -> Self {
        Self {
            max_connections: settings.max_connections,
        }
    }
}

#[async_trait]
impl PoolConnector for MySqlConnector {
    async fn establish(&self, target: &ResolvedConnection) -> Result<Arc<dyn ConnectionPool>> {
        let opts = build_mysql_opts(target, self.max_connections)?;
        let pool = Pool::new(opts);

        // The pool is lazy; acquire once so unreachable hosts and bad credentials fail here
        match pool.get_conn().await {
            Ok(conn) => drop(conn),
            Err(e) => {
                let _ = pool.disconnect().await;
                return Err(QueryGateError::connection(format!(
                    "Failed to connect to MySQL at {}:{}: {e}",
                    target.host, target.port
                )));
            }
        }

        Ok(Arc::new(MySqlPool {
            pool,
            max_connections: self.max_connections,
        }))
    }

    async fn verify(&self, target: &ResolvedConnection) -> Result<()> {
        let opts = build_mysql_opts(target, 1)?;

        let conn = Conn::new(opts).await.map_err(|e| {
            QueryGateError::connection(format!(
                "Failed to connect to MySQL at {}:{}: {e}",
                target.host, target.port
            ))
        })?;

        conn.disconnect()
            .await
            .map_err(|e| QueryGateError::connection(format!("Failed to disconnect: {e}")))
    }
}

/// A live `mysql_async` pool for one identity
pub struct MySqlPool {
    pool: Pool,
    max_connections: usize,
}

#[async_trait]
impl ConnectionPool for MySqlPool {
    async fn execute(&self, statement: &str) -> Result<QueryOutcome> {
        // Waits in the pool's wait list when all connections are busy
        let mut conn = self.pool.get_conn().await.map_err(|e| {
            QueryGateError::query_execution(format!("Failed to acquire connection: {e}"))
        })?;

        execute_statement(&mut conn, statement).await
    }

    fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// Build MySQL connection options from a resolved target
fn build_mysql_opts(target: &ResolvedConnection, max_connections: usize) -> Result<OptsBuilder> {
    let constraints = PoolConstraints::new(0, max_connections)
        .filter(|_| max_connections > 0)
        .ok_or_else(|| QueryGateError::config(format!("Invalid pool size {max_connections}")))?;

    let opts = OptsBuilder::default()
        .ip_or_hostname(target.host.as_str())
        .tcp_port(target.port)
        .user(Some(target.user.as_str()))
        .pass(Some(target.password.as_str()))
        .db_name(target.database.as_deref())
        .pool_opts(PoolOpts::default().with_constraints(constraints));

    Ok(opts)
}

/// Execute one statement and shape the outcome
async fn execute_statement(conn: &mut Conn, statement: &str) -> Result<QueryOutcome> {
    let mut result = conn
        .query_iter(statement)
        .await
        .map_err(|e| QueryGateError::query_execution(e.to_string()))?;

    // SELECT/SHOW/DESCRIBE carry column metadata even when zero rows match
    if result.columns_ref().is_empty() {
        let affected_rows = result.affected_rows();
        let insert_id = result.last_insert_id().filter(|id| *id != 0);
        result.drop_result().await.map_err(|e| QueryGateError::query_execution(e.to_string()))?;

        return Ok(QueryOutcome::Ack {
            affected_rows,
            insert_id,
        });
    }

    let rows: Vec<Row> =
        result.collect().await.map_err(|e| QueryGateError::query_execution(e.to_string()))?;
    result.drop_result().await.map_err(|e| QueryGateError::query_execution(e.to_string()))?;

    let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;
    Ok(QueryOutcome::Rows(rows))
}

/// Convert a MySQL row to a JSON object keyed by column name
fn row_to_json(row: &Row) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();

    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value = row.as_ref(idx).ok_or_else(|| {
            QueryGateError::query_execution(format!("Failed to get value at index {idx}"))
        })?;
        map.insert(column.name_str().to_string(), mysql_value_to_json(value, column));
    }

    Ok(map)
}

/// Convert MySQL value to JSON value
fn mysql_value_to_json(value: &Value, column: &Column) -> serde_json::Value {
    match value {
        Value::NULL => serde_json::Value::Null,

        // Text protocol delivers everything as bytes
        Value::Bytes(bytes) => text_to_json(bytes, column.column_type(), column.flags()),

        Value::Int(i) => serde_json::Value::Number((*i).into()),

        Value::UInt(u) => serde_json::json!(*u),

        Value::Float(f) => float_to_json(f64::from(*f)),

        Value::Double(d) => float_to_json(*d),

        Value::Date(year, month, day, hour, minute, second, micro) => {
            serde_json::Value::String(format!(
                "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micro:06}"
            ))
        }

        Value::Time(is_negative, days, hours, minutes, seconds, microseconds) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            serde_json::Value::String(format!(
                "{sign}{total_hours}:{minutes:02}:{seconds:02}.{microseconds:06}"
            ))
        }
    }
}

/// Type a text-protocol value using the column metadata
fn text_to_json(bytes: &[u8], column_type: ColumnType, flags: ColumnFlags) -> serde_json::Value {
    let Ok(text) = std::str::from_utf8(bytes) else {
        use base64::Engine;
        return serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes));
    };

    match column_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => {
            let parsed = if flags.contains(ColumnFlags::UNSIGNED_FLAG) {
                text.parse::<u64>().ok().map(serde_json::Value::from)
            } else {
                text.parse::<i64>().ok().map(serde_json::Value::from)
            };
            parsed.unwrap_or_else(|| serde_json::Value::String(text.to_string()))
        }

        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => text
            .parse::<f64>()
            .map_or_else(|_| serde_json::Value::String(text.to_string()), float_to_json),

        ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(text)
            .unwrap_or_else(|_| serde_json::Value::String(text.to_string())),

        // DECIMAL stays a string to avoid precision loss
        _ => serde_json::Value::String(text.to_string()),
    }
}

/// NaN/Infinity become null
fn float_to_json(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ResolvedConnection {
        ResolvedConnection {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: "password".to_string(),
            database: Some("test".to_string()),
        }
    }

    #[test]
    fn test_text_integer_columns_become_numbers() {
        let v = text_to_json(b"1", ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty());
        assert_eq!(v, serde_json::json!(1));

        let v = text_to_json(b"-42", ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty());
        assert_eq!(v, serde_json::json!(-42));

        let v = text_to_json(
            b"18446744073709551615",
            ColumnType::MYSQL_TYPE_LONGLONG,
            ColumnFlags::UNSIGNED_FLAG,
        );
        assert_eq!(v, serde_json::json!(u64::MAX));
    }

    #[test]
    fn test_text_float_and_decimal() {
        let v = text_to_json(b"2.5", ColumnType::MYSQL_TYPE_DOUBLE, ColumnFlags::empty());
        assert_eq!(v, serde_json::json!(2.5));

        let v = text_to_json(b"19.99", ColumnType::MYSQL_TYPE_NEWDECIMAL, ColumnFlags::empty());
        assert_eq!(v, serde_json::json!("19.99"));
    }

    #[test]
    fn test_text_json_and_strings() {
        let v = text_to_json(br#"{"a":1}"#, ColumnType::MYSQL_TYPE_JSON, ColumnFlags::empty());
        assert_eq!(v, serde_json::json!({"a": 1}));

        let v = text_to_json(b"alice", ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty());
        assert_eq!(v, serde_json::json!("alice"));
    }

    #[test]
    fn test_binary_bytes_are_base64() {
        let v = text_to_json(
            &[0xff, 0xfe, 0x00],
            ColumnType::MYSQL_TYPE_BLOB,
            ColumnFlags::empty(),
        );
        assert_eq!(v, serde_json::json!("//4A"));
    }

    #[test]
    fn test_float_to_json_handles_nan() {
        assert_eq!(float_to_json(f64::NAN), serde_json::Value::Null);
        assert_eq!(float_to_json(1.5), serde_json::json!(1.5));
    }

    #[test]
    fn test_build_opts_rejects_zero_pool_size() {
        let err = build_mysql_opts(&target(), 0).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(build_mysql_opts(&target(), 10).is_ok());
    }

    // Live tests require a running MySQL instance:
    // cargo test -- --ignored

    #[tokio::test]
    #[ignore] // Requires running MySQL instance
    async fn test_establish_and_select_one() {
        let connector = MySqlConnector::new(&PoolSettings::default());
        let pool = connector.establish(&target()).await.expect("establish");

        let outcome = pool.execute("SELECT 1").await.expect("select");
        assert_eq!(serde_json::to_value(&outcome).unwrap(), serde_json::json!([{"1": 1}]));

        // A bad statement must not poison the pool
        assert!(pool.execute("SELEC 1").await.is_err());
        assert!(pool.execute("SELECT 1").await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires running MySQL instance
    async fn test_establish_rejects_bad_password() {
        let connector = MySqlConnector::new(&PoolSettings::default());
        let mut bad = target();
        bad.password = "definitely-wrong".to_string();

        let err = connector.establish(&bad).await.err().expect("should fail");
        assert_eq!(err.error_code(), "CONNECTION_ERROR");
    }
}
