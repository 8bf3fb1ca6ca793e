//! 数据库驱动接缝
//!
//! [`Connector`] 抽象出连接管理器需要的三件事：创建连接池、在池上执行语句、关闭连接池。
//! 生产环境使用基于 sqlx 的 [`MySqlConnector`]。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow},
    Column, Row as _, TypeInfo,
};
use tracing::debug;

use super::error::DbError;
use super::statement::{Param, QueryOutput, Row, Statement};
use crate::config::DatabaseConfig;

/// 建立连接的超时时间
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// 数据库驱动
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// 可在请求之间共享的连接池句柄
    type Pool: Clone + Send + Sync + 'static;

    /// 创建连接池，不触发网络连接
    fn connect(&self) -> Self::Pool;

    /// 在连接池上执行一条语句
    async fn execute(&self, pool: &Self::Pool, stmt: &Statement) -> Result<QueryOutput, DbError>;

    /// 关闭连接池
    async fn close(&self, pool: Self::Pool);
}

/// 基于 sqlx 的 MySQL 驱动
pub struct MySqlConnector {
    options: MySqlConnectOptions,
    max_connections: u32,
}

impl MySqlConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);

        Self {
            options,
            max_connections: config.connection_limit,
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Pool = MySqlPool;

    fn connect(&self) -> MySqlPool {
        debug!(
            max_connections = self.max_connections,
            "Building MySQL connection pool"
        );

        // 超出上限的请求在 acquire_timeout 内排队等待空闲连接
        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(CONNECT_TIMEOUT)
            .test_before_acquire(true)
            .connect_lazy_with(self.options.clone())
    }

    async fn execute(&self, pool: &MySqlPool, stmt: &Statement) -> Result<QueryOutput, DbError> {
        let mut query = sqlx::query(&stmt.sql);
        for param in &stmt.params {
            query = match param {
                Param::Null => query.bind(None::<String>),
                Param::Bool(value) => query.bind(*value),
                Param::Int(value) => query.bind(*value),
                Param::UInt(value) => query.bind(*value),
                Param::Text(value) => query.bind(value.as_str()),
            };
        }

        if !stmt.returns_rows() {
            let done = query.execute(pool).await?;
            let last_insert_id = Some(done.last_insert_id()).filter(|id| *id != 0);
            return Ok(QueryOutput::affected(done.rows_affected(), last_insert_id));
        }

        let mut rows = Vec::new();
        let mut results = query.fetch(pool);
        while let Some(row) = results.try_next().await? {
            rows.push(decode_row(&row)?);
        }
        Ok(QueryOutput::from_rows(rows))
    }

    async fn close(&self, pool: MySqlPool) {
        pool.close().await;
    }
}

fn decode_row(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        decoded.insert(column.name().to_string(), value);
    }
    Ok(decoded)
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "NULL" => Value::Null,
        "BOOLEAN" => or_null(row.try_get::<Option<bool>, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            or_null(row.try_get::<Option<i64>, _>(index)?)
        }
        name if name.ends_with(" UNSIGNED") => or_null(row.try_get::<Option<u64>, _>(index)?),
        "FLOAT" => or_null(row.try_get::<Option<f32>, _>(index)?.map(f64::from)),
        "DOUBLE" => or_null(row.try_get::<Option<f64>, _>(index)?),
        "TIMESTAMP" | "DATETIME" => or_null(
            row.try_get::<Option<DateTime<Utc>>, _>(index)?
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
        "DATE" => or_null(
            row.try_get::<Option<NaiveDate>, _>(index)?
                .map(|date| date.to_string()),
        ),
        "JSON" => row
            .try_get::<Option<Value>, _>(index)?
            .unwrap_or(Value::Null),
        _ => decode_text(row, index)?,
    };
    Ok(value)
}

/// 文本类列（含 DECIMAL 等未单独处理的类型），非 UTF-8 内容按有损方式转换
fn decode_text(row: &MySqlRow, index: usize) -> Result<Value, sqlx::Error> {
    match row.try_get_unchecked::<Option<String>, _>(index) {
        Ok(text) => Ok(or_null(text)),
        Err(_) => {
            let bytes = row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?;
            Ok(or_null(
                bytes.map(|b| String::from_utf8_lossy(&b).into_owned()),
            ))
        }
    }
}

fn or_null<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}
