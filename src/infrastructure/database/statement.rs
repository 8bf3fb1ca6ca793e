//! SQL 语句与查询结果
//!
//! 连接管理器本身与表结构无关：它只接收带 `?` 占位符的 SQL 和按顺序绑定的参数，
//! 返回行数据（按列名组成的 JSON 对象）或受影响行数。

use serde_json::{Map, Value};

/// 一行查询结果，按列名索引
pub type Row = Map<String, Value>;

/// 绑定参数
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Text(String),
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<u64> for Param {
    fn from(value: u64) -> Self {
        Param::UInt(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Param::Null)
    }
}

/// 参数化 SQL 语句
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

impl Statement {
    /// 存活探测语句
    pub const LIVENESS_SQL: &'static str = "SELECT 1";

    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// 追加一个绑定参数
    pub fn bind(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn liveness() -> Self {
        Self::new(Self::LIVENESS_SQL)
    }

    /// 语句是否返回结果集（按首个关键字判断）
    pub fn returns_rows(&self) -> bool {
        let keyword = self
            .sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();
        ["SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH", "VALUES", "TABLE"]
            .iter()
            .any(|k| k.eq_ignore_ascii_case(keyword))
    }
}

/// 语句执行结果
///
/// 读语句填充 `rows`，写语句填充 `rows_affected` / `last_insert_id`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

impl QueryOutput {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn affected(rows_affected: u64, last_insert_id: Option<u64>) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
            last_insert_id,
        }
    }

    /// 取出第一行，丢弃其余
    pub fn into_first_row(self) -> Option<Row> {
        self.rows.into_iter().next()
    }
}
