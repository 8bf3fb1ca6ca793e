//! 测试用内存驱动
//!
//! 模拟 `todos` 表，并支持注入错误、模拟数据库宕机，统计连接池的创建和关闭次数。

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use todo_api::app::todo::service::sql;
use todo_api::infrastructure::database::{
    ConnectionManager, Connector, DbError, DbErrorKind, ManagerOptions, Param, QueryOutput, Row,
    Statement,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPool {
    pub id: u64,
}

#[derive(Debug, Clone)]
struct StoredTodo {
    id: i64,
    title: String,
    description: String,
    completed: bool,
    created_at: String,
    updated_at: String,
}

impl StoredTodo {
    fn to_row(&self) -> Row {
        match json!({
            "id": self.id,
            "title": self.title,
            "description": self.description,
            // 与 MySQL 一样以 TINYINT 返回
            "completed": if self.completed { 1 } else { 0 },
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        }) {
            Value::Object(row) => row,
            _ => unreachable!(),
        }
    }
}

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: Vec<StoredTodo>,
}

#[derive(Default)]
pub struct MemoryConnector {
    table: Mutex<Table>,
    failures: Mutex<VecDeque<DbError>>,
    down: AtomicBool,
    hang_on_close: AtomicBool,
    latency: Mutex<Duration>,
    next_pool: AtomicU64,
    closed_pools: Mutex<HashSet<u64>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    liveness_queries: AtomicUsize,
    statements: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一次执行返回给定错误
    pub fn fail_next(&self, err: DbError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// 宕机期间所有语句都以连接重置失败
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// 关闭连接池时永远挂起（仍会记录关闭次数）
    pub fn hang_on_close(&self, hang: bool) {
        self.hang_on_close.store(hang, Ordering::SeqCst);
    }

    /// 每条语句执行前的等待时间
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn liveness_queries(&self) -> usize {
        self.liveness_queries.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    fn run(&self, stmt: &Statement) -> Result<QueryOutput, DbError> {
        let mut table = self.table.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();

        match stmt.sql.as_str() {
            Statement::LIVENESS_SQL => {
                let mut row = Row::new();
                row.insert("1".to_string(), json!(1));
                Ok(QueryOutput::from_rows(vec![row]))
            }
            sql::CREATE_TABLE => Ok(QueryOutput::default()),
            sql::LIST => {
                let mut rows: Vec<&StoredTodo> = table.rows.iter().collect();
                rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
                Ok(QueryOutput::from_rows(
                    rows.into_iter().map(StoredTodo::to_row).collect(),
                ))
            }
            sql::FIND => {
                let id = int_param(stmt, 0)?;
                Ok(QueryOutput::from_rows(
                    table
                        .rows
                        .iter()
                        .filter(|t| t.id == id)
                        .map(StoredTodo::to_row)
                        .collect(),
                ))
            }
            sql::INSERT => {
                table.next_id += 1;
                let todo = StoredTodo {
                    id: table.next_id,
                    title: text_param(stmt, 0)?,
                    description: text_param(stmt, 1)?,
                    completed: false,
                    created_at: now.clone(),
                    updated_at: now,
                };
                let id = todo.id as u64;
                table.rows.push(todo);
                Ok(QueryOutput::affected(1, Some(id)))
            }
            sql::UPDATE => {
                let title = text_param(stmt, 0)?;
                let description = text_param(stmt, 1)?;
                let completed = bool_param(stmt, 2)?;
                let id = int_param(stmt, 3)?;
                // 与 MySQL 一样只统计真正改变的行
                let changed = table
                    .rows
                    .iter_mut()
                    .filter(|t| t.id == id)
                    .filter(|t| {
                        t.title != title || t.description != description || t.completed != completed
                    })
                    .map(|t| {
                        t.title = title.clone();
                        t.description = description.clone();
                        t.completed = completed;
                        t.updated_at = now.clone();
                    })
                    .count();
                Ok(QueryOutput::affected(changed as u64, None))
            }
            sql::TOGGLE => {
                let id = int_param(stmt, 0)?;
                let changed = table
                    .rows
                    .iter_mut()
                    .filter(|t| t.id == id)
                    .map(|t| {
                        t.completed = !t.completed;
                        t.updated_at = now.clone();
                    })
                    .count();
                Ok(QueryOutput::affected(changed as u64, None))
            }
            sql::DELETE => {
                let id = int_param(stmt, 0)?;
                let before = table.rows.len();
                table.rows.retain(|t| t.id != id);
                Ok(QueryOutput::affected((before - table.rows.len()) as u64, None))
            }
            other => Err(DbError::new(
                DbErrorKind::Database,
                format!("You have an error in your SQL syntax near '{}'", other),
            )),
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Pool = MemoryPool;

    fn connect(&self) -> MemoryPool {
        self.connects.fetch_add(1, Ordering::SeqCst);
        MemoryPool {
            id: self.next_pool.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    async fn execute(&self, pool: &MemoryPool, stmt: &Statement) -> Result<QueryOutput, DbError> {
        if stmt.sql == Statement::LIVENESS_SQL {
            self.liveness_queries.fetch_add(1, Ordering::SeqCst);
        } else {
            self.statements.fetch_add(1, Ordering::SeqCst);
        }

        // 与真实驱动一样在网络往返处让出执行权
        let latency = *self.latency.lock().unwrap();
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }

        if self.closed_pools.lock().unwrap().contains(&pool.id) {
            return Err(DbError::new(DbErrorKind::PoolClosed, "attempted to acquire a connection on a closed pool"));
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(DbError::new(DbErrorKind::ConnectionReset, "Connection reset by peer"));
        }

        self.run(stmt)
    }

    async fn close(&self, pool: MemoryPool) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed_pools.lock().unwrap().insert(pool.id);
        if self.hang_on_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

fn param(stmt: &Statement, index: usize) -> Result<&Param, DbError> {
    stmt.params.get(index).ok_or_else(|| {
        DbError::new(
            DbErrorKind::Database,
            format!("missing parameter {} for '{}'", index, stmt.sql),
        )
    })
}

fn int_param(stmt: &Statement, index: usize) -> Result<i64, DbError> {
    match param(stmt, index)? {
        Param::Int(value) => Ok(*value),
        Param::UInt(value) => i64::try_from(*value)
            .map_err(|_| DbError::new(DbErrorKind::Database, format!("id {} out of range", value))),
        other => Err(DbError::new(DbErrorKind::Database, format!("expected integer, got {:?}", other))),
    }
}

fn text_param(stmt: &Statement, index: usize) -> Result<String, DbError> {
    match param(stmt, index)? {
        Param::Text(value) => Ok(value.clone()),
        other => Err(DbError::new(DbErrorKind::Database, format!("expected text, got {:?}", other))),
    }
}

fn bool_param(stmt: &Statement, index: usize) -> Result<bool, DbError> {
    match param(stmt, index)? {
        Param::Bool(value) => Ok(*value),
        other => Err(DbError::new(DbErrorKind::Database, format!("expected bool, got {:?}", other))),
    }
}

/// 测试用参数：极短的退避，探活任务基本不会触发
pub fn fast_options() -> ManagerOptions {
    ManagerOptions {
        retry_backoff: Duration::from_millis(1),
        probe_interval: Duration::from_secs(3600),
        close_grace: Duration::from_millis(100),
        ..ManagerOptions::default()
    }
}

pub fn manager() -> Arc<ConnectionManager<MemoryConnector>> {
    Arc::new(ConnectionManager::with_options(
        MemoryConnector::new(),
        fast_options(),
    ))
}

pub fn connection_reset() -> DbError {
    DbError::new(DbErrorKind::ConnectionReset, "read ECONNRESET")
}

pub fn syntax_error() -> DbError {
    DbError::new(DbErrorKind::Database, "You have an error in your SQL syntax")
}
