//! 待办事项业务服务
//!
//! 每个操作对应一到两条参数化 SQL，通过连接管理器执行。

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::model::{Todo, TodoDraft};
use crate::infrastructure::database::{
    ConnectionManager, Connector, DbError, DbErrorKind, Row, Statement,
};

/// 服务使用的 SQL 语句
pub mod sql {
    pub const CREATE_TABLE: &str = r#"
        CREATE TABLE IF NOT EXISTS todos (
            id INT AUTO_INCREMENT PRIMARY KEY,
            title VARCHAR(255) NOT NULL,
            description TEXT,
            completed BOOLEAN DEFAULT FALSE,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
        )
    "#;
    pub const LIST: &str = "SELECT * FROM todos ORDER BY created_at DESC, id DESC";
    pub const FIND: &str = "SELECT * FROM todos WHERE id = ?";
    pub const INSERT: &str = "INSERT INTO todos (title, description) VALUES (?, ?)";
    pub const UPDATE: &str =
        "UPDATE todos SET title = ?, description = ?, completed = ? WHERE id = ?";
    pub const TOGGLE: &str = "UPDATE todos SET completed = NOT completed WHERE id = ?";
    pub const DELETE: &str = "DELETE FROM todos WHERE id = ?";
}

pub struct TodoService<C: Connector> {
    db: Arc<ConnectionManager<C>>,
}

impl<C: Connector> Clone for TodoService<C> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl<C: Connector> TodoService<C> {
    pub fn new(db: Arc<ConnectionManager<C>>) -> Self {
        Self { db }
    }

    /// 建表（已存在时不做任何事）
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        self.db.query(&Statement::new(sql::CREATE_TABLE)).await?;
        info!("Table 'todos' verified");
        Ok(())
    }

    /// 按创建时间倒序列出全部待办事项
    pub async fn list(&self) -> Result<Vec<Todo>, DbError> {
        let output = self.db.query(&Statement::new(sql::LIST)).await?;
        output.rows.into_iter().map(to_todo).collect()
    }

    pub async fn find(&self, id: i64) -> Result<Option<Todo>, DbError> {
        let output = self.db.query(&Statement::new(sql::FIND).bind(id)).await?;
        output.into_first_row().map(to_todo).transpose()
    }

    /// 插入后按自增 id 回查
    pub async fn create(&self, draft: &TodoDraft) -> Result<Todo, DbError> {
        let stmt = Statement::new(sql::INSERT)
            .bind(draft.title.as_str())
            .bind(draft.description.as_str());
        let output = self.db.query(&stmt).await?;

        let id = output.last_insert_id.ok_or_else(|| {
            DbError::new(DbErrorKind::Other, "insert did not report a generated id")
        })?;
        info!(id, "Created todo");

        let id = i64::try_from(id).map_err(|_| {
            DbError::new(
                DbErrorKind::Other,
                format!("generated id {} does not fit a signed id", id),
            )
        })?;
        self.find(id).await?.ok_or_else(|| {
            DbError::new(
                DbErrorKind::Other,
                format!("todo {} vanished right after insert", id),
            )
        })
    }

    /// 更新全部可写字段；记录不存在时返回 `None`
    pub async fn update(&self, id: i64, draft: &TodoDraft) -> Result<Option<Todo>, DbError> {
        let stmt = Statement::new(sql::UPDATE)
            .bind(draft.title.as_str())
            .bind(draft.description.as_str())
            .bind(draft.completed)
            .bind(id);
        self.db.query(&stmt).await?;

        // MySQL 报告的是实际改变的行数而不是匹配的行数，值未变时为 0，
        // 因此是否存在以回查结果为准
        self.find(id).await
    }

    /// 翻转完成状态；记录不存在时返回 `None`
    pub async fn toggle(&self, id: i64) -> Result<Option<Todo>, DbError> {
        let output = self.db.query(&Statement::new(sql::TOGGLE).bind(id)).await?;
        if output.rows_affected == 0 {
            return Ok(None);
        }
        self.find(id).await
    }

    /// 删除记录，返回是否确实删除了一行
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let output = self.db.query(&Statement::new(sql::DELETE).bind(id)).await?;
        let deleted = output.rows_affected > 0;
        if deleted {
            info!(id, "Deleted todo");
        }
        Ok(deleted)
    }
}

fn to_todo(row: Row) -> Result<Todo, DbError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
