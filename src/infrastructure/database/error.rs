//! 数据库错误分类
//!
//! 驱动层错误在边界处被归入 [`DbErrorKind`]，重试逻辑只看分类结果。

use std::fmt;
use std::io;

use sqlx::mysql::MySqlDatabaseError;

/// 服务端报告连接已被终止的 MySQL 错误号
const MYSQL_CONNECTION_LOST_CODES: [u16; 5] = [
    1053, // ER_SERVER_SHUTDOWN
    1927, // ER_CONNECTION_KILLED
    2006, // CR_SERVER_GONE_ERROR
    2013, // CR_SERVER_LOST
    4031, // ER_CLIENT_INTERACTION_TIMEOUT
];

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    ConnectionLost,
    ConnectionReset,
    BrokenPipe,
    TimedOut,
    PoolClosed,
    WorkerCrashed,
    Protocol,
    Io,
    Database,
    Decode,
    Configuration,
    NotReady,
    Other,
}

impl DbErrorKind {
    /// 重建连接池后值得重试的连接类错误
    pub fn is_connectivity(self) -> bool {
        matches!(
            self,
            DbErrorKind::ConnectionLost
                | DbErrorKind::ConnectionReset
                | DbErrorKind::BrokenPipe
                | DbErrorKind::TimedOut
                | DbErrorKind::PoolClosed
                | DbErrorKind::WorkerCrashed
                | DbErrorKind::Protocol
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            DbErrorKind::ConnectionLost => "connection lost",
            DbErrorKind::ConnectionReset => "connection reset",
            DbErrorKind::BrokenPipe => "broken pipe",
            DbErrorKind::TimedOut => "timed out",
            DbErrorKind::PoolClosed => "pool closed",
            DbErrorKind::WorkerCrashed => "connection worker crashed",
            DbErrorKind::Protocol => "protocol error",
            DbErrorKind::Io => "io error",
            DbErrorKind::Database => "database error",
            DbErrorKind::Decode => "decode error",
            DbErrorKind::Configuration => "configuration error",
            DbErrorKind::NotReady => "database not ready",
            DbErrorKind::Other => "error",
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 数据库访问错误
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DbError {
    kind: DbErrorKind,
    message: String,
}

impl DbError {
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 就绪等待耗尽重试次数
    pub fn not_ready(attempts: u32) -> Self {
        Self::new(
            DbErrorKind::NotReady,
            format!("DB not ready after {} attempts", attempts),
        )
    }

    pub fn kind(&self) -> DbErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// 是否可以通过丢弃连接池并重试来恢复
    ///
    /// 驱动未给出类型化原因时，退回到 "closed state" 文本匹配。
    pub fn is_retryable(&self) -> bool {
        self.kind.is_connectivity() || self.message.to_lowercase().contains("closed state")
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let kind = classify(&err);
        Self::new(kind, err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(DbErrorKind::Decode, err.to_string())
    }
}

fn classify(err: &sqlx::Error) -> DbErrorKind {
    match err {
        sqlx::Error::Io(io_err) => classify_io(io_err.kind()),
        sqlx::Error::PoolClosed => DbErrorKind::PoolClosed,
        sqlx::Error::PoolTimedOut => DbErrorKind::TimedOut,
        sqlx::Error::WorkerCrashed => DbErrorKind::WorkerCrashed,
        sqlx::Error::Protocol(_) => DbErrorKind::Protocol,
        sqlx::Error::Database(db_err) => match db_err.try_downcast_ref::<MySqlDatabaseError>() {
            Some(mysql_err) if MYSQL_CONNECTION_LOST_CODES.contains(&mysql_err.number()) => {
                DbErrorKind::ConnectionLost
            }
            _ => DbErrorKind::Database,
        },
        sqlx::Error::RowNotFound
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_) => DbErrorKind::Decode,
        sqlx::Error::Configuration(_) | sqlx::Error::Tls(_) => DbErrorKind::Configuration,
        _ => DbErrorKind::Other,
    }
}

fn classify_io(kind: io::ErrorKind) -> DbErrorKind {
    match kind {
        io::ErrorKind::ConnectionReset => DbErrorKind::ConnectionReset,
        io::ErrorKind::BrokenPipe => DbErrorKind::BrokenPipe,
        io::ErrorKind::TimedOut => DbErrorKind::TimedOut,
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::NotConnected => DbErrorKind::ConnectionLost,
        _ => DbErrorKind::Io,
    }
}
