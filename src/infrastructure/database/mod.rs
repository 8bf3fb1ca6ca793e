//! 数据库基础设施
//!
//! - `statement`: 参数化语句与查询结果
//! - `error`: 错误分类
//! - `connector`: 驱动接缝与 MySQL 实现
//! - `manager`: 带重试和自动重建的连接管理器

pub mod connector;
pub mod error;
pub mod manager;
pub mod statement;

pub use connector::{Connector, MySqlConnector, CONNECT_TIMEOUT};
pub use error::{DbError, DbErrorKind};
pub use manager::{ConnectionManager, ManagerOptions, PoolHandle};
pub use statement::{Param, QueryOutput, Row, Statement};
