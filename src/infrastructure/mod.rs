//! 基础设施层：数据库连接与日志

pub mod database;
pub mod logger;
