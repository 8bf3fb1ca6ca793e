//! # 待办事项 REST API
//!
//! 基于 Axum + SQLx (MySQL) 的 CRUD 服务。
//!
//! - `app`: 路由和处理器
//! - `web`: 错误处理、响应结构、中间件
//! - `infrastructure`: 带自动重连的数据库连接管理器、日志
//! - `config`: 环境变量配置

pub mod app;
pub mod config;
pub mod infrastructure;
pub mod web;

pub use app::{build_router, AppState, RouterOptions};
pub use config::{AppConfig, ConfigError};
pub use infrastructure::database::{ConnectionManager, DbError, DbErrorKind, MySqlConnector};
