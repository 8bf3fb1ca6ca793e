//! 应用配置
//!
//! 所有配置都来自环境变量，每一项都有适合本地 / 容器开发的默认值。
//! 启动时会先加载当前目录下的 `.env`（如果存在）。

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 启动时等待数据库就绪的配置
    pub readiness: ReadinessConfig,
    /// 日志级别 (trace, debug, info, warn, error)
    pub log_level: String,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub port: u16,
    /// 连接池最大连接数
    pub connection_limit: u32,
    /// 启动时是否跳过建表
    pub skip_schema: bool,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听端口
    pub port: u16,
    /// 绑定地址
    pub bind_address: String,
    /// 静态文件目录
    pub static_dir: String,
    /// 请求超时时间（秒）
    pub timeout_seconds: u64,
}

/// 就绪等待配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// 最大尝试次数
    pub retries: u32,
    /// 两次尝试之间的间隔（毫秒）
    pub delay_ms: u64,
}

impl ReadinessConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            readiness: ReadinessConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "mysql-db".to_string(),
            user: "root".to_string(),
            password: "rootpassword".to_string(),
            name: "todoapp".to_string(),
            port: 3306,
            connection_limit: 10,
            skip_schema: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            static_dir: "public".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            retries: 24,
            delay_ms: 5_000,
        }
    }
}

impl AppConfig {
    /// 从进程环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        // .env 不存在时忽略
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置，缺失的键使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let db = &mut config.database;

        if let Some(host) = lookup("DB_HOST") {
            db.host = host;
        }
        if let Some(user) = lookup("DB_USER") {
            db.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            db.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            db.name = name;
        }
        if let Some(port) = lookup("DB_PORT") {
            db.port = parse("DB_PORT", &port)?;
        }
        if let Some(limit) = lookup("DB_CONN_LIMIT") {
            db.connection_limit = parse("DB_CONN_LIMIT", &limit)?;
        }
        if let Some(skip) = lookup("DB_SKIP_SCHEMA") {
            db.skip_schema = parse("DB_SKIP_SCHEMA", &skip)?;
        }

        if let Some(port) = lookup("PORT") {
            config.server.port = parse("PORT", &port)?;
        }
        if let Some(addr) = lookup("BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            config.server.static_dir = dir;
        }

        if let Some(timeout) = lookup("REQUEST_TIMEOUT_SECS") {
            config.server.timeout_seconds = parse("REQUEST_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(retries) = lookup("DB_READY_RETRIES") {
            config.readiness.retries = parse("DB_READY_RETRIES", &retries)?;
        }
        if let Some(delay) = lookup("DB_READY_DELAY_MS") {
            config.readiness.delay_ms = parse("DB_READY_DELAY_MS", &delay)?;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.host.is_empty() {
            return Err(ConfigError::Validation("DB_HOST must not be empty".to_string()));
        }
        if self.database.name.is_empty() {
            return Err(ConfigError::Validation("DB_NAME must not be empty".to_string()));
        }
        if self.database.connection_limit == 0 {
            return Err(ConfigError::Validation(
                "DB_CONN_LIMIT must be greater than 0".to_string(),
            ));
        }
        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.readiness.retries == 0 {
            return Err(ConfigError::Validation(
                "DB_READY_RETRIES must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "invalid log level: {}, expected one of {:?}",
                self.log_level, valid_levels
            )));
        }

        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Parse {
        key,
        value: raw.to_string(),
    })
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Parse { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database.host, "mysql-db");
        assert_eq!(config.database.user, "root");
        assert_eq!(config.database.name, "todoapp");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.connection_limit, 10);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.readiness.retries, 24);
        assert_eq!(config.readiness.delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides() {
        let config = load(&[
            ("DB_HOST", "localhost"),
            ("DB_PORT", "3307"),
            ("DB_CONN_LIMIT", "4"),
            ("PORT", "8080"),
            ("LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();

        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.connection_limit, 4);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_unparsable_number_is_rejected() {
        let err = load(&[("DB_PORT", "mysql")]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { key: "DB_PORT", .. }));
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            load(&[("DB_CONN_LIMIT", "0")]),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            load(&[("LOG_LEVEL", "verbose")]),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            load(&[("REQUEST_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_schema_and_readiness_flags() {
        let config = load(&[
            ("DB_SKIP_SCHEMA", "true"),
            ("DB_READY_RETRIES", "3"),
            ("DB_READY_DELAY_MS", "250"),
            ("REQUEST_TIMEOUT_SECS", "10"),
        ])
        .unwrap();

        assert!(config.database.skip_schema);
        assert_eq!(config.readiness.retries, 3);
        assert_eq!(config.readiness.delay(), Duration::from_millis(250));
        assert_eq!(config.server.timeout_seconds, 10);
    }
}
