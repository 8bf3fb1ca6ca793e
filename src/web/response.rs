//! 成功响应结构

use serde::{Deserialize, Serialize};

/// 只包含提示信息的响应
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn db_down() -> Self {
        Self {
            status: "DB DOWN".to_string(),
            timestamp: None,
        }
    }
}
