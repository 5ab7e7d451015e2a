//! 统一配置中心
//!
//! 提供消息子系统的全局配置，包括：
//! - 分页默认值与上限
//! - 实时频道命名与广播容量

use serde::{Deserialize, Serialize};
use std::env;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// 分页配置
    pub pagination: PaginationConfig,
    /// 实时推送配置
    pub realtime: RealtimeConfig,
}

/// 分页配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// 未指定时的每页条数
    pub page_size_default: u32,
    /// 每页条数上限
    pub page_size_max: u32,
}

/// 实时推送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// 会话频道名前缀，频道名为 {prefix}{thread_id}
    pub channel_prefix: String,
    /// 每个频道的广播缓冲容量
    pub broadcast_capacity: usize,
}

impl ChatConfig {
    /// 从环境变量加载配置，所有项都有安全默认值
    pub fn from_env() -> Self {
        Self {
            pagination: PaginationConfig {
                page_size_default: env::var("CHAT_PAGE_SIZE_DEFAULT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
                page_size_max: env::var("CHAT_PAGE_SIZE_MAX")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            },
            realtime: RealtimeConfig {
                channel_prefix: env::var("CHAT_CHANNEL_PREFIX")
                    .unwrap_or_else(|_| "hilo:".to_string()),
                broadcast_capacity: env::var("CHAT_BROADCAST_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(256),
            },
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig {
                page_size_default: 20,
                page_size_max: 100,
            },
            realtime: RealtimeConfig {
                channel_prefix: "hilo:".to_string(),
                broadcast_capacity: 256,
            },
        }
    }
}
