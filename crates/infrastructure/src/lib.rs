//! 基础设施层实现。
//!
//! 提供应用层端口的进程内适配器：内存存储、静态认证、
//! 基于 tokio broadcast 的本地实时推送。语义对齐生产环境的
//! SQL 存储与推送网关适配器，供本地运行与集成测试使用。

pub mod auth;
pub mod memory;
pub mod realtime;

pub use auth::StaticAuthService;
pub use memory::{InMemoryChatStore, InMemoryMessageRepo, InMemoryThreadRepo, ProfileRecord};
pub use realtime::LocalRealtimeService;
