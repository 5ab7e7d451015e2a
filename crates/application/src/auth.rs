//! 认证端口定义
//!
//! 会话查找由外部协作方实现，核心只消费解析结果。

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ChatResult;

/// 当前调用方的认证上下文
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user_id: Option<Uuid>,
    pub org_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
}

impl AuthContext {
    /// 上下文中是否不存在任何可用身份
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none() && self.contact_id.is_none()
    }
}

/// 认证服务端口
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn get_current(&self) -> ChatResult<AuthContext>;
}
