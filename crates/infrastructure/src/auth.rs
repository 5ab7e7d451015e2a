//! 认证适配器
//!
//! 进程内持有一份可切换的认证上下文，对应真实部署里
//! 由网关注入的会话解析结果。

use tokio::sync::RwLock;

use application::auth::{AuthContext, AuthService};
use application::error::ChatResult;
use async_trait::async_trait;

/// 静态认证服务
pub struct StaticAuthService {
    context: RwLock<AuthContext>,
}

impl StaticAuthService {
    pub fn new(context: AuthContext) -> Self {
        Self {
            context: RwLock::new(context),
        }
    }

    /// 切换当前调用方身份
    pub async fn set(&self, context: AuthContext) {
        *self.context.write().await = context;
    }
}

#[async_trait]
impl AuthService for StaticAuthService {
    async fn get_current(&self) -> ChatResult<AuthContext> {
        Ok(self.context.read().await.clone())
    }
}
