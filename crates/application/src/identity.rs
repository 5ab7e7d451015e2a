//! 调用者身份解析
//!
//! 每个会话级用例执行同一个检查：调用者要么以 user 身份参与会话，
//! 要么以 contact 身份参与会话。身份解析本身就是授权判定，
//! 解析结果同时决定后续操作的发送方/读者类型。

use domain::{ChatThread, ContactId, SenderType, UserId};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{ChatError, ChatResult};

/// 解析出的调用者身份（带标签的变体，下游统一消费）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerIdentity {
    User(UserId),
    Contact(ContactId),
    None,
}

impl CallerIdentity {
    /// 将认证上下文与会话参与者匹配。
    /// 优先匹配 user 身份，其次 contact 身份，都不匹配返回 None。
    pub fn resolve(thread: &ChatThread, auth: &AuthContext) -> Self {
        if let Some(user_id) = auth.user_id {
            let user_id = UserId::new(user_id);
            if thread.has_user_participant(user_id) {
                return Self::User(user_id);
            }
        }
        if let Some(contact_id) = auth.contact_id {
            let contact_id = ContactId::new(contact_id);
            if thread.has_contact_participant(contact_id) {
                return Self::Contact(contact_id);
            }
        }
        Self::None
    }

    /// 解析并授权：匹配不到参与者时，区分"上下文根本没有可用ID"
    /// （引导重新认证）与"有ID但不是参与者"（拒绝访问）。
    pub fn authorize(thread: &ChatThread, auth: &AuthContext) -> ChatResult<Self> {
        match Self::resolve(thread, auth) {
            Self::None if auth.is_anonymous() => Err(ChatError::MissingIdentity),
            Self::None => Err(ChatError::AccessDenied),
            identity => Ok(identity),
        }
    }

    /// 调用者的发送方/读者类型
    pub fn sender_type(&self) -> Option<SenderType> {
        match self {
            Self::User(_) => Some(SenderType::User),
            Self::Contact(_) => Some(SenderType::Contact),
            Self::None => None,
        }
    }

    /// 调用者的发送方/读者 ID
    pub fn sender_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some((*id).into()),
            Self::Contact(id) => Some((*id).into()),
            Self::None => None,
        }
    }

    /// 对端发送方类型（user ↔ contact）
    pub fn counterpart(&self) -> Option<SenderType> {
        self.sender_type().and_then(|t| t.counterpart())
    }
}
