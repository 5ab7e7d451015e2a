//! 消息实体定义
//!
//! 消息按会话追加写入，除送达/已读时间戳外不可变更。
//! 状态（sent/delivered/read）由时间戳推导，不单独存储。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{MessageBody, MessageId, ThreadId};

/// 发送方类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    /// 平台账号
    User,
    /// 外部联系人
    Contact,
    /// 系统消息
    System,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Contact => "contact",
            Self::System => "system",
        }
    }

    /// 对端发送方类型：user 与 contact 互为对端，system 无对端
    pub fn counterpart(&self) -> Option<SenderType> {
        match self {
            Self::User => Some(Self::Contact),
            Self::Contact => Some(Self::User),
            Self::System => None,
        }
    }
}

/// 推导出的消息状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// 已发送
    Sent,
    /// 已送达
    Delivered,
    /// 已读
    Read,
}

/// 消息快照，用于持久化边界的往返转换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageSnapshot {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_type: SenderType,
    pub sender_id: Uuid,
    pub body: String,
    pub payload: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

/// 消息实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// 消息唯一ID
    pub id: MessageId,
    /// 所属会话ID（反向引用，不持有会话）
    pub thread_id: ThreadId,
    /// 发送方类型
    pub sender_type: SenderType,
    /// 发送方ID
    pub sender_id: Uuid,
    /// 消息正文
    pub body: MessageBody,
    /// 结构化附件负载（对领域层不透明）
    pub payload: Option<JsonValue>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    // 送达/已读时间戳只能通过 mark_delivered / mark_read 单调推进
    delivered_at: Option<DateTime<Utc>>,
    read_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// 创建新消息
    pub fn new(
        id: MessageId,
        thread_id: ThreadId,
        sender_type: SenderType,
        sender_id: Uuid,
        body: MessageBody,
        payload: Option<JsonValue>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            thread_id,
            sender_type,
            sender_id,
            body,
            payload,
            created_at,
            delivered_at: None,
            read_at: None,
        }
    }

    /// 推导消息状态
    pub fn status(&self) -> MessageStatus {
        if self.read_at.is_some() {
            MessageStatus::Read
        } else if self.delivered_at.is_some() {
            MessageStatus::Delivered
        } else {
            MessageStatus::Sent
        }
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn read_at(&self) -> Option<DateTime<Utc>> {
        self.read_at
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }

    /// 标记为已送达。重复调用是空操作。
    pub fn mark_delivered(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.delivered_at.is_some() {
            return Ok(());
        }
        if at < self.created_at {
            return Err(DomainError::invariant_violation(
                "送达时间不能早于创建时间",
            ));
        }
        self.delivered_at = Some(at);
        Ok(())
    }

    /// 标记为已读。重复调用是空操作；若尚未送达则同时回填送达时间。
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.read_at.is_some() {
            return Ok(());
        }
        if at < self.created_at {
            return Err(DomainError::invariant_violation(
                "已读时间不能早于创建时间",
            ));
        }
        if self.delivered_at.is_none() {
            self.delivered_at = Some(at);
        }
        self.read_at = Some(at);
        Ok(())
    }

    /// 导出快照
    pub fn to_snapshot(&self) -> ChatMessageSnapshot {
        ChatMessageSnapshot {
            id: self.id.into(),
            thread_id: self.thread_id.into(),
            sender_type: self.sender_type,
            sender_id: self.sender_id,
            body: self.body.as_str().to_owned(),
            payload: self.payload.clone(),
            created_at: self.created_at,
            delivered_at: self.delivered_at,
            read_at: self.read_at,
        }
    }

    /// 从快照恢复，重新校验全部不变量
    pub fn restore(snapshot: ChatMessageSnapshot) -> DomainResult<Self> {
        let body = MessageBody::new(snapshot.body)?;

        if let Some(delivered_at) = snapshot.delivered_at {
            if delivered_at < snapshot.created_at {
                return Err(DomainError::invariant_violation(
                    "送达时间不能早于创建时间",
                ));
            }
        }
        if let Some(read_at) = snapshot.read_at {
            if read_at < snapshot.created_at {
                return Err(DomainError::invariant_violation(
                    "已读时间不能早于创建时间",
                ));
            }
            if snapshot.delivered_at.is_none() {
                return Err(DomainError::invariant_violation(
                    "已读消息必须先有送达时间",
                ));
            }
        }

        Ok(Self {
            id: MessageId::from(snapshot.id),
            thread_id: ThreadId::from(snapshot.thread_id),
            sender_type: snapshot.sender_type,
            sender_id: snapshot.sender_id,
            body,
            payload: snapshot.payload,
            created_at: snapshot.created_at,
            delivered_at: snapshot.delivered_at,
            read_at: snapshot.read_at,
        })
    }
}
