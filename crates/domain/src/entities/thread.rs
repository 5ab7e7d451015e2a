//! 会话实体定义
//!
//! 会话锚定在一个房源上，每个（房源, 发起用户）对最多创建一次，
//! 只归档不删除。参与者集合由会话独占，按 ID 去重。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::message::ChatMessage;
use crate::entities::participant::{Participant, ParticipantKind};
use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ContactId, OrgId, PropertyId, ThreadId, UserId};

/// 会话状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    /// 进行中
    Open,
    /// 已归档
    Archived,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Archived => "archived",
        }
    }
}

/// 房源反规范化快照，随会话一起展示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub id: PropertyId,
    pub title: String,
    pub price: Option<f64>,
    pub cover_image_url: Option<String>,
}

/// 会话快照，用于持久化边界的往返转换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatThreadSnapshot {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub property: Option<PropertySummary>,
    pub contact_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub status: ThreadStatus,
}

/// 会话实体
#[derive(Debug, Clone, PartialEq)]
pub struct ChatThread {
    /// 会话唯一ID
    pub id: ThreadId,
    /// 所属组织
    pub org_id: Option<OrgId>,
    /// 房源快照
    pub property: Option<PropertySummary>,
    /// 关联的外部联系人
    pub contact_id: Option<ContactId>,
    /// 创建者
    pub created_by: Option<UserId>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    // 参与者按插入顺序存放，辅以 ID 索引保证唯一性；
    // 外部只能通过访问器读取，变更走 add_participant
    participants: Vec<Participant>,
    participant_index: HashMap<Uuid, usize>,
    last_message_at: Option<DateTime<Utc>>,
    unread_count: u32,
    status: ThreadStatus,
}

impl ChatThread {
    /// 创建新会话
    pub fn new(
        id: ThreadId,
        org_id: Option<OrgId>,
        property: Option<PropertySummary>,
        contact_id: Option<ContactId>,
        created_by: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            org_id,
            property,
            contact_id,
            created_by,
            created_at,
            participants: Vec::new(),
            participant_index: HashMap::new(),
            last_message_at: None,
            unread_count: 0,
            status: ThreadStatus::Open,
        }
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    /// 按插入顺序返回参与者
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// 按 ID 查找参与者
    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.participant_index
            .get(&id)
            .map(|&idx| &self.participants[idx])
    }

    /// 按 ID 插入或更新参与者（upsert）。更新保留原插入位置。
    pub fn add_participant(&mut self, participant: Participant) {
        match self.participant_index.get(&participant.id()) {
            Some(&idx) => self.participants[idx] = participant,
            None => {
                self.participant_index
                    .insert(participant.id(), self.participants.len());
                self.participants.push(participant);
            }
        }
    }

    /// 指定用户是否以 user 类型参与此会话
    pub fn has_user_participant(&self, user_id: UserId) -> bool {
        self.participant(user_id.into())
            .map(|p| p.kind() == ParticipantKind::User)
            .unwrap_or(false)
    }

    /// 指定联系人是否以 contact 类型参与此会话
    pub fn has_contact_participant(&self, contact_id: ContactId) -> bool {
        self.participant(contact_id.into())
            .map(|p| p.kind() == ParticipantKind::Contact)
            .unwrap_or(false)
    }

    /// 记录一条新消息：校验归属、推进最近消息时间，按需累计未读。
    ///
    /// 未读计数按"发送方类型 ≠ 读者类型"核算，对端每发一条加一；
    /// 同侧存在多个参与者时该计数由一侧共享（当前产品只建双人会话）。
    pub fn record_message(
        &mut self,
        message: &ChatMessage,
        count_as_unread: bool,
    ) -> DomainResult<()> {
        if message.thread_id != self.id {
            return Err(DomainError::invariant_violation(format!(
                "消息 {} 不属于会话 {}",
                message.id, self.id
            )));
        }

        // 只向前推进，乱序写入不回退
        self.last_message_at = Some(match self.last_message_at {
            Some(existing) => existing.max(message.created_at),
            None => message.created_at,
        });

        if count_as_unread {
            self.unread_count = self.unread_count.saturating_add(1);
        }
        Ok(())
    }

    /// 清零未读计数
    pub fn reset_unread(&mut self) {
        self.unread_count = 0;
    }

    /// 归档会话
    pub fn archive(&mut self) {
        self.status = ThreadStatus::Archived;
    }

    /// 重新打开会话
    pub fn reopen(&mut self) {
        self.status = ThreadStatus::Open;
    }

    /// 外部写入（绕过实体的存储层更新）后同步最近消息时间
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_message_at = Some(now);
    }

    /// 导出快照
    pub fn to_snapshot(&self) -> ChatThreadSnapshot {
        ChatThreadSnapshot {
            id: self.id.into(),
            org_id: self.org_id.map(Into::into),
            property: self.property.clone(),
            contact_id: self.contact_id.map(Into::into),
            created_by: self.created_by.map(Into::into),
            participants: self.participants.clone(),
            created_at: self.created_at,
            last_message_at: self.last_message_at,
            unread_count: self.unread_count,
            status: self.status,
        }
    }

    /// 从快照恢复，重建参与者索引并校验唯一性
    pub fn restore(snapshot: ChatThreadSnapshot) -> DomainResult<Self> {
        let mut participant_index = HashMap::with_capacity(snapshot.participants.len());
        for (idx, participant) in snapshot.participants.iter().enumerate() {
            if participant_index.insert(participant.id(), idx).is_some() {
                return Err(DomainError::invariant_violation(format!(
                    "参与者 ID 重复: {}",
                    participant.id()
                )));
            }
        }

        Ok(Self {
            id: ThreadId::from(snapshot.id),
            org_id: snapshot.org_id.map(OrgId::from),
            property: snapshot.property,
            contact_id: snapshot.contact_id.map(ContactId::from),
            created_by: snapshot.created_by.map(UserId::from),
            created_at: snapshot.created_at,
            participants: snapshot.participants,
            participant_index,
            last_message_at: snapshot.last_message_at,
            unread_count: snapshot.unread_count,
            status: snapshot.status,
        })
    }
}
