//! 存储/传输边界的 DTO 定义
//!
//! DTO 是跨核心/存储边界的唯一数据形态：时间戳一律为 ISO-8601 字符串，
//! 领域内部使用 `DateTime<Utc>`。

use domain::{ParticipantKind, SenderType, ThreadStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatParticipantDto {
    pub id: Uuid,
    pub participant_type: ParticipantKind,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub last_seen_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_type: SenderType,
    pub sender_id: Uuid,
    pub body: String,
    pub payload: Option<JsonValue>,
    pub created_at: String,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummaryDto {
    pub id: Uuid,
    pub title: String,
    pub price: Option<f64>,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatThreadDto {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub property: Option<PropertySummaryDto>,
    pub contact_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub participants: Vec<ChatParticipantDto>,
    pub created_at: String,
    pub last_message_at: Option<String>,
    pub unread_count: u32,
    pub status: ThreadStatus,
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDto<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

impl<T> PageDto<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let has_more = (page as u64 * page_size as u64) < total;
        Self {
            items,
            total,
            page,
            page_size,
            has_more,
        }
    }

    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }
}
