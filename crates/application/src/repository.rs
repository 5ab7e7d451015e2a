//! 存储端口定义
//!
//! 数据访问的抽象边界，由外部协作方（SQL 存储适配器）实现。
//! 跨边界只传 DTO，时间戳为 ISO-8601 字符串。

use async_trait::async_trait;
use domain::SenderType;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::dto::{ChatMessageDto, ChatThreadDto, PageDto};
use crate::error::ChatResult;

/// 会话列表过滤条件
#[derive(Debug, Clone)]
pub struct ThreadFilters {
    pub property_id: Option<Uuid>,
    pub page: u32,
    pub page_size: u32,
}

impl ThreadFilters {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            property_id: None,
            page,
            page_size,
        }
    }
}

/// 新消息写入参数
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub thread_id: Uuid,
    pub sender_type: SenderType,
    pub sender_id: Uuid,
    pub body: String,
    pub payload: Option<JsonValue>,
}

/// 会话存储端口
#[async_trait]
pub trait ChatThreadRepo: Send + Sync {
    /// 卖方视角的会话列表，按最近消息时间倒序
    async fn list_for_lister(
        &self,
        filters: &ThreadFilters,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> ChatResult<PageDto<ChatThreadDto>>;

    /// 买方（联系人）视角的会话列表，按最近消息时间倒序
    async fn list_for_contact(
        &self,
        filters: &ThreadFilters,
        contact_id: Uuid,
        org_id: Option<Uuid>,
    ) -> ChatResult<PageDto<ChatThreadDto>>;

    /// 按 ID 查找会话
    async fn get_by_id(&self, id: Uuid) -> ChatResult<Option<ChatThreadDto>>;

    /// 推进会话的最近消息时间（对并发读取会话列表方可见的副作用）
    async fn touch_last_message_at(&self, id: Uuid, at: &str) -> ChatResult<()>;

    /// 查找（房源, 发起用户）对应的既有会话
    async fn find_by_property_and_user(
        &self,
        property_id: Uuid,
        user_id: Uuid,
    ) -> ChatResult<Option<ChatThreadDto>>;

    /// 创建会话行（参与者行单独插入，见 add_participants）
    async fn create(
        &self,
        org_id: Option<Uuid>,
        property_id: Uuid,
        created_by: Uuid,
    ) -> ChatResult<ChatThreadDto>;

    /// 为会话插入参与者行
    async fn add_participants(&self, thread_id: Uuid, user_ids: &[Uuid]) -> ChatResult<()>;

    /// 删除会话行。仅用于参与者插入失败后的补偿回滚，
    /// 用例层没有多语句事务可用。
    async fn delete(&self, id: Uuid) -> ChatResult<()>;
}

/// 消息存储端口
#[async_trait]
pub trait ChatMessageRepo: Send + Sync {
    /// 按创建时间升序（阅读顺序）分页读取会话消息
    async fn list_by_thread(
        &self,
        thread_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> ChatResult<PageDto<ChatMessageDto>>;

    /// 追加写入一条消息；ID 与创建时间由存储层在插入时分配
    async fn create(&self, message: NewMessage) -> ChatResult<ChatMessageDto>;

    /// 将对端（reader_type 的相反方）发送的全部未读消息批量标记为已读+已送达，
    /// 整批使用同一个时间戳
    async fn mark_thread_as_read(
        &self,
        thread_id: Uuid,
        reader_type: SenderType,
        reader_id: Uuid,
        at: &str,
    ) -> ChatResult<()>;
}
