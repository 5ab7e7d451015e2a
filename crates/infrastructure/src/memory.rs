//! 内存存储适配器
//!
//! 实现会话与消息存储端口，语义对齐 SQL 适配器：
//! ID 与创建时间在插入时分配，列表按最近消息时间倒序，
//! 未读数按读者视角即时计算（对端发送且未读的消息数）。
//! 参与者快照在每次读取时由上游档案数据重新组装，不落盘。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use application::dto::{
    ChatMessageDto, ChatParticipantDto, ChatThreadDto, PageDto, PropertySummaryDto,
};
use application::error::{ChatError, ChatResult};
use application::mappers::{format_timestamp, parse_timestamp};
use application::repository::{ChatMessageRepo, ChatThreadRepo, NewMessage, ThreadFilters};
use async_trait::async_trait;
use domain::{ParticipantKind, SenderType, ThreadStatus};

use crate::realtime::LocalRealtimeService;

/// 上游档案数据（用户或联系人），用于组装参与者快照
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// 会话行，参与者只存 ID，读取时再组装
#[derive(Debug, Clone)]
struct ThreadRow {
    id: Uuid,
    org_id: Option<Uuid>,
    property_id: Option<Uuid>,
    contact_id: Option<Uuid>,
    created_by: Option<Uuid>,
    participant_user_ids: Vec<Uuid>,
    created_at: String,
    last_message_at: Option<String>,
    status: ThreadStatus,
}

/// 消息行，seq 记录插入顺序，分页按它排序以避免同时间戳歧义
#[derive(Debug, Clone)]
struct MessageRow {
    seq: u64,
    dto: ChatMessageDto,
}

/// 会话与消息的共享内存存储
#[derive(Default)]
pub struct InMemoryChatStore {
    threads: RwLock<HashMap<Uuid, ThreadRow>>,
    messages: RwLock<Vec<MessageRow>>,
    properties: RwLock<HashMap<Uuid, PropertySummaryDto>>,
    users: RwLock<HashMap<Uuid, ProfileRecord>>,
    contacts: RwLock<HashMap<Uuid, ProfileRecord>>,
}

impl InMemoryChatStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 登记房源摘要，会话读取时内联
    pub async fn register_property(&self, property: PropertySummaryDto) {
        self.properties.write().await.insert(property.id, property);
    }

    /// 登记用户档案
    pub async fn register_user(&self, id: Uuid, profile: ProfileRecord) {
        self.users.write().await.insert(id, profile);
    }

    /// 登记联系人档案
    pub async fn register_contact(&self, id: Uuid, profile: ProfileRecord) {
        self.contacts.write().await.insert(id, profile);
    }

    /// 直接绑定会话的联系人（SQL 适配器里由线下导入流程完成）
    pub async fn attach_contact(&self, thread_id: Uuid, contact_id: Uuid) -> ChatResult<()> {
        let mut threads = self.threads.write().await;
        let row = threads
            .get_mut(&thread_id)
            .ok_or_else(|| ChatError::not_found("thread", thread_id))?;
        row.contact_id = Some(contact_id);
        Ok(())
    }

    async fn assemble_thread(&self, row: &ThreadRow, reader: SenderType) -> ChatThreadDto {
        let users = self.users.read().await;
        let contacts = self.contacts.read().await;
        let properties = self.properties.read().await;

        let mut participants: Vec<ChatParticipantDto> = Vec::new();
        for user_id in &row.participant_user_ids {
            participants.push(participant_snapshot(
                *user_id,
                ParticipantKind::User,
                users.get(user_id),
            ));
        }
        if let Some(contact_id) = row.contact_id {
            participants.push(participant_snapshot(
                contact_id,
                ParticipantKind::Contact,
                contacts.get(&contact_id),
            ));
        }

        ChatThreadDto {
            id: row.id,
            org_id: row.org_id,
            property: row.property_id.and_then(|id| properties.get(&id).cloned()),
            contact_id: row.contact_id,
            created_by: row.created_by,
            participants,
            created_at: row.created_at.clone(),
            last_message_at: row.last_message_at.clone(),
            unread_count: self.unread_for(row.id, reader).await,
            status: row.status,
        }
    }

    /// 读者视角的未读数：对端发送且尚未读的消息数
    async fn unread_for(&self, thread_id: Uuid, reader: SenderType) -> u32 {
        let Some(counterpart) = reader.counterpart() else {
            return 0;
        };
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| {
                m.dto.thread_id == thread_id
                    && m.dto.sender_type == counterpart
                    && m.dto.read_at.is_none()
            })
            .count() as u32
    }

    /// 时间戳可能带偏移，解析成时刻再比较
    fn recency_key(row: &ThreadRow) -> DateTime<Utc> {
        let raw = row.last_message_at.as_deref().unwrap_or(&row.created_at);
        parse_timestamp("last_message_at", raw).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// 倒序排列、切页并组装当前页的会话
    async fn page_threads(
        &self,
        mut rows: Vec<ThreadRow>,
        filters: &ThreadFilters,
        reader: SenderType,
    ) -> PageDto<ChatThreadDto> {
        rows.sort_by(|a, b| {
            Self::recency_key(b)
                .cmp(&Self::recency_key(a))
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = rows.len() as u64;
        let start = ((filters.page - 1) as usize).saturating_mul(filters.page_size as usize);
        let mut items = Vec::new();
        for row in rows.into_iter().skip(start).take(filters.page_size as usize) {
            items.push(self.assemble_thread(&row, reader).await);
        }
        PageDto::new(items, total, filters.page, filters.page_size)
    }
}

fn participant_snapshot(
    id: Uuid,
    kind: ParticipantKind,
    profile: Option<&ProfileRecord>,
) -> ChatParticipantDto {
    ChatParticipantDto {
        id,
        participant_type: kind,
        display_name: profile
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| id.to_string()),
        email: profile.and_then(|p| p.email.clone()),
        phone: profile.and_then(|p| p.phone.clone()),
        last_seen_at: None,
    }
}

/// 会话存储适配器
pub struct InMemoryThreadRepo {
    store: Arc<InMemoryChatStore>,
}

impl InMemoryThreadRepo {
    pub fn new(store: Arc<InMemoryChatStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ChatThreadRepo for InMemoryThreadRepo {
    async fn list_for_lister(
        &self,
        filters: &ThreadFilters,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> ChatResult<PageDto<ChatThreadDto>> {
        let rows: Vec<ThreadRow> = self
            .store
            .threads
            .read()
            .await
            .values()
            .filter(|t| {
                let involved = t.participant_user_ids.contains(&user_id)
                    || t.created_by == Some(user_id);
                let in_org = org_id.is_none() || t.org_id == org_id;
                let on_property =
                    filters.property_id.is_none() || t.property_id == filters.property_id;
                involved && in_org && on_property
            })
            .cloned()
            .collect();
        Ok(self.store.page_threads(rows, filters, SenderType::User).await)
    }

    async fn list_for_contact(
        &self,
        filters: &ThreadFilters,
        contact_id: Uuid,
        org_id: Option<Uuid>,
    ) -> ChatResult<PageDto<ChatThreadDto>> {
        let rows: Vec<ThreadRow> = self
            .store
            .threads
            .read()
            .await
            .values()
            .filter(|t| {
                t.contact_id == Some(contact_id)
                    && (org_id.is_none() || t.org_id == org_id)
                    && (filters.property_id.is_none() || t.property_id == filters.property_id)
            })
            .cloned()
            .collect();
        Ok(self
            .store
            .page_threads(rows, filters, SenderType::Contact)
            .await)
    }

    async fn get_by_id(&self, id: Uuid) -> ChatResult<Option<ChatThreadDto>> {
        let row = self.store.threads.read().await.get(&id).cloned();
        match row {
            Some(row) => Ok(Some(
                self.store.assemble_thread(&row, SenderType::User).await,
            )),
            None => Ok(None),
        }
    }

    async fn touch_last_message_at(&self, id: Uuid, at: &str) -> ChatResult<()> {
        let incoming = parse_timestamp("last_message_at", at)?;
        let mut threads = self.store.threads.write().await;
        let row = threads
            .get_mut(&id)
            .ok_or_else(|| ChatError::not_found("thread", id))?;
        // 单调推进，乱序到达的旧时间戳不回退；按解析后的时刻比较
        let current = row
            .last_message_at
            .as_deref()
            .map(|cur| parse_timestamp("last_message_at", cur))
            .transpose()?;
        if current.map_or(true, |cur| incoming > cur) {
            row.last_message_at = Some(at.to_string());
        }
        Ok(())
    }

    async fn find_by_property_and_user(
        &self,
        property_id: Uuid,
        user_id: Uuid,
    ) -> ChatResult<Option<ChatThreadDto>> {
        let row = self
            .store
            .threads
            .read()
            .await
            .values()
            .find(|t| t.property_id == Some(property_id) && t.created_by == Some(user_id))
            .cloned();
        match row {
            Some(row) => Ok(Some(
                self.store.assemble_thread(&row, SenderType::User).await,
            )),
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        org_id: Option<Uuid>,
        property_id: Uuid,
        created_by: Uuid,
    ) -> ChatResult<ChatThreadDto> {
        let row = ThreadRow {
            id: Uuid::new_v4(),
            org_id,
            property_id: Some(property_id),
            contact_id: None,
            created_by: Some(created_by),
            participant_user_ids: Vec::new(),
            created_at: format_timestamp(Utc::now()),
            last_message_at: None,
            status: ThreadStatus::Open,
        };
        debug!(thread_id = %row.id, property_id = %property_id, "创建会话行");
        let dto = self.store.assemble_thread(&row, SenderType::User).await;
        self.store.threads.write().await.insert(row.id, row);
        Ok(dto)
    }

    async fn add_participants(&self, thread_id: Uuid, user_ids: &[Uuid]) -> ChatResult<()> {
        let mut threads = self.store.threads.write().await;
        let row = threads
            .get_mut(&thread_id)
            .ok_or_else(|| ChatError::not_found("thread", thread_id))?;
        for id in user_ids {
            if !row.participant_user_ids.contains(id) {
                row.participant_user_ids.push(*id);
            }
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> ChatResult<()> {
        self.store.threads.write().await.remove(&id);
        self.store
            .messages
            .write()
            .await
            .retain(|m| m.dto.thread_id != id);
        debug!(thread_id = %id, "删除会话行");
        Ok(())
    }
}

/// 消息存储适配器。写入成功后把消息推到本地实时服务，
/// 对应 SQL 适配器里由存储层变更流触发的推送。
pub struct InMemoryMessageRepo {
    store: Arc<InMemoryChatStore>,
    realtime: Option<Arc<LocalRealtimeService>>,
}

impl InMemoryMessageRepo {
    pub fn new(store: Arc<InMemoryChatStore>) -> Self {
        Self {
            store,
            realtime: None,
        }
    }

    pub fn with_realtime(store: Arc<InMemoryChatStore>, realtime: Arc<LocalRealtimeService>) -> Self {
        Self {
            store,
            realtime: Some(realtime),
        }
    }
}

#[async_trait]
impl ChatMessageRepo for InMemoryMessageRepo {
    async fn list_by_thread(
        &self,
        thread_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> ChatResult<PageDto<ChatMessageDto>> {
        let messages = self.store.messages.read().await;
        let mut rows: Vec<&MessageRow> = messages
            .iter()
            .filter(|m| m.dto.thread_id == thread_id)
            .collect();
        rows.sort_by_key(|m| m.seq);

        let total = rows.len() as u64;
        let start = ((page - 1) as usize).saturating_mul(page_size as usize);
        let items: Vec<ChatMessageDto> = rows
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .map(|m| m.dto.clone())
            .collect();
        Ok(PageDto::new(items, total, page, page_size))
    }

    async fn create(&self, message: NewMessage) -> ChatResult<ChatMessageDto> {
        let dto = {
            let mut messages = self.store.messages.write().await;
            let dto = ChatMessageDto {
                id: Uuid::new_v4(),
                thread_id: message.thread_id,
                sender_type: message.sender_type,
                sender_id: message.sender_id,
                body: message.body,
                payload: message.payload,
                created_at: format_timestamp(Utc::now()),
                delivered_at: None,
                read_at: None,
            };
            let seq = messages.len() as u64;
            messages.push(MessageRow {
                seq,
                dto: dto.clone(),
            });
            dto
        };

        if let Some(realtime) = &self.realtime {
            realtime.publish_message(dto.clone()).await;
        }
        Ok(dto)
    }

    async fn mark_thread_as_read(
        &self,
        thread_id: Uuid,
        reader_type: SenderType,
        reader_id: Uuid,
        at: &str,
    ) -> ChatResult<()> {
        let Some(counterpart) = reader_type.counterpart() else {
            return Ok(());
        };
        let mut messages = self.store.messages.write().await;
        let mut marked = 0u32;
        for row in messages.iter_mut() {
            let m = &mut row.dto;
            if m.thread_id == thread_id && m.sender_type == counterpart && m.read_at.is_none() {
                m.read_at = Some(at.to_string());
                if m.delivered_at.is_none() {
                    m.delivered_at = Some(at.to_string());
                }
                marked += 1;
            }
        }
        debug!(
            thread_id = %thread_id,
            reader_id = %reader_id,
            marked,
            "批量标记已读"
        );
        Ok(())
    }
}
