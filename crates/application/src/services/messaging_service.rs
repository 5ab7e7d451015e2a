//! 会话消息用例
//!
//! 实现消息收发的核心业务流程：发送、分页读取、批量已读、
//! 会话查找或创建。每个会话级操作都先解析调用者身份，
//! 身份解析即授权判定（见 [`CallerIdentity`]）。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use config::ChatConfig;
use domain::{MessageBody, OrgId, PropertyId, ThreadId, UserId};

use crate::auth::AuthService;
use crate::clock::Clock;
use crate::dto::{ChatMessageDto, ChatThreadDto, PageDto};
use crate::error::{ChatError, ChatResult};
use crate::identity::CallerIdentity;
use crate::mappers::{format_timestamp, to_domain_thread};
use crate::repository::{ChatMessageRepo, ChatThreadRepo, NewMessage};

/// 发送消息请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// 会话ID
    pub thread_id: String,
    /// 消息正文
    pub body: String,
    /// 不透明的结构化附件
    pub payload: Option<JsonValue>,
}

/// 消息列表请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMessagesRequest {
    /// 会话ID
    pub thread_id: String,
    /// 页码，从 1 开始
    pub page: Option<u32>,
    /// 每页条数，缺省与上限由配置决定
    pub page_size: Option<u32>,
}

/// 批量已读请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkThreadAsReadRequest {
    /// 会话ID
    pub thread_id: String,
}

/// 查找或创建会话请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindOrCreateThreadRequest {
    /// 房源ID
    pub property_id: String,
    /// 组织ID
    pub org_id: Option<String>,
    /// 房源挂牌方用户ID，会被加入参与者
    pub lister_user_id: Option<String>,
}

/// 消息服务依赖
pub struct MessagingServiceDependencies {
    pub thread_repo: Arc<dyn ChatThreadRepo>,
    pub message_repo: Arc<dyn ChatMessageRepo>,
    pub auth: Arc<dyn AuthService>,
    pub clock: Arc<dyn Clock>,
    pub config: ChatConfig,
}

/// 消息服务
pub struct MessagingService {
    deps: MessagingServiceDependencies,
}

impl MessagingService {
    pub fn new(deps: MessagingServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发送一条消息
    ///
    /// 校验正文，解析身份，写入存储，再推进会话的最近消息时间。
    /// 存储失败原样上抛，不做重试，调用方可重新提交。
    pub async fn send_message(&self, request: SendMessageRequest) -> ChatResult<ChatMessageDto> {
        let thread_id = ThreadId::parse(&request.thread_id)?;
        let body = MessageBody::new(request.body)?;

        let thread = self.load_thread(thread_id.into()).await?;
        let auth = self.deps.auth.get_current().await?;
        let identity = CallerIdentity::authorize(&thread, &auth)?;
        let (sender_type, sender_id) = match (identity.sender_type(), identity.sender_id()) {
            (Some(t), Some(id)) => (t, id),
            _ => return Err(ChatError::MissingIdentity),
        };

        let created = self
            .deps
            .message_repo
            .create(NewMessage {
                thread_id: thread_id.into(),
                sender_type,
                sender_id,
                body: body.as_str().to_string(),
                payload: request.payload,
            })
            .await?;

        // 最近消息时间对并发读取会话列表方可见
        self.deps
            .thread_repo
            .touch_last_message_at(thread_id.into(), &created.created_at)
            .await?;

        info!(
            thread_id = %thread_id,
            message_id = %created.id,
            sender_type = ?sender_type,
            "消息已发送"
        );
        Ok(created)
    }

    /// 按阅读顺序（创建时间升序）分页读取会话消息
    pub async fn list_messages(
        &self,
        request: ListMessagesRequest,
    ) -> ChatResult<PageDto<ChatMessageDto>> {
        let thread_id = ThreadId::parse(&request.thread_id)?;
        let (page, page_size) = self.normalize_paging(request.page, request.page_size)?;

        let thread = self.load_thread(thread_id.into()).await?;
        let auth = self.deps.auth.get_current().await?;
        CallerIdentity::authorize(&thread, &auth)?;

        self.deps
            .message_repo
            .list_by_thread(thread_id.into(), page, page_size)
            .await
    }

    /// 将对端发来的全部未读消息批量标记为已读+已送达
    ///
    /// 整批使用同一个时间戳。与对端并发发送的消息可能不被覆盖，
    /// 留待下一次调用处理。
    pub async fn mark_thread_as_read(&self, request: MarkThreadAsReadRequest) -> ChatResult<()> {
        let thread_id = ThreadId::parse(&request.thread_id)?;

        let thread = self.load_thread(thread_id.into()).await?;
        let auth = self.deps.auth.get_current().await?;
        let identity = CallerIdentity::authorize(&thread, &auth)?;
        let (reader_type, reader_id) = match (identity.sender_type(), identity.sender_id()) {
            (Some(t), Some(id)) => (t, id),
            _ => return Err(ChatError::MissingIdentity),
        };

        let at = format_timestamp(self.deps.clock.now());
        self.deps
            .message_repo
            .mark_thread_as_read(thread_id.into(), reader_type, reader_id, &at)
            .await?;

        debug!(thread_id = %thread_id, reader_type = ?reader_type, "会话已标记为已读");
        Ok(())
    }

    /// 查找（房源, 调用用户）对应的既有会话，不存在则创建
    ///
    /// 创建是两步操作（会话行 + 参与者行），没有多语句事务可用：
    /// 参与者插入失败时删除刚创建的会话行作为补偿，并原样上抛原错误。
    pub async fn find_or_create_thread(
        &self,
        request: FindOrCreateThreadRequest,
    ) -> ChatResult<ChatThreadDto> {
        let property_id = PropertyId::parse(&request.property_id)?;
        let org_id = request
            .org_id
            .as_deref()
            .map(OrgId::parse)
            .transpose()?;
        let lister_user_id = request
            .lister_user_id
            .as_deref()
            .map(UserId::parse)
            .transpose()?;

        let auth = self.deps.auth.get_current().await?;
        let Some(caller_user_id) = auth.user_id else {
            return Err(ChatError::MissingIdentity);
        };

        // 幂等：同一（房源, 用户）对最多一个会话
        if let Some(existing) = self
            .deps
            .thread_repo
            .find_by_property_and_user(property_id.into(), caller_user_id)
            .await?
        {
            debug!(thread_id = %existing.id, property_id = %property_id, "复用既有会话");
            return Ok(existing);
        }

        let created = self
            .deps
            .thread_repo
            .create(org_id.map(Into::into), property_id.into(), caller_user_id)
            .await?;

        let mut participant_ids: Vec<Uuid> = vec![caller_user_id];
        if let Some(lister) = lister_user_id {
            let lister: Uuid = lister.into();
            if lister != caller_user_id {
                participant_ids.push(lister);
            }
        }

        if let Err(err) = self
            .deps
            .thread_repo
            .add_participants(created.id, &participant_ids)
            .await
        {
            warn!(thread_id = %created.id, error = %err, "参与者插入失败，回滚会话行");
            if let Err(rollback_err) = self.deps.thread_repo.delete(created.id).await {
                warn!(thread_id = %created.id, error = %rollback_err, "补偿删除失败");
            }
            return Err(err);
        }

        info!(thread_id = %created.id, property_id = %property_id, "会话已创建");
        match self.deps.thread_repo.get_by_id(created.id).await? {
            Some(thread) => Ok(thread),
            None => Ok(created),
        }
    }

    async fn load_thread(&self, id: Uuid) -> ChatResult<domain::ChatThread> {
        let dto = self
            .deps
            .thread_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ChatError::not_found("thread", id))?;
        to_domain_thread(&dto)
    }

    /// 页码从 1 起，页大小应用缺省值并截断到上限
    fn normalize_paging(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ChatResult<(u32, u32)> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(ChatError::validation("page", "页码必须不小于 1"));
        }
        let pagination = &self.deps.config.pagination;
        let page_size = page_size
            .unwrap_or(pagination.page_size_default)
            .clamp(1, pagination.page_size_max);
        Ok((page, page_size))
    }
}
