//! 收件箱用例
//!
//! 卖方视角按房源聚合会话，买方视角是平铺的会话列表。
//! 聚合在存储分页之后于内存中完成，对相同输入必须产出
//! 完全相同的结果（稳定排序，平局按会话 ID），以便 UI 做廉价 diff。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use config::ChatConfig;
use domain::PropertyId;

use crate::auth::AuthService;
use crate::dto::{ChatThreadDto, PageDto, PropertySummaryDto};
use crate::error::{ChatError, ChatResult};
use crate::mappers::parse_timestamp;
use crate::repository::{ChatThreadRepo, ThreadFilters};

/// 无房源会话的分组键
pub const NO_PROPERTY_GROUP_KEY: &str = "none";

/// 卖方收件箱请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListListerInboxRequest {
    /// 只看某个房源
    pub property_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 买方收件箱请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListClientInboxRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// 按房源聚合出的一组会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroupDto {
    /// 分组键：房源 ID 或无房源哨兵值
    pub key: String,
    pub property: Option<PropertySummaryDto>,
    pub thread_count: u32,
    /// 组内未读总数
    pub unread_count: u32,
    /// 组内会话，按最近消息时间倒序
    pub threads: Vec<ChatThreadDto>,
}

/// 卖方收件箱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListerInboxDto {
    pub groups: Vec<PropertyGroupDto>,
    /// 全部分组的未读总数
    pub total_unread: u32,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

/// 收件箱服务依赖
pub struct InboxServiceDependencies {
    pub thread_repo: Arc<dyn ChatThreadRepo>,
    pub auth: Arc<dyn AuthService>,
    pub config: ChatConfig,
}

/// 收件箱服务
pub struct InboxService {
    deps: InboxServiceDependencies,
}

impl InboxService {
    pub fn new(deps: InboxServiceDependencies) -> Self {
        Self { deps }
    }

    /// 卖方收件箱：当前页内的会话按房源分组
    pub async fn list_lister_inbox(
        &self,
        request: ListListerInboxRequest,
    ) -> ChatResult<ListerInboxDto> {
        let property_id = request
            .property_id
            .as_deref()
            .map(PropertyId::parse)
            .transpose()?;
        let (page, page_size) = normalize_paging(&self.deps.config, request.page, request.page_size)?;

        let auth = self.deps.auth.get_current().await?;
        let Some(user_id) = auth.user_id else {
            return Err(ChatError::MissingIdentity);
        };

        let filters = ThreadFilters {
            property_id: property_id.map(Into::into),
            page,
            page_size,
        };
        let threads = self
            .deps
            .thread_repo
            .list_for_lister(&filters, user_id, auth.org_id)
            .await?;

        let groups = group_threads_by_property(threads.items);
        Ok(ListerInboxDto {
            total_unread: total_unread(&groups),
            groups,
            total: threads.total,
            page: threads.page,
            page_size: threads.page_size,
            has_more: threads.has_more,
        })
    }

    /// 买方收件箱：每个会话一条，不做房源分组。
    /// contact 身份走联系人列表；无组织归属的普通用户走其个人会话列表。
    pub async fn list_client_inbox(
        &self,
        request: ListClientInboxRequest,
    ) -> ChatResult<PageDto<ChatThreadDto>> {
        let (page, page_size) = normalize_paging(&self.deps.config, request.page, request.page_size)?;
        let filters = ThreadFilters::page(page, page_size);

        let auth = self.deps.auth.get_current().await?;
        if let Some(contact_id) = auth.contact_id {
            return self
                .deps
                .thread_repo
                .list_for_contact(&filters, contact_id, auth.org_id)
                .await;
        }
        if let Some(user_id) = auth.user_id {
            return self
                .deps
                .thread_repo
                .list_for_lister(&filters, user_id, None)
                .await;
        }
        Err(ChatError::MissingIdentity)
    }
}

fn normalize_paging(
    config: &ChatConfig,
    page: Option<u32>,
    page_size: Option<u32>,
) -> ChatResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ChatError::validation("page", "页码必须不小于 1"));
    }
    let page_size = page_size
        .unwrap_or(config.pagination.page_size_default)
        .clamp(1, config.pagination.page_size_max);
    Ok((page, page_size))
}

/// 会话的排序键：最近消息时间，没有消息时用创建时间。
/// 端口契约只保证 ISO-8601，时间戳可能带偏移，解析成时刻再比较；
/// 解析不了的行排到最后。
fn recency_key(thread: &ChatThreadDto) -> DateTime<Utc> {
    let raw = thread
        .last_message_at
        .as_deref()
        .unwrap_or(&thread.created_at);
    parse_timestamp("last_message_at", raw).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// 按房源分组。
///
/// 会话先整体按（最近消息时间倒序, 会话 ID 升序）稳定排序，
/// 分组按首个会话出现的顺序产出，因此分组天然按"组内最新会话"倒序。
/// 相同输入的输出逐字节相同。
pub fn group_threads_by_property(mut threads: Vec<ChatThreadDto>) -> Vec<PropertyGroupDto> {
    threads.sort_by(|a, b| {
        recency_key(b)
            .cmp(&recency_key(a))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut groups: Vec<PropertyGroupDto> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for thread in threads {
        let key = thread
            .property
            .as_ref()
            .map(|p| p.id.to_string())
            .unwrap_or_else(|| NO_PROPERTY_GROUP_KEY.to_string());

        let slot = match index.get(&key) {
            Some(&i) => i,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(PropertyGroupDto {
                    key,
                    property: thread.property.clone(),
                    thread_count: 0,
                    unread_count: 0,
                    threads: Vec::new(),
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[slot];
        group.thread_count += 1;
        group.unread_count = group.unread_count.saturating_add(thread.unread_count);
        group.threads.push(thread);
    }

    groups
}

/// 给 group_threads_by_property 的调用方复用的未读合计
pub fn total_unread(groups: &[PropertyGroupDto]) -> u32 {
    groups.iter().map(|g| g.unread_count).sum()
}
