//! 会话视图状态机
//!
//! 单写者模型：一个视图同一时刻只选中一个会话，所有变更都经过
//! 这里的方法。两条防线：
//! - 陈旧响应保护：分页结果返回时若请求的会话已不再被选中，整页丢弃；
//! - 乐观插入：本地先插入带 correlation_id 的占位消息，待持久化回声
//!   到达后按关联 ID 原位替换，不产生重复条目。

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::dto::ChatMessageDto;

/// 当前选中会话的消息视图
#[derive(Debug, Default)]
pub struct ConversationView {
    selected: Option<Uuid>,
    messages: Vec<ChatMessageDto>,
    seen_ids: HashSet<Uuid>,
    // correlation_id -> 乐观占位消息的本地 ID
    pending: HashMap<String, Uuid>,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_thread(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn messages(&self) -> &[ChatMessageDto] {
        &self.messages
    }

    /// 切换选中会话，清空全部视图状态。返回之前选中的会话，
    /// 供调用方拆除其订阅。
    pub fn select_thread(&mut self, thread_id: Uuid) -> Option<Uuid> {
        let previous = self.selected.replace(thread_id);
        self.messages.clear();
        self.seen_ids.clear();
        self.pending.clear();
        previous
    }

    /// 应用一页按时间升序的消息。
    ///
    /// 请求发起时的会话与当前选中会话不一致时整页丢弃，返回 false。
    /// 页内若包含尚未回声的乐观消息的持久化版本，按关联 ID 完成对账；
    /// 未对账的乐观消息保留在页尾。
    pub fn apply_page(&mut self, requested_thread_id: Uuid, page: Vec<ChatMessageDto>) -> bool {
        if self.selected != Some(requested_thread_id) {
            debug!(
                requested = %requested_thread_id,
                selected = ?self.selected,
                "丢弃陈旧的分页结果"
            );
            return false;
        }

        let unresolved: Vec<ChatMessageDto> = self
            .messages
            .iter()
            .filter(|m| {
                correlation_id_of(m)
                    .map(|cid| self.pending.contains_key(cid))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        self.messages = page;
        self.seen_ids = self.messages.iter().map(|m| m.id).collect();

        for cid in self
            .messages
            .iter()
            .filter_map(correlation_id_of)
            .map(str::to_string)
            .collect::<Vec<_>>()
        {
            self.pending.remove(&cid);
        }

        for optimistic in unresolved {
            let still_pending = correlation_id_of(&optimistic)
                .map(|cid| self.pending.contains_key(cid))
                .unwrap_or(false);
            if still_pending {
                self.messages.push(optimistic);
            }
        }
        true
    }

    /// 本地乐观插入。消息的 payload 必须携带 correlation_id，
    /// 后续持久化回声靠它完成原位替换。
    pub fn push_optimistic(&mut self, correlation_id: &str, message: ChatMessageDto) {
        self.pending
            .insert(correlation_id.to_string(), message.id);
        self.messages.push(message);
    }

    /// 应用一条推送到达的消息，返回是否被纳入视图。
    ///
    /// 丢弃条件：不属于当前选中会话，或消息 ID 已见过。
    /// 若 payload 携带的 correlation_id 命中待对账的乐观消息，
    /// 原位替换而非追加。
    pub fn apply_incoming(&mut self, message: ChatMessageDto) -> bool {
        if self.selected != Some(message.thread_id) {
            debug!(
                thread_id = %message.thread_id,
                selected = ?self.selected,
                "丢弃非选中会话的推送消息"
            );
            return false;
        }
        if !self.seen_ids.insert(message.id) {
            return false;
        }

        if let Some(local_id) = correlation_id_of(&message)
            .and_then(|cid| self.pending.remove(cid))
        {
            if let Some(slot) = self.messages.iter_mut().find(|m| m.id == local_id) {
                *slot = message;
                return true;
            }
        }

        self.messages.push(message);
        true
    }
}

fn correlation_id_of(message: &ChatMessageDto) -> Option<&str> {
    message
        .payload
        .as_ref()
        .and_then(|p| p.get("correlation_id"))
        .and_then(|v| v.as_str())
}
