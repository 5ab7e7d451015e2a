//! 实时推送层
//!
//! 将外部推送事件源（每个订阅会话一路消息插入流，外加一路
//! 不持久化的输入提示广播）桥接到进程内处理器。

pub mod sync;
pub mod view;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::ChatMessageDto;
use crate::error::ChatResult;

pub use sync::RealtimeSyncManager;
pub use view::ConversationView;

/// 输入提示事件。短暂且允许丢失，只携带参与者 ID 与时间。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub participant_id: Uuid,
    pub at: String,
}

/// 送达回执事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredEvent {
    pub message_id: Uuid,
    pub at: String,
}

/// 会话频道上的推送事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThreadEvent {
    Message(ChatMessageDto),
    Typing(TypingEvent),
    Delivered(DeliveredEvent),
}

/// 订阅时注册的事件处理器集合
#[derive(Default)]
pub struct ThreadEventHandlers {
    pub on_message: Option<Box<dyn Fn(ChatMessageDto) + Send + Sync>>,
    pub on_typing: Option<Box<dyn Fn(TypingEvent) + Send + Sync>>,
    pub on_delivered: Option<Box<dyn Fn(DeliveredEvent) + Send + Sync>>,
}

impl ThreadEventHandlers {
    pub fn on_message(mut self, handler: impl Fn(ChatMessageDto) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Box::new(handler));
        self
    }

    pub fn on_typing(mut self, handler: impl Fn(TypingEvent) + Send + Sync + 'static) -> Self {
        self.on_typing = Some(Box::new(handler));
        self
    }

    pub fn on_delivered(
        mut self,
        handler: impl Fn(DeliveredEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_delivered = Some(Box::new(handler));
        self
    }

    /// 分发一个事件到对应处理器
    pub fn dispatch(&self, event: ThreadEvent) {
        match event {
            ThreadEvent::Message(message) => {
                if let Some(handler) = &self.on_message {
                    handler(message);
                }
            }
            ThreadEvent::Typing(typing) => {
                if let Some(handler) = &self.on_typing {
                    handler(typing);
                }
            }
            ThreadEvent::Delivered(delivered) => {
                if let Some(handler) = &self.on_delivered {
                    handler(delivered);
                }
            }
        }
    }
}

impl std::fmt::Debug for ThreadEventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadEventHandlers")
            .field("on_message", &self.on_message.is_some())
            .field("on_typing", &self.on_typing.is_some())
            .field("on_delivered", &self.on_delivered.is_some())
            .finish()
    }
}

/// 推送服务端口，由外部协作方（推送网关适配器）实现。
///
/// 投递语义是 at-least-once：消费方必须按消息 ID 去重，
/// 去重由 [`RealtimeSyncManager`] 统一完成。
#[async_trait]
pub trait RealtimeService: Send + Sync {
    /// 订阅一个会话的推送事件。消息插入事件在服务端按会话过滤。
    async fn subscribe_to_thread(
        &self,
        thread_id: Uuid,
        handlers: ThreadEventHandlers,
    ) -> ChatResult<()>;

    /// 取消订阅
    async fn unsubscribe(&self, thread_id: Uuid) -> ChatResult<()>;

    /// 广播输入提示（不持久化，不重试）
    async fn broadcast_typing(&self, thread_id: Uuid, participant_id: Uuid) -> ChatResult<()>;
}

/// 会话频道名，由会话 ID 确定性导出
pub fn thread_channel_name(prefix: &str, thread_id: Uuid) -> String {
    format!("{}{}", prefix, thread_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_is_deterministic() {
        let thread_id = Uuid::new_v4();
        assert_eq!(
            thread_channel_name("hilo:", thread_id),
            thread_channel_name("hilo:", thread_id)
        );
        assert_eq!(
            thread_channel_name("hilo:", thread_id),
            format!("hilo:{}", thread_id)
        );
    }
}
