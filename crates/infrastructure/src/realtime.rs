//! 进程内实时推送适配器
//!
//! 用 tokio broadcast 频道模拟外部推送网关：每个会话一个频道，
//! 频道名由配置前缀与会话 ID 确定性导出。订阅会起一个分发任务，
//! 把频道事件交给注册的处理器；取消订阅时中止任务。

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use application::error::ChatResult;
use application::mappers::format_timestamp;
use application::realtime::{
    thread_channel_name, DeliveredEvent, RealtimeService, ThreadEvent, ThreadEventHandlers,
    TypingEvent,
};
use application::dto::ChatMessageDto;
use async_trait::async_trait;
use config::RealtimeConfig;

/// 本地实时推送服务
pub struct LocalRealtimeService {
    config: RealtimeConfig,
    channels: RwLock<HashMap<String, broadcast::Sender<ThreadEvent>>>,
    subscriptions: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl LocalRealtimeService {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            channels: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    async fn channel(&self, thread_id: Uuid) -> broadcast::Sender<ThreadEvent> {
        let name = thread_channel_name(&self.config.channel_prefix, thread_id);
        if let Some(sender) = self.channels.read().await.get(&name) {
            return sender.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(name)
            .or_insert_with(|| broadcast::channel(self.config.broadcast_capacity).0)
            .clone()
    }

    /// 推送一条已持久化的消息。无人订阅时静默丢弃。
    pub async fn publish_message(&self, message: ChatMessageDto) {
        let sender = self.channel(message.thread_id).await;
        let _ = sender.send(ThreadEvent::Message(message));
    }

    /// 推送送达回执
    pub async fn publish_delivered(&self, thread_id: Uuid, message_id: Uuid) {
        let sender = self.channel(thread_id).await;
        let _ = sender.send(ThreadEvent::Delivered(DeliveredEvent {
            message_id,
            at: format_timestamp(Utc::now()),
        }));
    }
}

#[async_trait]
impl RealtimeService for LocalRealtimeService {
    async fn subscribe_to_thread(
        &self,
        thread_id: Uuid,
        handlers: ThreadEventHandlers,
    ) -> ChatResult<()> {
        let mut receiver = self.channel(thread_id).await.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => handlers.dispatch(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(thread_id = %thread_id, skipped, "推送消费滞后，事件被覆盖");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // 同一会话重复订阅时中止旧任务
        if let Some(old) = self.subscriptions.lock().await.insert(thread_id, task) {
            old.abort();
        }
        debug!(thread_id = %thread_id, "实时订阅已建立");
        Ok(())
    }

    async fn unsubscribe(&self, thread_id: Uuid) -> ChatResult<()> {
        if let Some(task) = self.subscriptions.lock().await.remove(&thread_id) {
            task.abort();
            // 每个会话只有一路订阅，拆除后频道一并回收，后续发布会重建
            let name = thread_channel_name(&self.config.channel_prefix, thread_id);
            self.channels.write().await.remove(&name);
            debug!(thread_id = %thread_id, "实时订阅已拆除");
        }
        Ok(())
    }

    async fn broadcast_typing(&self, thread_id: Uuid, participant_id: Uuid) -> ChatResult<()> {
        let sender = self.channel(thread_id).await;
        // 输入提示允许丢失，发送失败不上抛
        let _ = sender.send(ThreadEvent::Typing(TypingEvent {
            participant_id,
            at: format_timestamp(Utc::now()),
        }));
        Ok(())
    }
}
