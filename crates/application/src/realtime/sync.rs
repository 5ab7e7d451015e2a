//! 实时订阅生命周期管理
//!
//! 保证：每个会话最多一个活跃订阅（重复订阅先拆除旧的）；
//! 取消订阅是显式操作，所有退出路径都必须执行；
//! 投递为 at-least-once，这里按消息 ID 去重后才交给消费方。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChatResult;
use crate::realtime::{RealtimeService, ThreadEventHandlers};

/// 实时同步管理器
pub struct RealtimeSyncManager {
    service: Arc<dyn RealtimeService>,
    // 活跃订阅的已见消息 ID 集合，由管理器独占，外部不可直接变更
    active: Mutex<HashMap<Uuid, Arc<StdMutex<HashSet<Uuid>>>>>,
}

impl RealtimeSyncManager {
    pub fn new(service: Arc<dyn RealtimeService>) -> Self {
        Self {
            service,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// 订阅一个会话。若该会话已有活跃订阅，先拆除旧订阅再建立新的。
    ///
    /// 消费方的 on_message 处理器在这里被包上按消息 ID 的去重：
    /// 同一 ID 的重复投递只会触发一次。
    pub async fn subscribe(
        &self,
        thread_id: Uuid,
        handlers: ThreadEventHandlers,
    ) -> ChatResult<()> {
        let mut active = self.active.lock().await;

        if active.remove(&thread_id).is_some() {
            debug!(thread_id = %thread_id, "替换已有订阅，先拆除旧订阅");
            self.service.unsubscribe(thread_id).await?;
        }

        let seen: Arc<StdMutex<HashSet<Uuid>>> = Arc::new(StdMutex::new(HashSet::new()));
        let deduped = Self::dedup_handlers(thread_id, handlers, Arc::clone(&seen));

        if let Err(err) = self.service.subscribe_to_thread(thread_id, deduped).await {
            return Err(err);
        }
        active.insert(thread_id, seen);
        debug!(thread_id = %thread_id, "订阅已建立");
        Ok(())
    }

    /// 显式取消订阅。对未订阅的会话是空操作。
    pub async fn unsubscribe(&self, thread_id: Uuid) -> ChatResult<()> {
        let mut active = self.active.lock().await;
        if active.remove(&thread_id).is_none() {
            debug!(thread_id = %thread_id, "取消订阅：该会话没有活跃订阅");
            return Ok(());
        }
        self.service.unsubscribe(thread_id).await
    }

    /// 拆除全部活跃订阅（组件卸载路径）
    pub async fn shutdown(&self) -> ChatResult<()> {
        let mut active = self.active.lock().await;
        for (thread_id, _) in active.drain() {
            if let Err(err) = self.service.unsubscribe(thread_id).await {
                warn!(thread_id = %thread_id, error = %err, "拆除订阅失败");
            }
        }
        Ok(())
    }

    /// 广播输入提示（透传，不持久化不重试）
    pub async fn broadcast_typing(&self, thread_id: Uuid, participant_id: Uuid) -> ChatResult<()> {
        self.service.broadcast_typing(thread_id, participant_id).await
    }

    /// 当前持有活跃订阅的会话列表
    pub async fn active_threads(&self) -> Vec<Uuid> {
        self.active.lock().await.keys().copied().collect()
    }

    fn dedup_handlers(
        thread_id: Uuid,
        handlers: ThreadEventHandlers,
        seen: Arc<StdMutex<HashSet<Uuid>>>,
    ) -> ThreadEventHandlers {
        let ThreadEventHandlers {
            on_message,
            on_typing,
            on_delivered,
        } = handlers;

        let on_message = on_message.map(|inner| {
            Box::new(move |message: crate::dto::ChatMessageDto| {
                let Ok(mut seen) = seen.lock() else {
                    return;
                };
                if !seen.insert(message.id) {
                    debug!(thread_id = %thread_id, message_id = %message.id, "丢弃重复投递");
                    return;
                }
                drop(seen);
                inner(message);
            }) as Box<dyn Fn(crate::dto::ChatMessageDto) + Send + Sync>
        });

        // 输入提示与送达回执无需去重：前者短暂，后者在领域层幂等
        ThreadEventHandlers {
            on_message,
            on_typing,
            on_delivered,
        }
    }
}
