//! 主应用程序入口
//!
//! 用进程内适配器组装消息核心，并驱动一段买卖双方的示例对话：
//! 创建会话、双向收发、批量已读、双方收件箱与实时推送去重。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use application::auth::AuthContext;
use application::clock::SystemClock;
use application::dto::{ChatMessageDto, PropertySummaryDto};
use application::realtime::{RealtimeSyncManager, ThreadEventHandlers};
use application::services::{
    FindOrCreateThreadRequest, InboxService, InboxServiceDependencies, ListClientInboxRequest,
    ListListerInboxRequest, ListMessagesRequest, MarkThreadAsReadRequest, MessagingService,
    MessagingServiceDependencies, SendMessageRequest,
};
use config::ChatConfig;
use infrastructure::{
    InMemoryChatStore, InMemoryMessageRepo, InMemoryThreadRepo, LocalRealtimeService,
    ProfileRecord, StaticAuthService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ChatConfig::from_env();
    tracing::info!(
        page_size_default = config.pagination.page_size_default,
        channel_prefix = %config.realtime.channel_prefix,
        "配置已加载"
    );

    // 组装进程内适配器
    let store = InMemoryChatStore::new();
    let realtime = Arc::new(LocalRealtimeService::new(config.realtime.clone()));
    let thread_repo = Arc::new(InMemoryThreadRepo::new(store.clone()));
    let message_repo = Arc::new(InMemoryMessageRepo::with_realtime(
        store.clone(),
        realtime.clone(),
    ));
    let auth = Arc::new(StaticAuthService::new(AuthContext::default()));

    let messaging = MessagingService::new(MessagingServiceDependencies {
        thread_repo: thread_repo.clone(),
        message_repo,
        auth: auth.clone(),
        clock: Arc::new(SystemClock),
        config: config.clone(),
    });
    let inbox = InboxService::new(InboxServiceDependencies {
        thread_repo,
        auth: auth.clone(),
        config,
    });

    // 示例数据：一套房源、一位卖方、一位买方联系人
    let seller_id = Uuid::new_v4();
    let contact_id = Uuid::new_v4();
    let org_id = Uuid::new_v4();
    let property_id = Uuid::new_v4();

    store
        .register_property(PropertySummaryDto {
            id: property_id,
            title: "Piso céntrico en Malasaña".to_string(),
            price: Some(420_000.0),
            cover_image_url: None,
        })
        .await;
    store
        .register_user(
            seller_id,
            ProfileRecord {
                display_name: "Ana Vendedora".to_string(),
                email: Some("ana@example.com".to_string()),
                phone: None,
            },
        )
        .await;
    store
        .register_contact(
            contact_id,
            ProfileRecord {
                display_name: "Luis Comprador".to_string(),
                email: None,
                phone: Some("+34 600 000 000".to_string()),
            },
        )
        .await;

    // 卖方发起会话
    auth.set(AuthContext {
        user_id: Some(seller_id),
        org_id: Some(org_id),
        contact_id: None,
    })
    .await;
    let thread = messaging
        .find_or_create_thread(FindOrCreateThreadRequest {
            property_id: property_id.to_string(),
            org_id: Some(org_id.to_string()),
            lister_user_id: None,
        })
        .await?;
    store.attach_contact(thread.id, contact_id).await?;
    tracing::info!(thread_id = %thread.id, "会话就绪");

    // 卖方订阅会话的实时推送
    let manager = RealtimeSyncManager::new(realtime.clone());
    let received: Arc<Mutex<Vec<ChatMessageDto>>> = Arc::default();
    let sink = Arc::clone(&received);
    manager
        .subscribe(
            thread.id,
            ThreadEventHandlers::default()
                .on_message(move |m| {
                    tracing::info!(message_id = %m.id, body = %m.body, "收到实时消息");
                    if let Ok(mut received) = sink.lock() {
                        received.push(m);
                    }
                })
                .on_delivered(|d| {
                    tracing::info!(message_id = %d.message_id, at = %d.at, "收到送达回执");
                }),
        )
        .await?;

    // 买方询问
    auth.set(AuthContext {
        user_id: None,
        org_id: None,
        contact_id: Some(contact_id),
    })
    .await;
    let question = messaging
        .send_message(SendMessageRequest {
            thread_id: thread.id.to_string(),
            body: "Hola, ¿sigue disponible?".to_string(),
            payload: None,
        })
        .await?;

    // 推送网关重复投递，消费端按消息 ID 去重；随后回推送达回执
    realtime.publish_message(question.clone()).await;
    realtime.publish_delivered(thread.id, question.id).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Ok(received) = received.lock() {
        tracing::info!(delivered = received.len(), "重复投递去重后的消息数");
    }

    // 卖方查看收件箱、标记已读并回复
    auth.set(AuthContext {
        user_id: Some(seller_id),
        org_id: Some(org_id),
        contact_id: None,
    })
    .await;
    let lister_inbox = inbox
        .list_lister_inbox(ListListerInboxRequest {
            property_id: None,
            page: None,
            page_size: None,
        })
        .await?;
    tracing::info!(
        groups = lister_inbox.groups.len(),
        total_unread = lister_inbox.total_unread,
        "卖方收件箱"
    );

    messaging
        .mark_thread_as_read(MarkThreadAsReadRequest {
            thread_id: thread.id.to_string(),
        })
        .await?;
    messaging
        .send_message(SendMessageRequest {
            thread_id: thread.id.to_string(),
            body: "Hola, sí disponible. ¿Quiere visitarlo?".to_string(),
            payload: None,
        })
        .await?;

    // 买方视角：平铺收件箱与完整消息列表
    auth.set(AuthContext {
        user_id: None,
        org_id: None,
        contact_id: Some(contact_id),
    })
    .await;
    let client_inbox = inbox
        .list_client_inbox(ListClientInboxRequest {
            page: None,
            page_size: None,
        })
        .await?;
    tracing::info!(
        threads = client_inbox.items.len(),
        unread = client_inbox.items.first().map(|t| t.unread_count),
        "买方收件箱"
    );

    let page = messaging
        .list_messages(ListMessagesRequest {
            thread_id: thread.id.to_string(),
            page: None,
            page_size: None,
        })
        .await?;
    for message in &page.items {
        tracing::info!(
            sender = ?message.sender_type,
            body = %message.body,
            "对话消息"
        );
    }

    // 退出前拆除全部订阅
    manager.shutdown().await?;
    Ok(())
}
