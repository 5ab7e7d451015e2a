//! 买卖双方完整对话流程的集成测试
//!
//! 用真实适配器（内存存储、静态认证、本地实时推送）串起
//! 会话创建、双向收发、批量已读、双方收件箱与实时去重。

use std::sync::{Arc, Mutex};
use std::time::Duration;

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
use domain::SenderType;
use infrastructure::{
    InMemoryChatStore, InMemoryMessageRepo, InMemoryThreadRepo, LocalRealtimeService,
    ProfileRecord, StaticAuthService,
};

struct TestEnv {
    messaging: MessagingService,
    inbox: InboxService,
    auth: Arc<StaticAuthService>,
    store: Arc<InMemoryChatStore>,
    realtime: Arc<LocalRealtimeService>,
    seller_id: Uuid,
    contact_id: Uuid,
    org_id: Uuid,
    property_id: Uuid,
}

async fn env() -> TestEnv {
    let config = ChatConfig::default();
    let store = InMemoryChatStore::new();
    let realtime = Arc::new(LocalRealtimeService::new(config.realtime.clone()));
    let thread_repo = Arc::new(InMemoryThreadRepo::new(store.clone()));
    let message_repo = Arc::new(InMemoryMessageRepo::with_realtime(
        store.clone(),
        realtime.clone(),
    ));
    let auth = Arc::new(StaticAuthService::new(AuthContext::default()));

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

    let messaging = MessagingService::new(MessagingServiceDependencies {
        thread_repo: thread_repo.clone(),
        message_repo: message_repo.clone(),
        auth: auth.clone(),
        clock: Arc::new(SystemClock),
        config: config.clone(),
    });
    let inbox = InboxService::new(InboxServiceDependencies {
        thread_repo,
        auth: auth.clone(),
        config,
    });

    TestEnv {
        messaging,
        inbox,
        auth,
        store,
        realtime,
        seller_id,
        contact_id,
        org_id,
        property_id,
    }
}

async fn as_user(env: &TestEnv, user_id: Uuid) {
    env.auth
        .set(AuthContext {
            user_id: Some(user_id),
            org_id: Some(env.org_id),
            contact_id: None,
        })
        .await;
}

async fn as_contact(env: &TestEnv, contact_id: Uuid) {
    env.auth
        .set(AuthContext {
            user_id: None,
            org_id: None,
            contact_id: Some(contact_id),
        })
        .await;
}

#[tokio::test]
async fn test_full_conversation_flow() {
    let env = env().await;

    // 卖方发起会话，重复调用拿到同一个会话
    as_user(&env, env.seller_id).await;
    let thread = env
        .messaging
        .find_or_create_thread(FindOrCreateThreadRequest {
            property_id: env.property_id.to_string(),
            org_id: Some(env.org_id.to_string()),
            lister_user_id: None,
        })
        .await
        .unwrap();
    let again = env
        .messaging
        .find_or_create_thread(FindOrCreateThreadRequest {
            property_id: env.property_id.to_string(),
            org_id: Some(env.org_id.to_string()),
            lister_user_id: None,
        })
        .await
        .unwrap();
    assert_eq!(thread.id, again.id);

    env.store
        .attach_contact(thread.id, env.contact_id)
        .await
        .unwrap();

    // 还没有对端消息，批量已读是空操作
    env.messaging
        .mark_thread_as_read(MarkThreadAsReadRequest {
            thread_id: thread.id.to_string(),
        })
        .await
        .unwrap();

    // 买方询问
    as_contact(&env, env.contact_id).await;
    let question = env
        .messaging
        .send_message(SendMessageRequest {
            thread_id: thread.id.to_string(),
            body: "Hola, ¿sigue disponible?".to_string(),
            payload: None,
        })
        .await
        .unwrap();
    assert_eq!(question.sender_type, SenderType::Contact);

    // 卖方收件箱：会话按房源分组，未读 1
    as_user(&env, env.seller_id).await;
    let inbox = env
        .inbox
        .list_lister_inbox(ListListerInboxRequest {
            property_id: None,
            page: None,
            page_size: None,
        })
        .await
        .unwrap();
    assert_eq!(inbox.groups.len(), 1);
    assert_eq!(inbox.groups[0].key, env.property_id.to_string());
    assert_eq!(
        inbox.groups[0].property.as_ref().map(|p| p.title.as_str()),
        Some("Piso céntrico en Malasaña")
    );
    assert_eq!(inbox.total_unread, 1);

    // 卖方读完并回复
    env.messaging
        .mark_thread_as_read(MarkThreadAsReadRequest {
            thread_id: thread.id.to_string(),
        })
        .await
        .unwrap();
    let inbox = env
        .inbox
        .list_lister_inbox(ListListerInboxRequest {
            property_id: None,
            page: None,
            page_size: None,
        })
        .await
        .unwrap();
    assert_eq!(inbox.total_unread, 0);

    env.messaging
        .send_message(SendMessageRequest {
            thread_id: thread.id.to_string(),
            body: "Hola, sí disponible".to_string(),
            payload: None,
        })
        .await
        .unwrap();

    // 买方收件箱是平铺列表，未读 1
    as_contact(&env, env.contact_id).await;
    let client_inbox = env
        .inbox
        .list_client_inbox(ListClientInboxRequest {
            page: None,
            page_size: None,
        })
        .await
        .unwrap();
    assert_eq!(client_inbox.items.len(), 1);
    assert_eq!(client_inbox.items[0].unread_count, 1);

    // 消息按阅读顺序返回
    let page = env
        .messaging
        .list_messages(ListMessagesRequest {
            thread_id: thread.id.to_string(),
            page: None,
            page_size: None,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].body, "Hola, ¿sigue disponible?");
    assert_eq!(page.items[1].body, "Hola, sí disponible");

    // 买方读完后双方未读都归零
    env.messaging
        .mark_thread_as_read(MarkThreadAsReadRequest {
            thread_id: thread.id.to_string(),
        })
        .await
        .unwrap();
    let client_inbox = env
        .inbox
        .list_client_inbox(ListClientInboxRequest {
            page: None,
            page_size: None,
        })
        .await
        .unwrap();
    assert_eq!(client_inbox.items[0].unread_count, 0);
}

#[tokio::test]
async fn test_realtime_delivery_with_duplicate_suppression() {
    let env = env().await;

    as_user(&env, env.seller_id).await;
    let thread = env
        .messaging
        .find_or_create_thread(FindOrCreateThreadRequest {
            property_id: env.property_id.to_string(),
            org_id: Some(env.org_id.to_string()),
            lister_user_id: None,
        })
        .await
        .unwrap();
    env.store
        .attach_contact(thread.id, env.contact_id)
        .await
        .unwrap();

    // 卖方订阅会话频道
    let manager = RealtimeSyncManager::new(env.realtime.clone());
    let received: Arc<Mutex<Vec<ChatMessageDto>>> = Arc::default();
    let sink = Arc::clone(&received);
    manager
        .subscribe(
            thread.id,
            ThreadEventHandlers::default().on_message(move |m| sink.lock().unwrap().push(m)),
        )
        .await
        .unwrap();

    // 买方发送，存储层写入后推送一次
    as_contact(&env, env.contact_id).await;
    let message = env
        .messaging
        .send_message(SendMessageRequest {
            thread_id: thread.id.to_string(),
            body: "¿Puedo visitarlo el sábado?".to_string(),
            payload: None,
        })
        .await
        .unwrap();

    // 推送网关重复投递同一条消息
    env.realtime.publish_message(message.clone()).await;
    env.realtime.publish_message(message.clone()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // at-least-once 投递经过去重后只剩一条
    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, message.id);
    }

    // 拆除订阅后不再投递
    manager.unsubscribe(thread.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    env.realtime.publish_message(message).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(received.lock().unwrap().len(), 1);
}
