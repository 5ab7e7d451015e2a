//! 收件箱服务单元测试

#[cfg(test)]
mod inbox_service_tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use config::ChatConfig;
    use domain::ThreadStatus;
    use uuid::Uuid;

    use crate::auth::{AuthContext, AuthService};
    use crate::dto::{ChatThreadDto, PageDto, PropertySummaryDto};
    use crate::error::ChatResult;
    use crate::repository::{ChatThreadRepo, ThreadFilters};
    use crate::services::inbox_service::{
        InboxService, InboxServiceDependencies, ListClientInboxRequest, ListListerInboxRequest,
    };

    /// 记录调用参数并返回预置页的会话存储假件
    #[derive(Default)]
    struct FakeThreadRepo {
        lister_page: Mutex<Vec<ChatThreadDto>>,
        contact_page: Mutex<Vec<ChatThreadDto>>,
        lister_calls: Mutex<Vec<(Uuid, Option<Uuid>, Option<Uuid>)>>,
        contact_calls: Mutex<Vec<(Uuid, Option<Uuid>)>>,
    }

    #[async_trait]
    impl ChatThreadRepo for FakeThreadRepo {
        async fn list_for_lister(
            &self,
            filters: &ThreadFilters,
            user_id: Uuid,
            org_id: Option<Uuid>,
        ) -> ChatResult<PageDto<ChatThreadDto>> {
            self.lister_calls
                .lock()
                .unwrap()
                .push((user_id, org_id, filters.property_id));
            let items = self.lister_page.lock().unwrap().clone();
            let total = items.len() as u64;
            Ok(PageDto::new(items, total, filters.page, filters.page_size))
        }

        async fn list_for_contact(
            &self,
            filters: &ThreadFilters,
            contact_id: Uuid,
            org_id: Option<Uuid>,
        ) -> ChatResult<PageDto<ChatThreadDto>> {
            self.contact_calls.lock().unwrap().push((contact_id, org_id));
            let items = self.contact_page.lock().unwrap().clone();
            let total = items.len() as u64;
            Ok(PageDto::new(items, total, filters.page, filters.page_size))
        }

        async fn get_by_id(&self, _id: Uuid) -> ChatResult<Option<ChatThreadDto>> {
            Ok(None)
        }

        async fn touch_last_message_at(&self, _id: Uuid, _at: &str) -> ChatResult<()> {
            Ok(())
        }

        async fn find_by_property_and_user(
            &self,
            _property_id: Uuid,
            _user_id: Uuid,
        ) -> ChatResult<Option<ChatThreadDto>> {
            Ok(None)
        }

        async fn create(
            &self,
            _org_id: Option<Uuid>,
            _property_id: Uuid,
            _created_by: Uuid,
        ) -> ChatResult<ChatThreadDto> {
            unreachable!("收件箱测试不创建会话")
        }

        async fn add_participants(&self, _thread_id: Uuid, _user_ids: &[Uuid]) -> ChatResult<()> {
            Ok(())
        }

        async fn delete(&self, _id: Uuid) -> ChatResult<()> {
            Ok(())
        }
    }

    struct FakeAuth(AuthContext);

    #[async_trait]
    impl AuthService for FakeAuth {
        async fn get_current(&self) -> ChatResult<AuthContext> {
            Ok(self.0.clone())
        }
    }

    fn thread(property_id: Option<Uuid>, last_message_at: Option<&str>, unread: u32) -> ChatThreadDto {
        ChatThreadDto {
            id: Uuid::new_v4(),
            org_id: None,
            property: property_id.map(|id| PropertySummaryDto {
                id,
                title: "Chalet adosado".to_string(),
                price: None,
                cover_image_url: None,
            }),
            contact_id: Some(Uuid::new_v4()),
            created_by: Some(Uuid::new_v4()),
            participants: Vec::new(),
            created_at: "2026-03-01T08:00:00.000000Z".to_string(),
            last_message_at: last_message_at.map(str::to_string),
            unread_count: unread,
            status: ThreadStatus::Open,
        }
    }

    fn service(repo: Arc<FakeThreadRepo>, auth: AuthContext) -> InboxService {
        InboxService::new(InboxServiceDependencies {
            thread_repo: repo,
            auth: Arc::new(FakeAuth(auth)),
            config: ChatConfig::default(),
        })
    }

    #[tokio::test]
    async fn test_lister_inbox_groups_current_page() {
        let repo = Arc::new(FakeThreadRepo::default());
        let property = Uuid::new_v4();
        *repo.lister_page.lock().unwrap() = vec![
            thread(Some(property), Some("2026-03-01T10:00:00.000000Z"), 2),
            thread(Some(property), Some("2026-03-01T09:00:00.000000Z"), 1),
            thread(None, None, 4),
        ];
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let service = service(
            repo.clone(),
            AuthContext {
                user_id: Some(user_id),
                org_id: Some(org_id),
                contact_id: None,
            },
        );

        let inbox = service
            .list_lister_inbox(ListListerInboxRequest {
                property_id: None,
                page: None,
                page_size: None,
            })
            .await
            .unwrap();

        assert_eq!(inbox.groups.len(), 2);
        assert_eq!(inbox.groups[0].key, property.to_string());
        assert_eq!(inbox.groups[0].unread_count, 3);
        assert_eq!(inbox.total_unread, 7);
        assert_eq!(inbox.total, 3);

        // 组织范围透传给存储层
        let calls = repo.lister_calls.lock().unwrap();
        assert_eq!(calls[0], (user_id, Some(org_id), None));
    }

    #[tokio::test]
    async fn test_lister_inbox_passes_property_filter() {
        let repo = Arc::new(FakeThreadRepo::default());
        let property = Uuid::new_v4();
        let service = service(
            repo.clone(),
            AuthContext {
                user_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        );

        service
            .list_lister_inbox(ListListerInboxRequest {
                property_id: Some(property.to_string()),
                page: None,
                page_size: None,
            })
            .await
            .unwrap();

        assert_eq!(repo.lister_calls.lock().unwrap()[0].2, Some(property));
    }

    #[tokio::test]
    async fn test_lister_inbox_rejects_malformed_property_id() {
        let repo = Arc::new(FakeThreadRepo::default());
        let service = service(
            repo,
            AuthContext {
                user_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
        );

        let err = service
            .list_lister_inbox(ListListerInboxRequest {
                property_id: Some("not-a-uuid".to_string()),
                page: None,
                page_size: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn test_lister_inbox_requires_user_identity() {
        let repo = Arc::new(FakeThreadRepo::default());
        let service = service(repo, AuthContext::default());

        let err = service
            .list_lister_inbox(ListListerInboxRequest {
                property_id: None,
                page: None,
                page_size: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_identity");
    }

    #[tokio::test]
    async fn test_client_inbox_is_flat_for_contact() {
        let repo = Arc::new(FakeThreadRepo::default());
        *repo.contact_page.lock().unwrap() = vec![
            thread(Some(Uuid::new_v4()), Some("2026-03-01T10:00:00.000000Z"), 1),
            thread(Some(Uuid::new_v4()), Some("2026-03-01T09:00:00.000000Z"), 0),
        ];
        let contact_id = Uuid::new_v4();
        let service = service(
            repo.clone(),
            AuthContext {
                contact_id: Some(contact_id),
                ..Default::default()
            },
        );

        let page = service
            .list_client_inbox(ListClientInboxRequest {
                page: None,
                page_size: None,
            })
            .await
            .unwrap();

        // 每个会话一条，不分组
        assert_eq!(page.items.len(), 2);
        assert_eq!(repo.contact_calls.lock().unwrap()[0].0, contact_id);
    }

    #[tokio::test]
    async fn test_client_inbox_for_plain_user_drops_org_scope() {
        let repo = Arc::new(FakeThreadRepo::default());
        let user_id = Uuid::new_v4();
        let service = service(
            repo.clone(),
            AuthContext {
                user_id: Some(user_id),
                org_id: Some(Uuid::new_v4()),
                contact_id: None,
            },
        );

        service
            .list_client_inbox(ListClientInboxRequest {
                page: None,
                page_size: None,
            })
            .await
            .unwrap();

        // 买方视角按个人而不是组织读取
        assert_eq!(repo.lister_calls.lock().unwrap()[0], (user_id, None, None));
    }

    #[tokio::test]
    async fn test_client_inbox_rejects_anonymous_caller() {
        let repo = Arc::new(FakeThreadRepo::default());
        let service = service(repo, AuthContext::default());

        let err = service
            .list_client_inbox(ListClientInboxRequest {
                page: None,
                page_size: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_identity");
    }
}
