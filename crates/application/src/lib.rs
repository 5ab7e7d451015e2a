//! 应用层实现。
//!
//! 围绕消息领域模型的用例服务：输入校验、身份解析即授权、
//! 对外部适配器（存储、认证、实时推送）的端口抽象，
//! 以及把推送事件桥接进进程内状态的实时同步层。

pub mod auth;
pub mod clock;
pub mod dto;
pub mod error;
pub mod identity;
pub mod mappers;
pub mod realtime;
pub mod repository;
pub mod services;

pub use auth::{AuthContext, AuthService};
pub use clock::{Clock, SystemClock};
pub use dto::{ChatMessageDto, ChatParticipantDto, ChatThreadDto, PageDto, PropertySummaryDto};
pub use error::{ChatError, ChatResult};
pub use identity::CallerIdentity;
pub use realtime::{
    ConversationView, DeliveredEvent, RealtimeService, RealtimeSyncManager, ThreadEvent,
    ThreadEventHandlers, TypingEvent,
};
pub use repository::{ChatMessageRepo, ChatThreadRepo, NewMessage, ThreadFilters};
pub use services::{
    FindOrCreateThreadRequest, InboxService, InboxServiceDependencies, ListClientInboxRequest,
    ListListerInboxRequest, ListMessagesRequest, ListerInboxDto, MarkThreadAsReadRequest,
    MessagingService, MessagingServiceDependencies, PropertyGroupDto, SendMessageRequest,
};
