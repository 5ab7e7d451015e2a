mod inbox_service;
mod messaging_service;

#[cfg(test)]
mod inbox_service_tests;

pub use inbox_service::{
    group_threads_by_property, total_unread, InboxService, InboxServiceDependencies,
    ListClientInboxRequest, ListListerInboxRequest, ListerInboxDto, PropertyGroupDto,
    NO_PROPERTY_GROUP_KEY,
};
pub use messaging_service::{
    FindOrCreateThreadRequest, ListMessagesRequest, MarkThreadAsReadRequest, MessagingService,
    MessagingServiceDependencies, SendMessageRequest,
};
