//! 会话参与者
//!
//! 参与者是平台账号（user）或外部联系人（contact）在某个会话中的快照，
//! 每次读取时由上游资料重新计算，不作为独立聚合持久化。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 参与者类型，创建后不可变更
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    /// 平台账号
    User,
    /// 外部联系人
    Contact,
}

impl ParticipantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Contact => "contact",
        }
    }
}

/// 会话参与者快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    id: Uuid,
    kind: ParticipantKind,
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(id: Uuid, kind: ParticipantKind, display_name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            display_name: display_name.into(),
            email: None,
            phone: None,
            last_seen_at: None,
        }
    }

    pub fn with_contact_info(mut self, email: Option<String>, phone: Option<String>) -> Self {
        self.email = email;
        self.phone = phone;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 参与者类型在创建后不可变，只读访问
    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    /// 记录参与者最近一次在线时间
    pub fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.last_seen_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_creation() {
        let id = Uuid::new_v4();
        let participant = Participant::new(id, ParticipantKind::User, "Ana");

        assert_eq!(participant.id(), id);
        assert_eq!(participant.kind(), ParticipantKind::User);
        assert_eq!(participant.display_name, "Ana");
        assert!(participant.email.is_none());
        assert!(participant.last_seen_at.is_none());
    }

    #[test]
    fn test_mark_seen() {
        let mut participant =
            Participant::new(Uuid::new_v4(), ParticipantKind::Contact, "Luis")
                .with_contact_info(Some("luis@example.com".to_string()), None);

        let now = Utc::now();
        participant.mark_seen(now);
        assert_eq!(participant.last_seen_at, Some(now));
        assert_eq!(participant.email.as_deref(), Some("luis@example.com"));
    }
}
