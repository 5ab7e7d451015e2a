pub mod message;
pub mod participant;
pub mod thread;

pub use message::{ChatMessage, ChatMessageSnapshot, MessageStatus, SenderType};
pub use participant::{Participant, ParticipantKind};
pub use thread::{ChatThread, ChatThreadSnapshot, PropertySummary, ThreadStatus};
