pub mod domain;
pub mod memory;
pub mod ports;
pub mod service;

pub use domain::{
    Conversation, ConversationSummary, Message, MessageDraft, MessageKind, MessageType, Page,
    Participant, ParticipantRole, TagKind, TagRef, TagSnapshot, TaggableItem, TaggableItems,
};
pub use ports::{
    ConversationStore, IdentityResolver, MessageStore, PortError, PortResult, TagResolver,
    TaggableItemSource,
};
pub use service::{ConversationService, ServiceError, ServiceResult};
