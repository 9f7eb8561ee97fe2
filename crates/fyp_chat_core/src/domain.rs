//! crates/fyp_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the chat subsystem.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Participants
//=========================================================================================

/// The role a user plays inside a conversation. Every conversation holds
/// exactly one participant of each role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantRole {
    Student,
    Supervisor,
}

impl ParticipantRole {
    /// The role sitting on the other side of a conversation.
    pub fn counterpart(self) -> ParticipantRole {
        match self {
            ParticipantRole::Student => ParticipantRole::Supervisor,
            ParticipantRole::Supervisor => ParticipantRole::Student,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantRole::Student => "student",
            ParticipantRole::Supervisor => "supervisor",
        }
    }

    pub fn parse(s: &str) -> Option<ParticipantRole> {
        match s {
            "student" => Some(ParticipantRole::Student),
            "supervisor" => Some(ParticipantRole::Supervisor),
            _ => None,
        }
    }
}

/// An authenticated caller, as resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub role: ParticipantRole,
}

//=========================================================================================
// Conversations
//=========================================================================================

/// A durable one-to-one channel between a student and a supervisor.
///
/// At most one conversation exists per pair; the pair is immutable after
/// creation and the record is never deleted in normal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Uuid,
    pub student_id: Uuid,
    pub supervisor_id: Uuid,
    /// Timestamp of the most recent message. Advanced together with every
    /// append; may lag one message behind under failure, never run ahead.
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether the given user id is one of the two participants.
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.student_id == user_id || self.supervisor_id == user_id
    }

    /// Whether the given id/role pair names one of the two participant slots.
    pub fn has_participant_as(&self, user_id: Uuid, role: ParticipantRole) -> bool {
        match role {
            ParticipantRole::Student => self.student_id == user_id,
            ParticipantRole::Supervisor => self.supervisor_id == user_id,
        }
    }
}

/// One row of the conversation overview: the conversation plus how many
/// messages are still unread for the viewing participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub unread: u64,
}

//=========================================================================================
// Tags
//=========================================================================================

/// The kind of item a message can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Document,
    Task,
    Milestone,
}

impl TagKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::Document => "document",
            TagKind::Task => "task",
            TagKind::Milestone => "milestone",
        }
    }

    pub fn parse(s: &str) -> Option<TagKind> {
        match s {
            "document" => Some(TagKind::Document),
            "task" => Some(TagKind::Task),
            "milestone" => Some(TagKind::Milestone),
            _ => None,
        }
    }
}

/// A reference to a taggable item held by an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRef {
    pub kind: TagKind,
    pub id: Uuid,
}

/// A denormalized snapshot of a tagged item, captured at send time.
///
/// Snapshots are deliberately never refreshed: the chat stays readable even
/// if the underlying item is later edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSnapshot {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// A lightweight listing record for the tag picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggableItem {
    pub id: Uuid,
    pub kind: TagKind,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// The three listings backing the tag picker, one per item kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggableItems {
    pub documents: Vec<TaggableItem>,
    pub tasks: Vec<TaggableItem>,
    pub milestones: Vec<TaggableItem>,
}

//=========================================================================================
// Messages
//=========================================================================================

/// How a file-style attachment should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    File,
    Image,
}

/// The payload variant of a message. Each variant carries exactly the fields
/// it needs; there is no struct full of optional columns at this level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain text; the content field is the whole message.
    Text,
    /// An opaque reference to a stored file or image.
    Attachment {
        kind: AttachmentKind,
        url: String,
        name: String,
    },
    /// A tagged item with its send-time snapshot.
    Tag {
        reference: TagRef,
        snapshot: TagSnapshot,
    },
}

impl MessageKind {
    /// The flat six-valued discriminant used on the wire and in storage.
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageKind::Text => MessageType::Text,
            MessageKind::Attachment { kind: AttachmentKind::File, .. } => MessageType::File,
            MessageKind::Attachment { kind: AttachmentKind::Image, .. } => MessageType::Image,
            MessageKind::Tag { reference, .. } => match reference.kind {
                TagKind::Document => MessageType::DocumentTag,
                TagKind::Task => MessageType::TaskTag,
                TagKind::Milestone => MessageType::MilestoneTag,
            },
        }
    }
}

/// The flat message-type discriminant. Used for persistence and for search
/// filtering; `MessageKind` is the structured form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Text,
    File,
    Image,
    DocumentTag,
    TaskTag,
    MilestoneTag,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::File => "file",
            MessageType::Image => "image",
            MessageType::DocumentTag => "document_tag",
            MessageType::TaskTag => "task_tag",
            MessageType::MilestoneTag => "milestone_tag",
        }
    }

    pub fn parse(s: &str) -> Option<MessageType> {
        match s {
            "text" => Some(MessageType::Text),
            "file" => Some(MessageType::File),
            "image" => Some(MessageType::Image),
            "document_tag" => Some(MessageType::DocumentTag),
            "task_tag" => Some(MessageType::TaskTag),
            "milestone_tag" => Some(MessageType::MilestoneTag),
            _ => None,
        }
    }
}

/// A persisted chat message.
///
/// Immutable after creation except for the read state, which moves one way
/// (`is_read: false -> true`) and only ever at the recipient's hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned, monotonically increasing within a conversation;
    /// breaks ordering ties between equal timestamps.
    pub id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: ParticipantRole,
    pub content: String,
    pub kind: MessageKind,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The validated input to `send_message`, before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub content: String,
    pub kind: DraftKind,
}

/// The payload variant of a draft. Tags carry only the reference here; the
/// snapshot is resolved by the service at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftKind {
    Text,
    Attachment {
        kind: AttachmentKind,
        url: String,
        name: String,
    },
    Tag(TagRef),
}

/// A fully prepared message handed to the store for appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub sender_role: ParticipantRole,
    pub content: String,
    pub kind: MessageKind,
}

//=========================================================================================
// Pagination
//=========================================================================================

/// One page of an ordered listing, with enough metadata for a client to walk
/// the whole sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-indexed page number actually served.
    pub page: u32,
    /// Page size actually served (requests above the cap are clamped).
    pub page_size: u32,
    pub total: u64,
    pub has_more: bool,
}
