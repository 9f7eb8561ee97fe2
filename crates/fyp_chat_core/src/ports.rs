//! crates/fyp_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the chat core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or the
//! surrounding application's user directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Conversation, Message, MessageType, NewMessage, Participant, ParticipantRole, TagKind,
    TagSnapshot, TaggableItem,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint fired, e.g. two concurrent first-contacts
    /// creating the same conversation. Callers treat this as "already
    /// exists, retry the lookup", never as a user-visible failure.
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

/// Durable storage for the conversation records themselves.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> PortResult<Option<Conversation>>;

    /// Look up the single conversation for a participant pair, if any.
    async fn find_by_participants(
        &self,
        student_id: Uuid,
        supervisor_id: Uuid,
    ) -> PortResult<Option<Conversation>>;

    /// Insert a new conversation for the pair.
    ///
    /// Implementations must enforce pair uniqueness and surface a concurrent
    /// duplicate as `PortError::Conflict` rather than creating a second row.
    async fn create(&self, student_id: Uuid, supervisor_id: Uuid) -> PortResult<Conversation>;

    /// All conversations the user belongs to, most recently active first.
    async fn list_for_participant(&self, user_id: Uuid) -> PortResult<Vec<Conversation>>;
}

/// Durable, append-only storage for the messages of a conversation.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message, assigning its id and timestamp, and advance the
    /// owning conversation's `last_message_at` to the same instant.
    ///
    /// Both writes happen in one transaction scope: a message must never
    /// exist with a conversation timestamp ahead of it, and a failed append
    /// leaves neither behind.
    async fn append(&self, conversation_id: Uuid, message: NewMessage) -> PortResult<Message>;

    /// One slice of the conversation in `(created_at, id)` ascending order,
    /// plus the total message count.
    async fn list_page(
        &self,
        conversation_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> PortResult<(Vec<Message>, u64)>;

    /// Flag every unread message not sent by `exclude_sender` as read at
    /// `read_at`. Returns how many rows changed; already-read rows are
    /// untouched, which is what makes the operation idempotent.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        exclude_sender: Uuid,
        read_at: DateTime<Utc>,
    ) -> PortResult<u64>;

    /// Case-insensitive substring match over message content, optionally
    /// restricted to one message type, in chronological order.
    async fn search(
        &self,
        conversation_id: Uuid,
        needle: &str,
        type_filter: Option<MessageType>,
    ) -> PortResult<Vec<Message>>;

    /// How many messages in the conversation are unread from the point of
    /// view of `recipient_id` (i.e. not sent by them, not yet read).
    async fn unread_count(&self, conversation_id: Uuid, recipient_id: Uuid) -> PortResult<u64>;
}

//=========================================================================================
// External Collaborator Ports (Traits)
//=========================================================================================

/// The surrounding application's user directory. The chat core only ever
/// consumes this; account management lives elsewhere.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve an opaque session token to the authenticated participant.
    async fn resolve_token(&self, token: &str) -> PortResult<Participant>;

    /// The chat role of a known user id; `NotFound` when the id is unknown
    /// or the user is not a chat participant.
    async fn role_of(&self, user_id: Uuid) -> PortResult<ParticipantRole>;
}

/// Resolves a tag reference into the snapshot embedded in a message.
#[async_trait]
pub trait TagResolver: Send + Sync {
    async fn resolve(&self, kind: TagKind, id: Uuid) -> PortResult<TagSnapshot>;
}

/// Listings of the items a caller may tag, one method per item kind.
#[async_trait]
pub trait TaggableItemSource: Send + Sync {
    async fn accessible_documents(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>>;
    async fn accessible_tasks(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>>;
    async fn accessible_milestones(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>>;
}
