//! crates/fyp_chat_core/src/service.rs
//!
//! The conversation service: the single entry point for every chat
//! operation. Callers never touch the stores directly; this funnel is what
//! keeps the pair-uniqueness and append-atomicity invariants enforceable.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Conversation, ConversationSummary, DraftKind, Message, MessageDraft, MessageKind,
    MessageType, NewMessage, Page, Participant, ParticipantRole, TaggableItems,
};
use crate::ports::{
    ConversationStore, IdentityResolver, MessageStore, PortError, TagResolver,
    TaggableItemSource,
};

/// Page size served when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Hard ceiling on a single page; larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

//=========================================================================================
// Service Error Type
//=========================================================================================

/// The error taxonomy exposed to callers of the conversation service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The referenced conversation, counterpart, or tagged item does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The caller is authenticated but not a participant of the conversation.
    #[error("{0}")]
    Forbidden(String),
    /// Malformed input; rejected before any mutation.
    #[error("{0}")]
    Validation(String),
    /// The underlying store failed; not retried here.
    #[error("Storage failure: {0}")]
    Unavailable(String),
}

/// A convenience type alias for `Result<T, ServiceError>`.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            // A conflict that escapes the get-or-create retry path means the
            // store broke its contract; surface it as a storage failure.
            PortError::Conflict(msg) => ServiceError::Unavailable(msg),
            PortError::Unavailable(msg) => ServiceError::Unavailable(msg),
        }
    }
}

//=========================================================================================
// The Conversation Service
//=========================================================================================

/// Orchestrates conversations and messages over the store and collaborator
/// ports. Cloning is cheap; all fields are shared handles.
#[derive(Clone)]
pub struct ConversationService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    directory: Arc<dyn IdentityResolver>,
    tags: Arc<dyn TagResolver>,
    items: Arc<dyn TaggableItemSource>,
}

impl ConversationService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        directory: Arc<dyn IdentityResolver>,
        tags: Arc<dyn TagResolver>,
        items: Arc<dyn TaggableItemSource>,
    ) -> Self {
        Self {
            conversations,
            messages,
            directory,
            tags,
            items,
        }
    }

    /// Fetch the conversation and check that `requester_id` is one of its
    /// two participants. Every guarded operation goes through here first.
    async fn authorized_conversation(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> ServiceResult<Conversation> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Conversation {} not found", conversation_id))
            })?;

        if !conversation.has_participant(requester_id) {
            return Err(ServiceError::Forbidden(format!(
                "User {} is not a participant of conversation {}",
                requester_id, conversation_id
            )));
        }
        Ok(conversation)
    }

    /// Look up the conversation between the caller and `counterpart_id`,
    /// creating it on first contact.
    ///
    /// The counterpart must resolve to a user of the opposite role. Safe
    /// under concurrent first contacts: the store's uniqueness guarantee
    /// turns the losing creation into a retried lookup.
    pub async fn get_or_create_conversation(
        &self,
        caller: &Participant,
        counterpart_id: Uuid,
    ) -> ServiceResult<Conversation> {
        if counterpart_id == caller.id {
            return Err(ServiceError::Validation(
                "Cannot open a conversation with yourself".to_string(),
            ));
        }

        let expected_role = caller.role.counterpart();
        let counterpart_role = self.directory.role_of(counterpart_id).await.map_err(|e| {
            match e {
                PortError::NotFound(_) => ServiceError::NotFound(format!(
                    "No {} with id {}",
                    expected_role.as_str(),
                    counterpart_id
                )),
                other => other.into(),
            }
        })?;
        if counterpart_role != expected_role {
            return Err(ServiceError::NotFound(format!(
                "No {} with id {}",
                expected_role.as_str(),
                counterpart_id
            )));
        }

        let (student_id, supervisor_id) = match caller.role {
            ParticipantRole::Student => (caller.id, counterpart_id),
            ParticipantRole::Supervisor => (counterpart_id, caller.id),
        };

        if let Some(existing) = self
            .conversations
            .find_by_participants(student_id, supervisor_id)
            .await?
        {
            return Ok(existing);
        }

        match self.conversations.create(student_id, supervisor_id).await {
            Ok(created) => Ok(created),
            // Lost the first-contact race; the winner's row exists now.
            Err(PortError::Conflict(_)) => self
                .conversations
                .find_by_participants(student_id, supervisor_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::Unavailable(
                        "Conversation disappeared after a creation conflict".to_string(),
                    )
                }),
            Err(e) => Err(e.into()),
        }
    }

    /// Validate and append a message, resolving the tag snapshot (if any)
    /// before anything is written.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender: &Participant,
        draft: MessageDraft,
    ) -> ServiceResult<Message> {
        let conversation = self
            .authorized_conversation(conversation_id, sender.id)
            .await?;
        // The sender's role must also match the slot their id occupies.
        if !conversation.has_participant_as(sender.id, sender.role) {
            return Err(ServiceError::Forbidden(format!(
                "User {} is not the {} of conversation {}",
                sender.id,
                sender.role.as_str(),
                conversation_id
            )));
        }

        let (content, kind) = self.prepare_draft(draft).await?;

        let message = self
            .messages
            .append(
                conversation_id,
                NewMessage {
                    sender_id: sender.id,
                    sender_role: sender.role,
                    content,
                    kind,
                },
            )
            .await?;
        Ok(message)
    }

    /// Turn a draft into persistable content + kind: trim and check the
    /// content, and resolve a tag reference into its send-time snapshot.
    async fn prepare_draft(&self, draft: MessageDraft) -> ServiceResult<(String, MessageKind)> {
        let content = draft.content.trim().to_string();

        match draft.kind {
            DraftKind::Text => {
                if content.is_empty() {
                    return Err(ServiceError::Validation(
                        "Message content must not be empty".to_string(),
                    ));
                }
                Ok((content, MessageKind::Text))
            }
            DraftKind::Attachment { kind, url, name } => {
                let url = url.trim().to_string();
                let name = name.trim().to_string();
                if url.is_empty() || name.is_empty() {
                    return Err(ServiceError::Validation(
                        "Attachment messages need a URL and a name".to_string(),
                    ));
                }
                // An attachment may arrive without a caption; the name then
                // stands in as the content so it never goes empty.
                let content = if content.is_empty() { name.clone() } else { content };
                Ok((content, MessageKind::Attachment { kind, url, name }))
            }
            DraftKind::Tag(reference) => {
                if content.is_empty() {
                    return Err(ServiceError::Validation(
                        "Message content must not be empty".to_string(),
                    ));
                }
                let snapshot = self
                    .tags
                    .resolve(reference.kind, reference.id)
                    .await
                    .map_err(|e| match e {
                        PortError::NotFound(_) => ServiceError::NotFound(format!(
                            "Tagged {} {} not found",
                            reference.kind.as_str(),
                            reference.id
                        )),
                        other => other.into(),
                    })?;
                Ok((content, MessageKind::Tag { reference, snapshot }))
            }
        }
    }

    /// One page of the conversation in the canonical chronological order a
    /// chat UI renders directly, oldest first.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<Page<Message>> {
        self.authorized_conversation(conversation_id, requester_id)
            .await?;

        let page = page.unwrap_or(1);
        let requested_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page == 0 {
            return Err(ServiceError::Validation(
                "Pages are numbered from 1".to_string(),
            ));
        }
        if requested_size == 0 {
            return Err(ServiceError::Validation(
                "Page size must be positive".to_string(),
            ));
        }
        let size = requested_size.min(MAX_PAGE_SIZE);

        let offset = u64::from(page - 1) * u64::from(size);
        let (items, total) = self
            .messages
            .list_page(conversation_id, offset, u64::from(size))
            .await?;
        let has_more = offset + (items.len() as u64) < total;

        Ok(Page {
            items,
            page,
            page_size: size,
            total,
            has_more,
        })
    }

    /// Flag everything the requester has received but not read. Idempotent;
    /// the requester's own messages are never touched. Returns how many
    /// messages changed state.
    pub async fn mark_messages_as_read(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
    ) -> ServiceResult<u64> {
        self.authorized_conversation(conversation_id, requester_id)
            .await?;
        let updated = self
            .messages
            .mark_read(conversation_id, requester_id, Utc::now())
            .await?;
        Ok(updated)
    }

    /// Case-insensitive substring search over the conversation, optionally
    /// restricted to one message type. Matches come back in chronological
    /// order; no matches is an empty list, not an error.
    pub async fn search_messages(
        &self,
        conversation_id: Uuid,
        requester_id: Uuid,
        query: &str,
        type_filter: Option<MessageType>,
    ) -> ServiceResult<Vec<Message>> {
        self.authorized_conversation(conversation_id, requester_id)
            .await?;

        let needle = query.trim();
        if needle.is_empty() {
            return Err(ServiceError::Validation(
                "Search query must not be empty".to_string(),
            ));
        }

        let matches = self
            .messages
            .search(conversation_id, needle, type_filter)
            .await?;
        Ok(matches)
    }

    /// Everything the caller may tag, grouped by kind. Delegates entirely to
    /// the listing collaborators.
    pub async fn list_taggable_items(&self, caller_id: Uuid) -> ServiceResult<TaggableItems> {
        let documents = self.items.accessible_documents(caller_id).await?;
        let tasks = self.items.accessible_tasks(caller_id).await?;
        let milestones = self.items.accessible_milestones(caller_id).await?;
        Ok(TaggableItems {
            documents,
            tasks,
            milestones,
        })
    }

    /// The caller's conversation overview: most recently active first, each
    /// with its unread count.
    pub async fn list_conversations(
        &self,
        caller_id: Uuid,
    ) -> ServiceResult<Vec<ConversationSummary>> {
        let conversations = self.conversations.list_for_participant(caller_id).await?;
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let unread = self
                .messages
                .unread_count(conversation.id, caller_id)
                .await?;
            summaries.push(ConversationSummary {
                conversation,
                unread,
            });
        }
        Ok(summaries)
    }
}
