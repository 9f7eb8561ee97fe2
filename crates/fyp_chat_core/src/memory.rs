//! crates/fyp_chat_core/src/memory.rs
//!
//! In-memory implementations of the store and collaborator ports. A real
//! storage engine for small deployments and the backing for both test
//! suites; the contracts here are exactly the ones the Postgres adapters
//! satisfy, including pair uniqueness and append atomicity.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Conversation, Message, MessageType, NewMessage, Participant, ParticipantRole, TagKind,
    TagSnapshot, TaggableItem,
};
use crate::ports::{
    ConversationStore, IdentityResolver, MessageStore, PortError, PortResult, TagResolver,
    TaggableItemSource,
};

fn lock<'a, T>(mutex: &'a Mutex<T>) -> PortResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| PortError::Unavailable("store lock poisoned".to_string()))
}

//=========================================================================================
// InMemoryStore (ConversationStore + MessageStore)
//=========================================================================================

#[derive(Default)]
struct StoreState {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    next_message_id: i64,
}

/// Conversation and message storage behind a single lock, which is what
/// makes the append (message + `last_message_at`) trivially atomic.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> PortResult<Option<Conversation>> {
        let state = lock(&self.inner)?;
        Ok(state.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_participants(
        &self,
        student_id: Uuid,
        supervisor_id: Uuid,
    ) -> PortResult<Option<Conversation>> {
        let state = lock(&self.inner)?;
        Ok(state
            .conversations
            .iter()
            .find(|c| c.student_id == student_id && c.supervisor_id == supervisor_id)
            .cloned())
    }

    async fn create(&self, student_id: Uuid, supervisor_id: Uuid) -> PortResult<Conversation> {
        let mut state = lock(&self.inner)?;
        if state
            .conversations
            .iter()
            .any(|c| c.student_id == student_id && c.supervisor_id == supervisor_id)
        {
            return Err(PortError::Conflict(format!(
                "Conversation for pair ({}, {}) already exists",
                student_id, supervisor_id
            )));
        }
        let conversation = Conversation {
            id: Uuid::new_v4(),
            student_id,
            supervisor_id,
            last_message_at: None,
            created_at: Utc::now(),
        };
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn list_for_participant(&self, user_id: Uuid) -> PortResult<Vec<Conversation>> {
        let state = lock(&self.inner)?;
        let mut conversations: Vec<Conversation> = state
            .conversations
            .iter()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect();
        // Most recently active first; never-used conversations sort last.
        // Option ordering puts None lowest, so a plain descending compare
        // does the right thing.
        conversations.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(conversations)
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(&self, conversation_id: Uuid, message: NewMessage) -> PortResult<Message> {
        let mut state = lock(&self.inner)?;
        let conversation_exists = state
            .conversations
            .iter()
            .any(|c| c.id == conversation_id);
        if !conversation_exists {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        state.next_message_id += 1;
        let created_at = Utc::now();
        let stored = Message {
            id: state.next_message_id,
            conversation_id,
            sender_id: message.sender_id,
            sender_role: message.sender_role,
            content: message.content,
            kind: message.kind,
            is_read: false,
            read_at: None,
            created_at,
        };
        state.messages.push(stored.clone());

        // Same critical section as the insert: the timestamp can never run
        // ahead of the log and never lags once the append returns.
        if let Some(conversation) = state
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.last_message_at = Some(created_at);
        }
        Ok(stored)
    }

    async fn list_page(
        &self,
        conversation_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> PortResult<(Vec<Message>, u64)> {
        let state = lock(&self.inner)?;
        let mut all: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        exclude_sender: Uuid,
        read_at: DateTime<Utc>,
    ) -> PortResult<u64> {
        let mut state = lock(&self.inner)?;
        let mut updated = 0;
        for message in state
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id)
        {
            if message.sender_id != exclude_sender && !message.is_read {
                message.is_read = true;
                message.read_at = Some(read_at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn search(
        &self,
        conversation_id: Uuid,
        needle: &str,
        type_filter: Option<MessageType>,
    ) -> PortResult<Vec<Message>> {
        let state = lock(&self.inner)?;
        let needle = needle.to_lowercase();
        let mut matches: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| type_filter.map_or(true, |t| m.kind.message_type() == t))
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn unread_count(&self, conversation_id: Uuid, recipient_id: Uuid) -> PortResult<u64> {
        let state = lock(&self.inner)?;
        Ok(state
            .messages
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && m.sender_id != recipient_id
                    && !m.is_read
            })
            .count() as u64)
    }
}

//=========================================================================================
// InMemoryRoster (IdentityResolver)
//=========================================================================================

#[derive(Default)]
struct RosterState {
    roles: HashMap<Uuid, ParticipantRole>,
    sessions: HashMap<String, Uuid>,
}

/// A fixed user directory: enroll users, issue session tokens, resolve both.
#[derive(Default)]
pub struct InMemoryRoster {
    inner: Mutex<RosterState>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chat-eligible user.
    pub fn enroll(&self, user_id: Uuid, role: ParticipantRole) {
        if let Ok(mut state) = self.inner.lock() {
            state.roles.insert(user_id, role);
        }
    }

    /// Bind a session token to an enrolled user.
    pub fn issue_session(&self, token: &str, user_id: Uuid) {
        if let Ok(mut state) = self.inner.lock() {
            state.sessions.insert(token.to_string(), user_id);
        }
    }
}

#[async_trait]
impl IdentityResolver for InMemoryRoster {
    async fn resolve_token(&self, token: &str) -> PortResult<Participant> {
        let state = lock(&self.inner)?;
        let user_id = state
            .sessions
            .get(token)
            .copied()
            .ok_or_else(|| PortError::NotFound("Unknown session token".to_string()))?;
        let role = state
            .roles
            .get(&user_id)
            .copied()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(Participant { id: user_id, role })
    }

    async fn role_of(&self, user_id: Uuid) -> PortResult<ParticipantRole> {
        let state = lock(&self.inner)?;
        state
            .roles
            .get(&user_id)
            .copied()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }
}

//=========================================================================================
// InMemoryCatalog (TagResolver + TaggableItemSource)
//=========================================================================================

struct CatalogEntry {
    kind: TagKind,
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: Option<String>,
    status: Option<String>,
}

/// A mutable table of taggable items. Items can be edited after a message
/// snapshotted them, which is exactly how snapshot drift is exercised.
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: Mutex<Vec<CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        kind: TagKind,
        id: Uuid,
        owner_id: Uuid,
        title: &str,
        description: Option<&str>,
        status: Option<&str>,
    ) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(CatalogEntry {
                kind,
                id,
                owner_id,
                title: title.to_string(),
                description: description.map(str::to_string),
                status: status.map(str::to_string),
            });
        }
    }

    /// Rename an item in place, as the host application would on edit.
    pub fn set_title(&self, kind: TagKind, id: Uuid, title: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.iter_mut().find(|e| e.kind == kind && e.id == id) {
                entry.title = title.to_string();
            }
        }
    }

    fn items_of(&self, kind: TagKind, owner_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        let entries = lock(&self.entries)?;
        Ok(entries
            .iter()
            .filter(|e| e.kind == kind && e.owner_id == owner_id)
            .map(|e| TaggableItem {
                id: e.id,
                kind: e.kind,
                title: e.title.clone(),
                description: e.description.clone(),
                status: e.status.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl TagResolver for InMemoryCatalog {
    async fn resolve(&self, kind: TagKind, id: Uuid) -> PortResult<TagSnapshot> {
        let entries = lock(&self.entries)?;
        entries
            .iter()
            .find(|e| e.kind == kind && e.id == id)
            .map(|e| TagSnapshot {
                title: e.title.clone(),
                description: e.description.clone(),
                status: e.status.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("{} {} not found", kind.as_str(), id)))
    }
}

#[async_trait]
impl TaggableItemSource for InMemoryCatalog {
    async fn accessible_documents(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        self.items_of(TagKind::Document, caller_id)
    }

    async fn accessible_tasks(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        self.items_of(TagKind::Task, caller_id)
    }

    async fn accessible_milestones(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        self.items_of(TagKind::Milestone, caller_id)
    }
}
