//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ConversationStore` and `MessageStore` ports from the core crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fyp_chat_core::domain::{
    AttachmentKind, Conversation, Message, MessageKind, MessageType, NewMessage,
    ParticipantRole, TagKind, TagRef, TagSnapshot,
};
use fyp_chat_core::ports::{ConversationStore, MessageStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements both store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Translate an sqlx failure into the port taxonomy. Unique violations are
/// the conversation-pair race; foreign-key violations mean the referenced
/// conversation is gone.
fn store_error(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db) = &e {
        match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation => {
                return PortError::Conflict(e.to_string());
            }
            sqlx::error::ErrorKind::ForeignKeyViolation => {
                return PortError::NotFound(e.to_string());
            }
            _ => {}
        }
    }
    PortError::Unavailable(e.to_string())
}

fn malformed(message_id: i64, column: &str) -> PortError {
    PortError::Unavailable(format!(
        "Message {} has a malformed {} column",
        message_id, column
    ))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    student_id: Uuid,
    supervisor_id: Uuid,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ConversationRecord {
    fn to_domain(self) -> Conversation {
        Conversation {
            id: self.id,
            student_id: self.student_id,
            supervisor_id: self.supervisor_id,
            last_message_at: self.last_message_at,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    conversation_id: Uuid,
    sender_id: Uuid,
    sender_role: String,
    content: String,
    message_type: String,
    tagged_item_id: Option<Uuid>,
    tagged_title: Option<String>,
    tagged_description: Option<String>,
    tagged_status: Option<String>,
    attachment_url: Option<String>,
    attachment_name: Option<String>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, sender_role, content, \
     message_type, tagged_item_id, tagged_title, tagged_description, tagged_status, \
     attachment_url, attachment_name, is_read, read_at, created_at";

impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        let sender_role = ParticipantRole::parse(&self.sender_role)
            .ok_or_else(|| malformed(self.id, "sender_role"))?;
        let message_type = MessageType::parse(&self.message_type)
            .ok_or_else(|| malformed(self.id, "message_type"))?;

        let kind = match message_type {
            MessageType::Text => MessageKind::Text,
            MessageType::File | MessageType::Image => MessageKind::Attachment {
                kind: if message_type == MessageType::File {
                    AttachmentKind::File
                } else {
                    AttachmentKind::Image
                },
                url: self
                    .attachment_url
                    .ok_or_else(|| malformed(self.id, "attachment_url"))?,
                name: self
                    .attachment_name
                    .ok_or_else(|| malformed(self.id, "attachment_name"))?,
            },
            MessageType::DocumentTag | MessageType::TaskTag | MessageType::MilestoneTag => {
                let tag_kind = match message_type {
                    MessageType::DocumentTag => TagKind::Document,
                    MessageType::TaskTag => TagKind::Task,
                    _ => TagKind::Milestone,
                };
                MessageKind::Tag {
                    reference: TagRef {
                        kind: tag_kind,
                        id: self
                            .tagged_item_id
                            .ok_or_else(|| malformed(self.id, "tagged_item_id"))?,
                    },
                    snapshot: TagSnapshot {
                        title: self
                            .tagged_title
                            .ok_or_else(|| malformed(self.id, "tagged_title"))?,
                        description: self.tagged_description,
                        status: self.tagged_status,
                    },
                }
            }
        };

        Ok(Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            sender_role,
            content: self.content,
            kind,
            is_read: self.is_read,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

fn records_to_domain(records: Vec<MessageRecord>) -> PortResult<Vec<Message>> {
    records.into_iter().map(MessageRecord::to_domain).collect()
}

//=========================================================================================
// `ConversationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationStore for DbAdapter {
    async fn find_by_id(&self, id: Uuid) -> PortResult<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, student_id, supervisor_id, last_message_at, created_at \
             FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(record.map(ConversationRecord::to_domain))
    }

    async fn find_by_participants(
        &self,
        student_id: Uuid,
        supervisor_id: Uuid,
    ) -> PortResult<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, student_id, supervisor_id, last_message_at, created_at \
             FROM conversations WHERE student_id = $1 AND supervisor_id = $2",
        )
        .bind(student_id)
        .bind(supervisor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(record.map(ConversationRecord::to_domain))
    }

    async fn create(&self, student_id: Uuid, supervisor_id: Uuid) -> PortResult<Conversation> {
        // The UNIQUE (student_id, supervisor_id) constraint turns a
        // concurrent duplicate into a Conflict for the service to retry.
        let record = sqlx::query_as::<_, ConversationRecord>(
            "INSERT INTO conversations (id, student_id, supervisor_id) \
             VALUES ($1, $2, $3) \
             RETURNING id, student_id, supervisor_id, last_message_at, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(supervisor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(record.to_domain())
    }

    async fn list_for_participant(&self, user_id: Uuid) -> PortResult<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, student_id, supervisor_id, last_message_at, created_at \
             FROM conversations \
             WHERE student_id = $1 OR supervisor_id = $1 \
             ORDER BY last_message_at DESC NULLS LAST, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(records
            .into_iter()
            .map(ConversationRecord::to_domain)
            .collect())
    }
}

//=========================================================================================
// `MessageStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl MessageStore for DbAdapter {
    async fn append(&self, conversation_id: Uuid, message: NewMessage) -> PortResult<Message> {
        // Flatten the kind into the denormalized columns.
        let message_type = message.kind.message_type();
        let (tagged_item_id, tagged_item_type, tagged_title, tagged_description, tagged_status) =
            match &message.kind {
                MessageKind::Tag {
                    reference,
                    snapshot,
                } => (
                    Some(reference.id),
                    Some(reference.kind.as_str()),
                    Some(snapshot.title.clone()),
                    snapshot.description.clone(),
                    snapshot.status.clone(),
                ),
                _ => (None, None, None, None, None),
            };
        let (attachment_url, attachment_name) = match &message.kind {
            MessageKind::Attachment { url, name, .. } => {
                (Some(url.clone()), Some(name.clone()))
            }
            _ => (None, None),
        };

        // Insert and timestamp update share one transaction: the
        // conversation's last_message_at may never run ahead of the log,
        // and a failed append leaves nothing behind.
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO messages \
             (conversation_id, sender_id, sender_role, content, message_type, \
              tagged_item_id, tagged_item_type, tagged_title, tagged_description, \
              tagged_status, attachment_url, attachment_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .bind(message.sender_id)
        .bind(message.sender_role.as_str())
        .bind(&message.content)
        .bind(message_type.as_str())
        .bind(tagged_item_id)
        .bind(tagged_item_type)
        .bind(tagged_title)
        .bind(tagged_description)
        .bind(tagged_status)
        .bind(attachment_url)
        .bind(attachment_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)?;

        let updated = sqlx::query("UPDATE conversations SET last_message_at = $1 WHERE id = $2")
            .bind(record.created_at)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        if updated.rows_affected() == 0 {
            let _ = tx.rollback().await;
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        tx.commit().await.map_err(store_error)?;
        record.to_domain()
    }

    async fn list_page(
        &self,
        conversation_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> PortResult<(Vec<Message>, u64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await
                .map_err(store_error)?;

        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {} FROM messages WHERE conversation_id = $1 \
             ORDER BY created_at ASC, id ASC OFFSET $2 LIMIT $3",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok((records_to_domain(records)?, total as u64))
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        exclude_sender: Uuid,
        read_at: DateTime<Utc>,
    ) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE, read_at = $3 \
             WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE",
        )
        .bind(conversation_id)
        .bind(exclude_sender)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn search(
        &self,
        conversation_id: Uuid,
        needle: &str,
        type_filter: Option<MessageType>,
    ) -> PortResult<Vec<Message>> {
        let pattern = format!("%{}%", escape_like(needle));
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {} FROM messages \
             WHERE conversation_id = $1 \
               AND content ILIKE $2 \
               AND ($3::TEXT IS NULL OR message_type = $3) \
             ORDER BY created_at ASC, id ASC",
            MESSAGE_COLUMNS
        ))
        .bind(conversation_id)
        .bind(pattern)
        .bind(type_filter.map(MessageType::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        records_to_domain(records)
    }

    async fn unread_count(&self, conversation_id: Uuid, recipient_id: Uuid) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE",
        )
        .bind(conversation_id)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(count as u64)
    }
}

/// Escape LIKE metacharacters so the needle matches literally.
fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
