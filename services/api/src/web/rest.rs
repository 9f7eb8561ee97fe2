//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use fyp_chat_core::domain::{
    AttachmentKind, Conversation, ConversationSummary, DraftKind, Message, MessageDraft,
    MessageKind, MessageType, Participant, ParticipantRole, TagKind, TagRef, TaggableItem,
};
use fyp_chat_core::service::ServiceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_conversations_handler,
        open_conversation_handler,
        list_messages_handler,
        send_message_handler,
        mark_read_handler,
        search_messages_handler,
        taggable_items_handler,
    ),
    components(
        schemas(
            ConversationResponse,
            ConversationSummaryResponse,
            MessageResponse,
            MessageListResponse,
            SendMessageRequest,
            MarkReadResponse,
            TagSnapshotResponse,
            TaggableItemResponse,
            TaggableItemsResponse,
            MessageTypeDto,
            TagKindDto,
            RoleDto,
        )
    ),
    tags(
        (name = "FYP Chat API", description = "Student/supervisor messaging endpoints of the FYP portal.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Wire Enums
//=========================================================================================

/// The message type discriminant as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageTypeDto {
    Text,
    File,
    Image,
    DocumentTag,
    TaskTag,
    MilestoneTag,
}

impl From<MessageType> for MessageTypeDto {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Text => MessageTypeDto::Text,
            MessageType::File => MessageTypeDto::File,
            MessageType::Image => MessageTypeDto::Image,
            MessageType::DocumentTag => MessageTypeDto::DocumentTag,
            MessageType::TaskTag => MessageTypeDto::TaskTag,
            MessageType::MilestoneTag => MessageTypeDto::MilestoneTag,
        }
    }
}

impl From<MessageTypeDto> for MessageType {
    fn from(t: MessageTypeDto) -> Self {
        match t {
            MessageTypeDto::Text => MessageType::Text,
            MessageTypeDto::File => MessageType::File,
            MessageTypeDto::Image => MessageType::Image,
            MessageTypeDto::DocumentTag => MessageType::DocumentTag,
            MessageTypeDto::TaskTag => MessageType::TaskTag,
            MessageTypeDto::MilestoneTag => MessageType::MilestoneTag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TagKindDto {
    Document,
    Task,
    Milestone,
}

impl From<TagKind> for TagKindDto {
    fn from(k: TagKind) -> Self {
        match k {
            TagKind::Document => TagKindDto::Document,
            TagKind::Task => TagKindDto::Task,
            TagKind::Milestone => TagKindDto::Milestone,
        }
    }
}

impl From<TagKindDto> for TagKind {
    fn from(k: TagKindDto) -> Self {
        match k {
            TagKindDto::Document => TagKind::Document,
            TagKindDto::Task => TagKind::Task,
            TagKindDto::Milestone => TagKind::Milestone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoleDto {
    Student,
    Supervisor,
}

impl From<ParticipantRole> for RoleDto {
    fn from(r: ParticipantRole) -> Self {
        match r {
            ParticipantRole::Student => RoleDto::Student,
            ParticipantRole::Supervisor => RoleDto::Supervisor,
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub supervisor_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            student_id: c.student_id,
            supervisor_id: c.supervisor_id,
            last_message_at: c.last_message_at,
            created_at: c.created_at,
        }
    }
}

/// One row of the conversation overview.
#[derive(Serialize, ToSchema)]
pub struct ConversationSummaryResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub supervisor_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub unread: u64,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(s: ConversationSummary) -> Self {
        Self {
            id: s.conversation.id,
            student_id: s.conversation.student_id,
            supervisor_id: s.conversation.supervisor_id,
            last_message_at: s.conversation.last_message_at,
            created_at: s.conversation.created_at,
            unread: s.unread,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TagSnapshotResponse {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A message in the flat wire shape the chat UI consumes. Tag and attachment
/// fields are present only for the matching message types.
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: RoleDto,
    pub content: String,
    pub message_type: MessageTypeDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagged_item_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagged_item_type: Option<TagKindDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagged_item_data: Option<TagSnapshotResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        let message_type = MessageTypeDto::from(m.kind.message_type());
        let mut response = Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            sender_role: m.sender_role.into(),
            content: m.content,
            message_type,
            tagged_item_id: None,
            tagged_item_type: None,
            tagged_item_data: None,
            attachment_url: None,
            attachment_name: None,
            is_read: m.is_read,
            read_at: m.read_at,
            created_at: m.created_at,
        };
        match m.kind {
            MessageKind::Text => {}
            MessageKind::Attachment { url, name, .. } => {
                response.attachment_url = Some(url);
                response.attachment_name = Some(name);
            }
            MessageKind::Tag {
                reference,
                snapshot,
            } => {
                response.tagged_item_id = Some(reference.id);
                response.tagged_item_type = Some(reference.kind.into());
                response.tagged_item_data = Some(TagSnapshotResponse {
                    title: snapshot.title,
                    description: snapshot.description,
                    status: snapshot.status,
                });
            }
        }
        response
    }
}

/// One page of messages plus the metadata needed to walk the rest.
#[derive(Serialize, ToSchema)]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Serialize, ToSchema)]
pub struct MarkReadResponse {
    /// How many messages changed from unread to read.
    pub updated: u64,
}

#[derive(Serialize, ToSchema)]
pub struct TaggableItemResponse {
    pub id: Uuid,
    pub item_type: TagKindDto,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl From<TaggableItem> for TaggableItemResponse {
    fn from(item: TaggableItem) -> Self {
        Self {
            id: item.id,
            item_type: item.kind.into(),
            title: item.title,
            description: item.description,
            status: item.status,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TaggableItemsResponse {
    pub documents: Vec<TaggableItemResponse>,
    pub tasks: Vec<TaggableItemResponse>,
    pub milestones: Vec<TaggableItemResponse>,
}

/// The request body for sending a message. `message_type` defaults to
/// `text`; tag types additionally need `tagged_item_id`, file and image
/// types need the attachment fields.
#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<MessageTypeDto>,
    #[serde(default)]
    pub tagged_item_id: Option<Uuid>,
    #[serde(default)]
    pub tagged_item_type: Option<TagKindDto>,
    #[serde(default)]
    pub attachment_url: Option<String>,
    #[serde(default)]
    pub attachment_name: Option<String>,
}

impl SendMessageRequest {
    /// Structural validation: the per-type required fields of the flat wire
    /// shape become the compile-time-enforced draft union.
    fn into_draft(self) -> Result<MessageDraft, String> {
        let content = self.content.unwrap_or_default();
        let message_type = self.message_type.unwrap_or(MessageTypeDto::Text);

        let kind = match message_type {
            MessageTypeDto::Text => DraftKind::Text,
            MessageTypeDto::File | MessageTypeDto::Image => {
                let url = self
                    .attachment_url
                    .ok_or("attachment_url is required for file and image messages")?;
                let name = self
                    .attachment_name
                    .ok_or("attachment_name is required for file and image messages")?;
                let kind = if message_type == MessageTypeDto::File {
                    AttachmentKind::File
                } else {
                    AttachmentKind::Image
                };
                DraftKind::Attachment { kind, url, name }
            }
            MessageTypeDto::DocumentTag | MessageTypeDto::TaskTag | MessageTypeDto::MilestoneTag => {
                let id = self
                    .tagged_item_id
                    .ok_or("tagged_item_id is required for tag messages")?;
                let kind = match message_type {
                    MessageTypeDto::DocumentTag => TagKind::Document,
                    MessageTypeDto::TaskTag => TagKind::Task,
                    _ => TagKind::Milestone,
                };
                if let Some(declared) = self.tagged_item_type {
                    if TagKind::from(declared) != kind {
                        return Err("tagged_item_type does not match message_type".to_string());
                    }
                }
                DraftKind::Tag(TagRef { kind, id })
            }
        };
        Ok(MessageDraft { content, kind })
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: String,
    #[serde(rename = "type")]
    pub message_type: Option<MessageTypeDto>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Map a service error onto the HTTP status space. Storage failures are
/// logged and hidden behind a generic body; everything else carries its
/// message to the client.
fn reject(err: ServiceError) -> (StatusCode, String) {
    match &err {
        ServiceError::NotFound(_) => {
            debug!("Request rejected: {}", err);
            (StatusCode::NOT_FOUND, err.to_string())
        }
        ServiceError::Forbidden(_) => {
            debug!("Request rejected: {}", err);
            (StatusCode::FORBIDDEN, err.to_string())
        }
        ServiceError::Validation(_) => {
            debug!("Request rejected: {}", err);
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ServiceError::Unavailable(_) => {
            error!("Storage failure: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// List the caller's conversations, most recently active first, with unread
/// counts.
#[utoipa::path(
    get,
    path = "/conversations",
    responses(
        (status = 200, description = "The caller's conversation overview", body = [ConversationSummaryResponse]),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Participant>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let summaries = state
        .chat
        .list_conversations(caller.id)
        .await
        .map_err(reject)?;
    let body: Vec<ConversationSummaryResponse> = summaries
        .into_iter()
        .map(ConversationSummaryResponse::from)
        .collect();
    Ok(Json(body))
}

/// Look up the conversation with a counterpart, creating it on first contact.
#[utoipa::path(
    get,
    path = "/conversations/with/{counterpart_id}",
    params(
        ("counterpart_id" = Uuid, Path, description = "The user on the other side; must hold the opposite role.")
    ),
    responses(
        (status = 200, description = "The existing or newly created conversation", body = ConversationResponse),
        (status = 404, description = "No user of the expected role with this id"),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn open_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Participant>,
    Path(counterpart_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let conversation = state
        .chat
        .get_or_create_conversation(&caller, counterpart_id)
        .await
        .map_err(reject)?;
    Ok(Json(ConversationResponse::from(conversation)))
}

/// One page of a conversation, oldest first.
#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "The conversation to read."),
        ("page" = Option<u32>, Query, description = "1-indexed page number, default 1."),
        ("page_size" = Option<u32>, Query, description = "Messages per page, default 50, capped at 100.")
    ),
    responses(
        (status = 200, description = "One page of messages in chronological order", body = MessageListResponse),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "No such conversation")
    )
)]
pub async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Participant>,
    Path(id): Path<Uuid>,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let page = state
        .chat
        .list_messages(id, caller.id, params.page, params.page_size)
        .await
        .map_err(reject)?;
    Ok(Json(MessageListResponse {
        messages: page.items.into_iter().map(MessageResponse::from).collect(),
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        has_more: page.has_more,
    }))
}

/// Send a message into a conversation.
#[utoipa::path(
    post,
    path = "/conversations/{id}/messages",
    params(
        ("id" = Uuid, Path, description = "The conversation to send into.")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "The persisted message", body = MessageResponse),
        (status = 400, description = "Empty content or malformed tag/attachment fields"),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "No such conversation or tagged item")
    )
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Participant>,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let draft = body.into_draft().map_err(|msg| {
        debug!("Malformed send request: {}", msg);
        (StatusCode::BAD_REQUEST, msg)
    })?;
    let message = state
        .chat
        .send_message(id, &caller, draft)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Mark everything the caller has received in this conversation as read.
#[utoipa::path(
    put,
    path = "/conversations/{id}/messages/read",
    params(
        ("id" = Uuid, Path, description = "The conversation to mark.")
    ),
    responses(
        (status = 200, description = "How many messages were newly marked", body = MarkReadResponse),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "No such conversation")
    )
)]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Participant>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let updated = state
        .chat
        .mark_messages_as_read(id, caller.id)
        .await
        .map_err(reject)?;
    Ok(Json(MarkReadResponse { updated }))
}

/// Search a conversation's messages by content substring.
#[utoipa::path(
    get,
    path = "/conversations/{id}/messages/search",
    params(
        ("id" = Uuid, Path, description = "The conversation to search."),
        ("query" = String, Query, description = "Case-insensitive substring to look for."),
        ("type" = Option<MessageTypeDto>, Query, description = "Restrict matches to one message type.")
    ),
    responses(
        (status = 200, description = "Matches in chronological order", body = [MessageResponse]),
        (status = 400, description = "Empty query"),
        (status = 403, description = "Caller is not a participant")
    )
)]
pub async fn search_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Participant>,
    Path(id): Path<Uuid>,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let matches = state
        .chat
        .search_messages(
            id,
            caller.id,
            &params.query,
            params.message_type.map(MessageType::from),
        )
        .await
        .map_err(reject)?;
    let body: Vec<MessageResponse> = matches.into_iter().map(MessageResponse::from).collect();
    Ok(Json(body))
}

/// Everything the caller may tag in a message, grouped by kind.
#[utoipa::path(
    get,
    path = "/taggable-items",
    responses(
        (status = 200, description = "The caller's documents, tasks and milestones", body = TaggableItemsResponse),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn taggable_items_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Participant>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let items = state
        .chat
        .list_taggable_items(caller.id)
        .await
        .map_err(reject)?;
    Ok(Json(TaggableItemsResponse {
        documents: items
            .documents
            .into_iter()
            .map(TaggableItemResponse::from)
            .collect(),
        tasks: items
            .tasks
            .into_iter()
            .map(TaggableItemResponse::from)
            .collect(),
        milestones: items
            .milestones
            .into_iter()
            .map(TaggableItemResponse::from)
            .collect(),
    }))
}
