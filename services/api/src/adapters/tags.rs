//! services/api/src/adapters/tags.rs
//!
//! The tag catalog adapter: reads the host application's document, task and
//! milestone tables to resolve tag snapshots and list what a caller may tag.

use async_trait::async_trait;
use fyp_chat_core::domain::{TagKind, TagSnapshot, TaggableItem};
use fyp_chat_core::ports::{PortError, PortResult, TagResolver, TaggableItemSource};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A database adapter that implements the `TagResolver` and
/// `TaggableItemSource` ports.
#[derive(Clone)]
pub struct DbTagCatalog {
    pool: PgPool,
}

impl DbTagCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_of(&self, kind: TagKind, caller_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        let records = sqlx::query_as::<_, ItemRecord>(&format!(
            "SELECT id, title, description, status FROM {} \
             WHERE owner_id = $1 ORDER BY created_at ASC",
            table_for(kind)
        ))
        .bind(caller_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unavailable(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(|r| TaggableItem {
                id: r.id,
                kind,
                title: r.title,
                description: r.description,
                status: r.status,
            })
            .collect())
    }
}

/// The three item kinds live in three host-application tables of the same
/// shape.
fn table_for(kind: TagKind) -> &'static str {
    match kind {
        TagKind::Document => "documents",
        TagKind::Task => "tasks",
        TagKind::Milestone => "milestones",
    }
}

#[derive(FromRow)]
struct SnapshotRecord {
    title: String,
    description: Option<String>,
    status: Option<String>,
}

#[derive(FromRow)]
struct ItemRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: Option<String>,
}

#[async_trait]
impl TagResolver for DbTagCatalog {
    async fn resolve(&self, kind: TagKind, id: Uuid) -> PortResult<TagSnapshot> {
        let record = sqlx::query_as::<_, SnapshotRecord>(&format!(
            "SELECT title, description, status FROM {} WHERE id = $1",
            table_for(kind)
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unavailable(e.to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("{} {} not found", kind.as_str(), id)))?;

        Ok(TagSnapshot {
            title: record.title,
            description: record.description,
            status: record.status,
        })
    }
}

#[async_trait]
impl TaggableItemSource for DbTagCatalog {
    async fn accessible_documents(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        self.items_of(TagKind::Document, caller_id).await
    }

    async fn accessible_tasks(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        self.items_of(TagKind::Task, caller_id).await
    }

    async fn accessible_milestones(&self, caller_id: Uuid) -> PortResult<Vec<TaggableItem>> {
        self.items_of(TagKind::Milestone, caller_id).await
    }
}
