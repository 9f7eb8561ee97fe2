//! services/api/src/adapters/identity.rs
//!
//! The identity adapter: resolves the host application's session tokens and
//! user ids into chat participants. Account management itself (signup,
//! login, password handling) stays in the host application; this adapter
//! only reads its `auth_sessions` and `users` tables.

use async_trait::async_trait;
use fyp_chat_core::domain::{Participant, ParticipantRole};
use fyp_chat_core::ports::{IdentityResolver, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A database adapter that implements the `IdentityResolver` port.
#[derive(Clone)]
pub struct DbIdentityResolver {
    pool: PgPool,
}

impl DbIdentityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ParticipantRecord {
    id: Uuid,
    role: String,
}

/// Only students and supervisors take part in chat; any other role (or an
/// unknown string) is not a participant.
fn parse_role(user_id: Uuid, role: &str) -> PortResult<ParticipantRole> {
    ParticipantRole::parse(role).ok_or_else(|| {
        PortError::NotFound(format!("User {} is not a chat participant", user_id))
    })
}

#[async_trait]
impl IdentityResolver for DbIdentityResolver {
    async fn resolve_token(&self, token: &str) -> PortResult<Participant> {
        let record = sqlx::query_as::<_, ParticipantRecord>(
            "SELECT u.id, u.role FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unavailable(e.to_string()))?
        .ok_or_else(|| PortError::NotFound("Session not found or expired".to_string()))?;

        let role = parse_role(record.id, &record.role)?;
        Ok(Participant {
            id: record.id,
            role,
        })
    }

    async fn role_of(&self, user_id: Uuid) -> PortResult<ParticipantRole> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        match role {
            Some(role) => parse_role(user_id, &role),
            None => Err(PortError::NotFound(format!("User {} not found", user_id))),
        }
    }
}
