use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Échange stocké entre un utilisateur et l'assistant (append-only)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatConversation {
    pub id: i64,
    pub user_id: Uuid,
    pub user_message: String,
    pub ai_response: String,
    pub tokens_used: i32,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatConversation {
    pub user_id: Uuid,
    pub user_message: String,
    pub ai_response: String,
    pub tokens_used: i32,
    pub model: String,
}
