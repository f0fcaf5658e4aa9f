use async_trait::async_trait;
use uuid::Uuid;

use super::{ChatRepository, PgStore};
use crate::domain::{ChatConversation, NewChatConversation};
use crate::infrastructure::error::AppResult;

#[async_trait]
impl ChatRepository for PgStore {
    async fn save_conversation(&self, conversation: NewChatConversation) -> AppResult<ChatConversation> {
        let saved = sqlx::query_as::<_, ChatConversation>(
            r#"
            INSERT INTO chat_conversations (user_id, user_message, ai_response, tokens_used, model)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, user_message, ai_response, tokens_used, model, created_at
            "#,
        )
        .bind(conversation.user_id)
        .bind(&conversation.user_message)
        .bind(&conversation.ai_response)
        .bind(conversation.tokens_used)
        .bind(&conversation.model)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn list_conversations(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<ChatConversation>> {
        let conversations = sqlx::query_as::<_, ChatConversation>(
            r#"
            SELECT id, user_id, user_message, ai_response, tokens_used, model, created_at
            FROM chat_conversations
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }
}
