//! Conversation history reader and turn recorder.
//!
//! A chat is created lazily at the first recorded turn, together with its
//! generated name; every later turn appends. Turns are append-only and
//! ordered by creation time.

use crate::db::DatabaseOperations;
use crate::llm::TextGenerator;
use crate::models::Chat;
use crate::pipeline::{PromptId, Turn};
use crate::types::{AppError, AppResult};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct ChatService {
    pool: PgPool,
    generator: Arc<dyn TextGenerator>,
}

impl ChatService {
    pub fn new(pool: PgPool, generator: Arc<dyn TextGenerator>) -> Self {
        Self { pool, generator }
    }

    /// Prior turns of a chat, oldest first. An unknown chat id yields the
    /// empty sequence, which the pipeline renders as an empty transcript.
    pub async fn load_history(&self, chat_id: Uuid) -> AppResult<Vec<Turn>> {
        let turns = DatabaseOperations::turns_for_chat(&self.pool, chat_id).await?;
        Ok(turns
            .into_iter()
            .map(|turn| Turn {
                human: turn.human_text,
                agent: turn.agent_text,
            })
            .collect())
    }

    /// Persist one exchange. Without a chat id this mints the chat first —
    /// name generated from the exchange, exactly once per chat. With one,
    /// the chat must exist and belong to the same agent and user; chat ids
    /// are globally unique UUIDs, but the ownership check keeps a foreign
    /// chat id from ever pulling another agent's conversation.
    pub async fn record_turn(
        &self,
        agent_id: Uuid,
        user_id: Uuid,
        chat_id: Option<Uuid>,
        human_text: &str,
        agent_text: &str,
    ) -> AppResult<Chat> {
        let chat = match chat_id {
            Some(chat_id) => {
                let chat = DatabaseOperations::find_chat(&self.pool, chat_id).await?;
                if chat.agent_id != agent_id || chat.user_id != user_id {
                    return Err(AppError::NotFound(format!("chat {chat_id}")));
                }
                chat
            }
            None => {
                let name = self.generate_chat_name(human_text, agent_text).await?;
                let chat =
                    DatabaseOperations::create_chat(&self.pool, agent_id, user_id, &name).await?;
                info!(chat_id = %chat.id, name = %chat.name, "Created chat");
                chat
            }
        };

        DatabaseOperations::insert_turn(
            &self.pool, chat.id, agent_id, user_id, human_text, agent_text,
        )
        .await?;

        Ok(chat)
    }

    async fn generate_chat_name(&self, human_text: &str, agent_text: &str) -> AppResult<String> {
        let prompt = PromptId::ChatName.render(&[("user", human_text), ("ai", agent_text)]);
        let name = self.generator.generate(&prompt).await?;
        Ok(name.trim().trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedGenerator {
        response: String,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> AppResult<String> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_chat_name_is_trimmed_and_unquoted() {
        let generator = Arc::new(FixedGenerator {
            response: "  \"Return policy questions\"  ".to_string(),
            calls: Mutex::new(0),
        });
        let service = ChatService::new(
            PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
            generator.clone(),
        );

        let name = service.generate_chat_name("Hi", "Hello!").await.unwrap();
        assert_eq!(name, "Return policy questions");
        assert_eq!(*generator.calls.lock().unwrap(), 1);
    }
}
