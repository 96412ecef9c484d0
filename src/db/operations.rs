use crate::models::{Agent, Chat, ConversationTurn, User};
use crate::types::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct DatabaseOperations;

impl DatabaseOperations {
    // User operations

    pub async fn find_user(pool: &PgPool, user_id: Uuid) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        user.ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }

    // Agent operations

    #[allow(clippy::too_many_arguments)]
    pub async fn create_agent(
        pool: &PgPool,
        owner_id: Uuid,
        name: &str,
        store_name: &str,
        context: &str,
        description: &str,
        picture_url: Option<&str>,
        training_files: &serde_json::Value,
    ) -> AppResult<Agent> {
        let agent = sqlx::query_as::<_, Agent>(
            r#"
            INSERT INTO agents (id, owner_id, name, store_name, context, description, picture_url, training_files)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(name)
        .bind(store_name)
        .bind(context)
        .bind(description)
        .bind(picture_url)
        .bind(training_files)
        .fetch_one(pool)
        .await?;

        Ok(agent)
    }

    pub async fn find_agent(pool: &PgPool, agent_id: Uuid) -> AppResult<Agent> {
        let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(agent_id)
            .fetch_optional(pool)
            .await?;

        agent.ok_or_else(|| AppError::NotFound(format!("agent {agent_id}")))
    }

    pub async fn find_agent_by_name(
        pool: &PgPool,
        owner_id: Uuid,
        name: &str,
    ) -> AppResult<Option<Agent>> {
        let agent =
            sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE owner_id = $1 AND name = $2")
                .bind(owner_id)
                .bind(name)
                .fetch_optional(pool)
                .await?;

        Ok(agent)
    }

    pub async fn list_agents(pool: &PgPool, owner_id: Uuid) -> AppResult<Vec<Agent>> {
        let agents = sqlx::query_as::<_, Agent>(
            "SELECT * FROM agents WHERE owner_id = $1 ORDER BY created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(agents)
    }

    pub async fn update_agent_profile(
        pool: &PgPool,
        agent_id: Uuid,
        context: &str,
        description: &str,
        picture_url: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE agents SET context = $1, description = $2, picture_url = $3 WHERE id = $4",
        )
        .bind(context)
        .bind(description)
        .bind(picture_url)
        .bind(agent_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Rename inside the caller's transaction; the knowledge-store rename
    /// joins the same transaction so both land or neither does.
    pub async fn rename_agent(
        tx: &mut Transaction<'_, Postgres>,
        agent_id: Uuid,
        name: &str,
        store_name: &str,
    ) -> AppResult<()> {
        sqlx::query("UPDATE agents SET name = $1, store_name = $2 WHERE id = $3")
            .bind(name)
            .bind(store_name)
            .bind(agent_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    // Chat operations

    pub async fn create_chat(
        pool: &PgPool,
        agent_id: Uuid,
        user_id: Uuid,
        name: &str,
    ) -> AppResult<Chat> {
        let chat = sqlx::query_as::<_, Chat>(
            r#"
            INSERT INTO chats (id, agent_id, user_id, name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(agent_id)
        .bind(user_id)
        .bind(name)
        .fetch_one(pool)
        .await?;

        Ok(chat)
    }

    pub async fn find_chat(pool: &PgPool, chat_id: Uuid) -> AppResult<Chat> {
        let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(pool)
            .await?;

        chat.ok_or_else(|| AppError::NotFound(format!("chat {chat_id}")))
    }

    // Conversation turn operations

    pub async fn insert_turn(
        pool: &PgPool,
        chat_id: Uuid,
        agent_id: Uuid,
        user_id: Uuid,
        human_text: &str,
        agent_text: &str,
    ) -> AppResult<ConversationTurn> {
        let turn = sqlx::query_as::<_, ConversationTurn>(
            r#"
            INSERT INTO conversation_turns (id, chat_id, agent_id, user_id, human_text, agent_text)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(agent_id)
        .bind(user_id)
        .bind(human_text)
        .bind(agent_text)
        .fetch_one(pool)
        .await?;

        Ok(turn)
    }

    pub async fn turns_for_chat(pool: &PgPool, chat_id: Uuid) -> AppResult<Vec<ConversationTurn>> {
        let turns = sqlx::query_as::<_, ConversationTurn>(
            r#"
            SELECT * FROM conversation_turns
            WHERE chat_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(pool)
        .await?;

        Ok(turns)
    }
}
