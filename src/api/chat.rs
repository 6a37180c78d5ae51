//! Conversation and message endpoints.
//!
//! Every route requires an authenticated user; conversations are scoped
//! to their owner, and a foreign conversation id is indistinguishable
//! from a missing one (404 either way).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::ai::ChatMessage;
use crate::db::{Conversation, ConversationResponse, Message, MessageResponse, User};
use crate::AppState;

use super::error::ApiError;

/// How many characters of the first message become the conversation title
const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub conversation_id: String,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageResponse>,
    pub total: usize,
}

/// Send a message and get the assistant's reply
///
/// POST /api/chat/message
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("Message content is required"));
    }

    let conversation = match &request.conversation_id {
        Some(id) => fetch_owned_conversation(&state.db, &user.id, id).await?,
        None => create_conversation(&state.db, &user.id, content).await?,
    };

    // Persist the user message before calling upstream so a failed
    // completion does not lose it
    insert_message(&state.db, &conversation.id, "user", content).await?;

    let history = recent_messages(
        &state.db,
        &conversation.id,
        state.config.ai.history_limit,
    )
    .await?;

    let mut api_messages = Vec::with_capacity(history.len() + 1);
    api_messages.push(ChatMessage::system(&state.config.ai.system_prompt));
    for message in &history {
        api_messages.push(ChatMessage::new(&message.role, &message.content));
    }

    let reply = state.ai.complete(&api_messages).await?;

    insert_message(&state.db, &conversation.id, "assistant", &reply).await?;
    sqlx::query("UPDATE conversations SET updated_at = datetime('now') WHERE id = ?")
        .bind(&conversation.id)
        .execute(&state.db)
        .await?;

    Ok(Json(SendMessageResponse {
        conversation_id: conversation.id,
        reply,
    }))
}

/// List the caller's conversations, most recently active first
///
/// GET /api/chat/conversations
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let conversations: Vec<Conversation> = sqlx::query_as(
        "SELECT * FROM conversations WHERE user_id = ? ORDER BY updated_at DESC, rowid DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let total = conversations.len();
    let conversations = conversations
        .into_iter()
        .map(ConversationResponse::from)
        .collect();

    Ok(Json(ConversationsResponse {
        conversations,
        total,
    }))
}

/// List the messages of one conversation in chronological order
///
/// GET /api/chat/conversations/:id/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let conversation = fetch_owned_conversation(&state.db, &user.id, &id).await?;

    let messages: Vec<Message> =
        sqlx::query_as("SELECT * FROM messages WHERE conversation_id = ? ORDER BY rowid ASC")
            .bind(&conversation.id)
            .fetch_all(&state.db)
            .await?;

    let total = messages.len();
    let messages = messages.into_iter().map(MessageResponse::from).collect();

    Ok(Json(MessagesResponse { messages, total }))
}

/// Delete a conversation and its messages
///
/// DELETE /api/chat/conversations/:id
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conversation = fetch_owned_conversation(&state.db, &user.id, &id).await?;

    sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
        .bind(&conversation.id)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM conversations WHERE id = ?")
        .bind(&conversation.id)
        .execute(&state.db)
        .await?;

    info!(conversation = %conversation.id, "Conversation deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a conversation only if the user owns it
async fn fetch_owned_conversation(
    pool: &crate::DbPool,
    user_id: &str,
    id: &str,
) -> Result<Conversation, ApiError> {
    let conversation: Option<Conversation> =
        sqlx::query_as("SELECT * FROM conversations WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    conversation.ok_or_else(|| ApiError::not_found("Conversation not found"))
}

/// Create a conversation titled after its first message
async fn create_conversation(
    pool: &crate::DbPool,
    user_id: &str,
    first_content: &str,
) -> Result<Conversation, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO conversations (id, user_id, title) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(user_id)
        .bind(derive_title(first_content))
        .execute(pool)
        .await?;

    let conversation: Conversation = sqlx::query_as("SELECT * FROM conversations WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;

    Ok(conversation)
}

async fn insert_message(
    pool: &crate::DbPool,
    conversation_id: &str,
    role: &str,
    content: &str,
) -> Result<(), ApiError> {
    sqlx::query("INSERT INTO messages (id, conversation_id, role, content) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .execute(pool)
        .await?;
    Ok(())
}

/// The most recent messages of a conversation, oldest first
async fn recent_messages(
    pool: &crate::DbPool,
    conversation_id: &str,
    limit: u32,
) -> Result<Vec<Message>, ApiError> {
    let mut messages: Vec<Message> = sqlx::query_as(
        "SELECT * FROM messages WHERE conversation_id = ? ORDER BY rowid DESC LIMIT ?",
    )
    .bind(conversation_id)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

fn derive_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    if content.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth;
    use crate::config::Config;
    use crate::db::{FullName, RegisterRequest, UserResponse};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_state(config: Config) -> Arc<AppState> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        Arc::new(AppState::new(config, pool))
    }

    async fn register_user(state: &Arc<AppState>, email: &str) -> User {
        let (_, Json(response)) = auth::register(
            State(state.clone()),
            Json(RegisterRequest {
                email: email.to_string(),
                full_name: FullName {
                    first_name: "Jane".to_string(),
                    last_name: "Doe".to_string(),
                },
                password: "hunter22".to_string(),
            }),
        )
        .await
        .unwrap();

        let UserResponse { id, .. } = response.user;
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await
            .unwrap()
    }

    #[test]
    fn test_derive_title_truncates_long_messages() {
        assert_eq!(derive_title("Hello"), "Hello");

        let long = "x".repeat(100);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn test_conversation_crud_flow() {
        let state = test_state(Config::default()).await;
        let user = register_user(&state, "jane@example.com").await;

        let conversation = create_conversation(&state.db, &user.id, "Hello Loura")
            .await
            .unwrap();
        insert_message(&state.db, &conversation.id, "user", "Hello Loura")
            .await
            .unwrap();
        insert_message(&state.db, &conversation.id, "assistant", "Hi Jane!")
            .await
            .unwrap();

        let Json(listed) = list_conversations(State(state.clone()), user.clone())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.conversations[0].title, "Hello Loura");

        let Json(messages) = list_messages(
            State(state.clone()),
            user.clone(),
            Path(conversation.id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(messages.total, 2);
        assert_eq!(messages.messages[0].role, "user");
        assert_eq!(messages.messages[1].role, "assistant");
        assert_eq!(messages.messages[1].content, "Hi Jane!");

        let status = delete_conversation(
            State(state.clone()),
            user.clone(),
            Path(conversation.id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(listed) = list_conversations(State(state), user).await.unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_foreign_conversation_is_not_found() {
        let state = test_state(Config::default()).await;
        let owner = register_user(&state, "jane@example.com").await;
        let intruder = register_user(&state, "john@example.com").await;

        let conversation = create_conversation(&state.db, &owner.id, "Private chat")
            .await
            .unwrap();

        let err = list_messages(
            State(state.clone()),
            intruder.clone(),
            Path(conversation.id.clone()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = delete_conversation(State(state), intruder, Path(conversation.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_message_rejects_empty_content() {
        let state = test_state(Config::default()).await;
        let user = register_user(&state, "jane@example.com").await;

        let err = send_message(
            State(state),
            user,
            Json(SendMessageRequest {
                conversation_id: None,
                content: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_message_keeps_user_message_on_upstream_failure() {
        // Point the AI client at a port that is never serving HTTP
        let mut config = Config::default();
        config.ai.base_url = "http://127.0.0.1:9".to_string();

        let state = test_state(config).await;
        let user = register_user(&state, "jane@example.com").await;

        let err = send_message(
            State(state.clone()),
            user.clone(),
            Json(SendMessageRequest {
                conversation_id: None,
                content: "Hello Loura".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        // The conversation and the user message both survived
        let Json(listed) = list_conversations(State(state.clone()), user.clone())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);

        let Json(messages) = list_messages(
            State(state),
            user,
            Path(listed.conversations[0].id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(messages.total, 1);
        assert_eq!(messages.messages[0].role, "user");
        assert_eq!(messages.messages[0].content, "Hello Loura");
    }

    #[tokio::test]
    async fn test_recent_messages_window() {
        let state = test_state(Config::default()).await;
        let user = register_user(&state, "jane@example.com").await;
        let conversation = create_conversation(&state.db, &user.id, "First")
            .await
            .unwrap();

        for i in 0..5 {
            insert_message(&state.db, &conversation.id, "user", &format!("msg {}", i))
                .await
                .unwrap();
        }

        let window = recent_messages(&state.db, &conversation.id, 3).await.unwrap();
        assert_eq!(window.len(), 3);
        // Oldest first within the window
        assert_eq!(window[0].content, "msg 2");
        assert_eq!(window[2].content, "msg 4");
    }
}
