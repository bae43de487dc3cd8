use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;

use parley_types::api::{ChatRequest, ChatResponse, ConversationSummary};
use parley_types::models::Message;

use crate::blocking;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Json(req), _): WithRejection<Json<ChatRequest>, AppError>,
) -> Result<Json<ChatResponse>, AppError> {
    let posted = state
        .conversations
        .post_message(&req.message, &user.email, req.conversation_id)
        .await?;

    Ok(Json(ChatResponse {
        reply: posted.reply,
        conversation_id: posted.conversation_id,
    }))
}

/// GET /api/chat/history
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let conversations = blocking(move || state.conversations.list_conversations(&user.email)).await?;

    Ok(Json(
        conversations
            .into_iter()
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title,
                created_at: c.created_at,
            })
            .collect(),
    ))
}

/// GET /api/chat/history/{id}
pub async fn conversation_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(conversation_id): Path<i64>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = blocking(move || {
        state
            .conversations
            .list_messages(conversation_id, &user.email)
    })
    .await?;
    Ok(Json(messages))
}

/// DELETE /api/chat/conversation/{id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(conversation_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    blocking(move || {
        state
            .conversations
            .delete_conversation(conversation_id, &user.email)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/chat/conversation/{id}. The body is the raw new title.
pub async fn rename_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(conversation_id): Path<i64>,
    title: String,
) -> Result<StatusCode, AppError> {
    blocking(move || {
        state
            .conversations
            .rename_conversation(conversation_id, &title, &user.email)
    })
    .await?;
    Ok(StatusCode::OK)
}
