use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use devhub_db::queries::History;
use devhub_types::api::{
    Claims, ConversationPartner, MarkMessagesReadRequest, MarkReadResponse, SendMessageRequest,
};
use devhub_types::events::{GatewayEvent, MessagePayload};
use devhub_types::models::{Message, NotificationKind};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::notify::notify;
use crate::state::{AppState, run_db};

const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Without a limit the whole conversation is returned.
    pub limit: Option<u32>,
    /// Cursor: id of the oldest message the client already has.
    pub before: Option<Uuid>,
}

/// Persist a message, notify the receiver, and push it live if they are
/// connected. Only the persistence step can fail the request.
pub async fn send_message(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let sender_id = claims.sub;

    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is required"));
    }
    if receiver_id == sender_id {
        return Err(ApiError::BadRequest("Cannot message yourself"));
    }

    let (sid, rid) = (sender_id.clone(), receiver_id.clone());
    let (sender_exists, receiver_exists) =
        run_db(&state, move |db| Ok((db.user_exists(&sid)?, db.user_exists(&rid)?))).await?;
    if !sender_exists {
        return Err(ApiError::NotFound("Complete your profile before messaging"));
    }
    if !receiver_exists {
        return Err(ApiError::NotFound("Receiver not found"));
    }

    let (sid, rid) = (sender_id.clone(), receiver_id.clone());
    let row = run_db(&state, move |db| db.insert_message(&sid, &rid, &req.content)).await?;
    let message = convert::message(row);

    notify(&state, NotificationKind::Message, &receiver_id, &sender_id, None).await;

    let delivered = state
        .dispatcher
        .send_to_user(
            &receiver_id,
            GatewayEvent::NewMessage(MessagePayload::Stored(Box::new(message.clone()))),
        )
        .await;
    debug!("Message {} -> {} (live: {})", message.id, receiver_id, delivered);

    Ok((StatusCode::CREATED, Json(message)))
}

/// History with one counterpart, oldest first. Identical for both participants.
pub async fn get_history(
    State(state): State<AppState>,
    Path(other_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Message>>> {
    let limit = query.limit.map(|l| l.clamp(1, MAX_PAGE));
    let before = query.before.map(|id| id.to_string());

    let history = run_db(&state, move |db| {
        if !db.user_exists(&other_id)? {
            return Ok(None);
        }
        match db.find_conversation(&claims.sub, &other_id)? {
            Some(conversation) => db
                .get_history(&conversation.id, limit, before.as_deref())
                .map(Some),
            None if before.is_some() => Ok(Some(History::UnknownCursor)),
            None => Ok(Some(History::Messages(Vec::new()))),
        }
    })
    .await?;

    match history {
        None => Err(ApiError::NotFound("User not found")),
        Some(History::UnknownCursor) => Err(ApiError::NotFound("Cursor message not found")),
        Some(History::Messages(rows)) => Ok(Json(rows.into_iter().map(convert::message).collect())),
    }
}

/// Everyone the caller follows or is followed by, flagged with unread chat.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ConversationPartner>>> {
    let rows = run_db(&state, move |db| db.conversation_partners(&claims.sub)).await?;

    Ok(Json(
        rows.into_iter()
            .map(|(row, unread)| ConversationPartner {
                user: convert::user(row),
                has_unread_messages: unread,
            })
            .collect(),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<MarkMessagesReadRequest>,
) -> ApiResult<Json<MarkReadResponse>> {
    let sender_id = req
        .sender_id
        .filter(|s| !s.trim().is_empty())
        .ok_or(ApiError::BadRequest("senderId is required"))?;

    let updated = run_db(&state, move |db| db.mark_messages_read(&claims.sub, &sender_id)).await?;

    Ok(Json(MarkReadResponse {
        message: "Messages marked as read successfully.".into(),
        updated,
    }))
}
