use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use huddle_core::coordinator::PostMessage;
use huddle_core::{PollOutcome, RoomCoordinator};
use huddle_types::api::{MarkReadRequest, ReadStateResponse, SendMessageRequest};
use huddle_types::models::{Attendee, NO_THREAD};

use crate::error::ApiResult;
use crate::middleware::Identity;
use crate::{blocking, caller};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    #[serde(default)]
    pub last_known_message_id: i64,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// `1` waits for messages newer than `lastKnownMessageId`.
    #[serde(default)]
    pub look_into_future: u8,
    /// Seconds to wait, capped by the server.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_limit() -> u32 {
    100
}

fn default_timeout() -> u64 {
    30
}

/// Page through the room, or long-poll for new messages. A long-poll that
/// runs out answers 304 with no body.
pub async fn receive_messages(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ChatQuery>,
) -> ApiResult<Response> {
    let actor = caller(&state, &identity).await?;
    if query.look_into_future == 0 {
        let messages = blocking(&state, move |c| {
            c.messages(&token, &actor, query.last_known_message_id, query.limit)
        })
        .await?;
        return Ok(Json(messages).into_response());
    }

    let outcome = state
        .wait_for_messages(
            &token,
            &actor,
            query.last_known_message_id,
            query.limit,
            Duration::from_secs(query.timeout),
        )
        .await?;
    Ok(match outcome {
        PollOutcome::Modified(messages) => Json(messages).into_response(),
        PollOutcome::NotModified => StatusCode::NOT_MODIFIED.into_response(),
    })
}

pub async fn send_message(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = caller(&state, &identity).await?;
    let post = PostMessage {
        text: req.message,
        reply_to: req.reply_to,
        thread_id: (req.thread_id != NO_THREAD).then_some(req.thread_id),
        mentions: req.mentions,
        mention_all: req.mention_all,
    };
    let message = blocking(&state, move |c| c.post_message(&token, &actor, post)).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Move the read marker. Without a body everything is read.
pub async fn mark_read(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    body: Option<Json<MarkReadRequest>>,
) -> ApiResult<Json<Attendee>> {
    let actor = caller(&state, &identity).await?;
    let upto = body.and_then(|Json(req)| req.last_read_message);
    let attendee = blocking(&state, move |c| c.mark_read(&token, &actor, upto)).await?;
    Ok(Json(attendee))
}

pub async fn mark_unread(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Attendee>> {
    let actor = caller(&state, &identity).await?;
    let attendee = blocking(&state, move |c| c.mark_unread(&token, &actor)).await?;
    Ok(Json(attendee))
}

pub async fn read_state(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<ReadStateResponse>> {
    let actor = caller(&state, &identity).await?;
    let last_common_read = blocking(&state, move |c| c.last_common_read(&token, &actor)).await?;
    Ok(Json(ReadStateResponse { last_common_read }))
}
