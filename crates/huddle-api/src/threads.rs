use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use huddle_core::RoomCoordinator;
use huddle_types::api::{
    CreateThreadRequest, MarkReadRequest, NotificationLevelRequest, RenameThreadRequest,
};
use huddle_types::models::{Message, Thread, ThreadAttendee};

use crate::error::ApiResult;
use crate::middleware::Identity;
use crate::{blocking, caller};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    25
}

#[derive(Debug, Serialize)]
pub struct SubscribedThread {
    pub thread: Thread,
    pub attendee: ThreadAttendee,
}

pub async fn recent_threads(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Thread>>> {
    let actor = caller(&state, &identity).await?;
    let threads = blocking(&state, move |c| c.recent_threads(&token, &actor, page.limit)).await?;
    Ok(Json(threads))
}

/// Threads the caller follows in any room.
pub async fn subscribed_threads(
    State(state): State<RoomCoordinator>,
    Extension(identity): Extension<Identity>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<SubscribedThread>>> {
    let actor = caller(&state, &identity).await?;
    let threads = blocking(&state, move |c| {
        c.subscribed_threads(&actor, page.limit, page.offset)
    })
    .await?;
    Ok(Json(
        threads
            .into_iter()
            .map(|(thread, attendee)| SubscribedThread { thread, attendee })
            .collect(),
    ))
}

pub async fn get_thread(
    State(state): State<RoomCoordinator>,
    Path((token, thread_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Thread>> {
    let actor = caller(&state, &identity).await?;
    let thread = blocking(&state, move |c| c.thread(&token, &actor, thread_id)).await?;
    Ok(Json(thread))
}

pub async fn thread_messages(
    State(state): State<RoomCoordinator>,
    Path((token, thread_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let actor = caller(&state, &identity).await?;
    let messages = blocking(&state, move |c| {
        c.thread_messages(&token, &actor, thread_id, page.limit)
    })
    .await?;
    Ok(Json(messages))
}

/// Start a thread at a message. Idempotent.
pub async fn create_thread(
    State(state): State<RoomCoordinator>,
    Path((token, message_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
    body: Option<Json<CreateThreadRequest>>,
) -> ApiResult<Json<Thread>> {
    let actor = caller(&state, &identity).await?;
    let title = body.map(|Json(req)| req.title).unwrap_or_default();
    let thread = blocking(&state, move |c| {
        c.ensure_thread(&token, &actor, message_id, &title)
    })
    .await?;
    Ok(Json(thread))
}

pub async fn rename_thread(
    State(state): State<RoomCoordinator>,
    Path((token, thread_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<RenameThreadRequest>,
) -> ApiResult<Json<Thread>> {
    let actor = caller(&state, &identity).await?;
    let thread = blocking(&state, move |c| {
        c.rename_thread(&token, &actor, thread_id, &req.title)
    })
    .await?;
    Ok(Json(thread))
}

pub async fn set_notification_level(
    State(state): State<RoomCoordinator>,
    Path((token, thread_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<NotificationLevelRequest>,
) -> ApiResult<Json<ThreadAttendee>> {
    let actor = caller(&state, &identity).await?;
    let sub = blocking(&state, move |c| c.subscribe(&token, &actor, thread_id, req.level)).await?;
    Ok(Json(sub))
}

pub async fn mark_thread_read(
    State(state): State<RoomCoordinator>,
    Path((token, thread_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
    body: Option<Json<MarkReadRequest>>,
) -> ApiResult<Json<ThreadAttendee>> {
    let actor = caller(&state, &identity).await?;
    let upto = body.and_then(|Json(req)| req.last_read_message);
    let sub = blocking(&state, move |c| {
        c.mark_thread_read(&token, &actor, thread_id, upto)
    })
    .await?;
    Ok(Json(sub))
}
