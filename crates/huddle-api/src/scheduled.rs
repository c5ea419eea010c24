use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};

use huddle_core::RoomCoordinator;
use huddle_core::coordinator::ScheduleParams;
use huddle_types::api::{EditScheduledRequest, ScheduleMessageRequest};
use huddle_types::models::{NO_THREAD, ScheduledMessage};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Identity;
use crate::{blocking, caller};

fn send_time(secs: i64) -> ApiResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| ApiError::BadRequest("send time out of range".into()))
}

pub async fn list_scheduled(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<ScheduledMessage>>> {
    let actor = caller(&state, &identity).await?;
    let pending = blocking(&state, move |c| c.scheduled_messages(&token, &actor)).await?;
    Ok(Json(pending))
}

pub async fn schedule_message(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ScheduleMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = caller(&state, &identity).await?;
    let params = ScheduleParams {
        text: req.message,
        send_at: send_time(req.send_at)?,
        thread_id: (req.thread_id != NO_THREAD).then_some(req.thread_id),
        reply_to: req.reply_to,
        metadata: req.metadata,
    };
    let scheduled = blocking(&state, move |c| c.schedule_message(&token, &actor, &params)).await?;
    Ok((StatusCode::CREATED, Json(scheduled)))
}

pub async fn edit_scheduled(
    State(state): State<RoomCoordinator>,
    Path((token, id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<EditScheduledRequest>,
) -> ApiResult<Json<ScheduledMessage>> {
    let actor = caller(&state, &identity).await?;
    let send_at = send_time(req.send_at)?;
    let scheduled = blocking(&state, move |c| {
        c.edit_scheduled(&token, &actor, id, &req.message, send_at)
    })
    .await?;
    Ok(Json(scheduled))
}

pub async fn delete_scheduled(
    State(state): State<RoomCoordinator>,
    Path((token, id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let actor = caller(&state, &identity).await?;
    blocking(&state, move |c| c.delete_scheduled(&token, &actor, id)).await?;
    Ok(StatusCode::OK)
}
