use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::DateTime;

use huddle_core::coordinator::{AttendeeFlag, NewRoomParams};
use huddle_core::{CoreError, RoomCoordinator};
use huddle_types::Permissions;
use huddle_types::api::{
    CreateRoomRequest, ListableRequest, LobbyRequest, NotificationLevelRequest, ReadOnlyRequest,
    RenameRoomRequest, RoomView, SetRoomPermissionsRequest,
};
use huddle_types::models::{Attendee, Room};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Identity;
use crate::{blocking, caller};

pub async fn list_rooms(
    State(state): State<RoomCoordinator>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<RoomView>>> {
    let actor = caller(&state, &identity).await?;
    let rooms = blocking(&state, move |c| c.rooms_for(&actor)).await?;
    Ok(Json(rooms))
}

pub async fn create_room(
    State(state): State<RoomCoordinator>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = identity.actor()?.clone();
    let params = NewRoomParams {
        room_type: req.room_type,
        name: req.room_name,
        object_type: req.object_type,
        object_id: req.object_id,
    };
    let view = blocking(&state, move |c| c.create_room(&actor, actor.id(), &params)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_room(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<RoomView>> {
    let actor = caller(&state, &identity).await?;
    let view = blocking(&state, move |c| c.room_view(&token, &actor)).await?;
    Ok(Json(view))
}

/// `mode` is `default` for the room default or `call` for call-scoped permissions.
pub async fn set_permissions(
    State(state): State<RoomCoordinator>,
    Path((token, mode)): Path<(String, String)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SetRoomPermissionsRequest>,
) -> ApiResult<Json<Room>> {
    let actor = caller(&state, &identity).await?;
    let permissions = Permissions::from_i64(req.permissions).map_err(CoreError::from)?;
    let room = match mode.as_str() {
        "default" => {
            blocking(&state, move |c| c.set_default_permissions(&token, &actor, permissions)).await?
        }
        "call" => {
            blocking(&state, move |c| c.set_call_permissions(&token, &actor, permissions)).await?
        }
        other => return Err(ApiError::BadRequest(format!("unknown permission mode: {other}"))),
    };
    Ok(Json(room))
}

pub async fn set_lobby(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<LobbyRequest>,
) -> ApiResult<Json<Room>> {
    let actor = caller(&state, &identity).await?;
    let timer = match req.timer {
        Some(secs) => Some(
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| ApiError::BadRequest("lobby timer out of range".into()))?,
        ),
        None => None,
    };
    let room = blocking(&state, move |c| c.set_lobby(&token, &actor, req.state, timer)).await?;
    Ok(Json(room))
}

pub async fn set_read_only(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ReadOnlyRequest>,
) -> ApiResult<Json<Room>> {
    let actor = caller(&state, &identity).await?;
    let room = blocking(&state, move |c| c.set_read_only(&token, &actor, req.read_only)).await?;
    Ok(Json(room))
}

pub async fn rename_room(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<RenameRoomRequest>,
) -> ApiResult<Json<Room>> {
    let actor = caller(&state, &identity).await?;
    let room = blocking(&state, move |c| c.rename_room(&token, &actor, &req.room_name)).await?;
    Ok(Json(room))
}

pub async fn set_listable(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ListableRequest>,
) -> ApiResult<Json<Room>> {
    let actor = caller(&state, &identity).await?;
    let room = blocking(&state, move |c| c.set_listable(&token, &actor, req.scope)).await?;
    Ok(Json(room))
}

/// Set one of the caller's own flags: favorite, archived, important or sensitive.
pub async fn set_flag(
    State(state): State<RoomCoordinator>,
    Path((token, flag)): Path<(String, String)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Attendee>> {
    toggle_flag(state, token, &flag, identity, true).await
}

pub async fn clear_flag(
    State(state): State<RoomCoordinator>,
    Path((token, flag)): Path<(String, String)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Attendee>> {
    toggle_flag(state, token, &flag, identity, false).await
}

async fn toggle_flag(
    state: RoomCoordinator,
    token: String,
    flag: &str,
    identity: Identity,
    value: bool,
) -> ApiResult<Json<Attendee>> {
    let flag = parse_flag(flag)?;
    let actor = caller(&state, &identity).await?;
    let attendee = blocking(&state, move |c| c.set_attendee_flag(&token, &actor, flag, value)).await?;
    Ok(Json(attendee))
}

fn parse_flag(name: &str) -> ApiResult<AttendeeFlag> {
    match name {
        "favorite" => Ok(AttendeeFlag::Favorite),
        "archived" => Ok(AttendeeFlag::Archived),
        "important" => Ok(AttendeeFlag::Important),
        "sensitive" => Ok(AttendeeFlag::Sensitive),
        other => Err(ApiError::BadRequest(format!("unknown flag: {other}"))),
    }
}

pub async fn set_notification_level(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<NotificationLevelRequest>,
) -> ApiResult<Json<Attendee>> {
    let actor = caller(&state, &identity).await?;
    let attendee = blocking(&state, move |c| {
        c.set_notification_level(&token, &actor, req.level)
    })
    .await?;
    Ok(Json(attendee))
}
