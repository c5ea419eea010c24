use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use huddle_core::{CoreError, RoomCoordinator};
use huddle_core::coordinator::JoinRequest;
use huddle_types::{Actor, InCallFlags, Permissions};
use huddle_types::api::{
    AddParticipantRequest, JoinCallRequest, JoinRoomRequest, ParticipantTypeRequest, RoomView,
    SessionResponse, UpdatePermissionsRequest,
};
use huddle_types::models::{Attendee, Participant};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Identity;
use crate::{blocking, caller};

/// Open a session. Requests without an actor join as a guest.
pub async fn join_room(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    body: Option<Json<JoinRoomRequest>>,
) -> ApiResult<Json<RoomView>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let join = JoinRequest {
        display_name: req.display_name,
        previous_session_id: req.session_id.or(identity.session_id),
        force: req.force,
        actor: identity.actor,
        aliases: Vec::new(),
    };
    let outcome = blocking(&state, move |c| c.join(&token, join)).await?;
    debug!(session = %outcome.session.session_id, "session opened");
    Ok(Json(outcome.into_view()))
}

/// Close the caller's session. Transient attendees go with it.
pub async fn leave_room(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let session_id = identity.session()?.to_owned();
    blocking(&state, move |c| c.leave(&token, &session_id)).await?;
    Ok(StatusCode::OK)
}

/// Give up membership entirely.
pub async fn leave_membership(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let actor = caller(&state, &identity).await?;
    blocking(&state, move |c| c.leave_room(&token, &actor)).await?;
    Ok(StatusCode::OK)
}

pub async fn list_participants(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Participant>>> {
    let actor = caller(&state, &identity).await?;
    let participants = blocking(&state, move |c| c.participants(&token, &actor)).await?;
    Ok(Json(participants))
}

/// Add a user as a permanent member.
pub async fn add_participant(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<AddParticipantRequest>,
) -> ApiResult<impl IntoResponse> {
    let moderator = caller(&state, &identity).await?;
    let actor = Actor::new(req.actor_type, req.actor_id);
    let display_name = if req.display_name.is_empty() {
        actor.id().to_owned()
    } else {
        req.display_name
    };
    let attendee = blocking(&state, move |c| {
        c.add_attendee(&token, &moderator, &actor, &display_name)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(attendee)))
}

/// Promote or demote an attendee.
pub async fn set_participant_type(
    State(state): State<RoomCoordinator>,
    Path((token, attendee_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ParticipantTypeRequest>,
) -> ApiResult<Json<Attendee>> {
    let moderator = caller(&state, &identity).await?;
    let attendee = blocking(&state, move |c| {
        c.set_participant_type(&token, &moderator, attendee_id, req.participant_type)
    })
    .await?;
    Ok(Json(attendee))
}

pub async fn remove_attendee(
    State(state): State<RoomCoordinator>,
    Path((token, attendee_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let actor = caller(&state, &identity).await?;
    blocking(&state, move |c| c.remove_attendee(&token, &actor, attendee_id)).await?;
    Ok(StatusCode::OK)
}

pub async fn update_permissions(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdatePermissionsRequest>,
) -> ApiResult<Json<Attendee>> {
    let actor = caller(&state, &identity).await?;
    let delta = Permissions::from_i64(req.permissions).map_err(CoreError::from)?;
    let attendee = blocking(&state, move |c| {
        c.grant_permissions(&token, &actor, req.attendee_id, req.method, delta)
    })
    .await?;
    Ok(Json(attendee))
}

pub async fn join_call(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<JoinCallRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session_id = identity.session()?.to_owned();
    let flags = InCallFlags::from_bits(req.flags).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let session = blocking(&state, move |c| c.join_call(&token, &session_id, flags)).await?;
    Ok(Json(SessionResponse { session }))
}

pub async fn leave_call(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<SessionResponse>> {
    let session_id = identity.session()?.to_owned();
    let session = blocking(&state, move |c| c.leave_call(&token, &session_id)).await?;
    Ok(Json(SessionResponse { session }))
}

/// Keep the caller's session alive.
pub async fn ping(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<SessionResponse>> {
    let session_id = identity.session()?.to_owned();
    let session = blocking(&state, move |c| c.ping(&token, &session_id)).await?;
    Ok(Json(SessionResponse { session }))
}
