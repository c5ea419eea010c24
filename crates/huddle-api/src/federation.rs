use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use huddle_core::coordinator::InviteParams;
use huddle_core::{CoreError, RoomCoordinator};
use huddle_types::Actor;
use huddle_types::api::{ReceiveInviteRequest, RoomView};
use huddle_types::models::FederationInvite;

use crate::blocking;
use crate::error::ApiResult;
use crate::middleware::Identity;

/// Only local users hold invitations.
fn local_user(identity: &Identity) -> ApiResult<String> {
    match identity.actor()? {
        Actor::User(id) => Ok(id.clone()),
        _ => Err(CoreError::Forbidden("only users receive invitations").into()),
    }
}

/// Inbound invitation from the server hosting the room.
pub async fn receive_invite(
    State(state): State<RoomCoordinator>,
    Json(req): Json<ReceiveInviteRequest>,
) -> ApiResult<impl IntoResponse> {
    let params = InviteParams {
        user_id: req.user_id,
        remote_server: req.remote_server,
        remote_token: req.remote_token,
        remote_attendee_id: req.remote_attendee_id,
        inviter_cloud_id: req.inviter_cloud_id,
        inviter_display_name: req.inviter_display_name,
        room_name: req.room_name,
    };
    let invite = blocking(&state, move |c| c.receive_invite(&params)).await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

pub async fn list_invitations(
    State(state): State<RoomCoordinator>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<FederationInvite>>> {
    let user_id = local_user(&identity)?;
    let invites = blocking(&state, move |c| c.invitations(&user_id)).await?;
    Ok(Json(invites))
}

pub async fn accept_invite(
    State(state): State<RoomCoordinator>,
    Path(invite_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<RoomView>> {
    let user_id = local_user(&identity)?;
    let view = blocking(&state, move |c| c.accept_invite(invite_id, &user_id)).await?;
    Ok(Json(view))
}

pub async fn reject_invite(
    State(state): State<RoomCoordinator>,
    Path(invite_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<FederationInvite>> {
    let user_id = local_user(&identity)?;
    let invite = blocking(&state, move |c| c.reject_invite(invite_id, &user_id)).await?;
    Ok(Json(invite))
}
