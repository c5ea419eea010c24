use chrono::Utc;
use tracing::info;

use huddle_db::queries::attendees::{self, NewAttendee};
use huddle_db::queries::invitations::{self, NewInvite};
use huddle_db::queries::rooms::{self, NewRoom};
use huddle_db::{Connection, StoreError};
use huddle_types::api::RoomView;
use huddle_types::models::{Attendee, FederationInvite, Room};
use huddle_types::{Actor, InvitationState, ParticipantType, RoomType};

use super::RoomCoordinator;
use super::rooms::{insert_with_fresh_token, view};
use crate::error::{CoreError, CoreResult, Entity, OrNotFound};

/// An invitation another server sent for one of our users.
#[derive(Debug, Clone)]
pub struct InviteParams {
    pub user_id: String,
    pub remote_server: String,
    pub remote_token: String,
    pub remote_attendee_id: i64,
    pub inviter_cloud_id: String,
    pub inviter_display_name: String,
    pub room_name: String,
}

impl RoomCoordinator {
    pub fn receive_invite(&self, params: &InviteParams) -> CoreResult<FederationInvite> {
        if !self.config.federation_enabled {
            return Err(CoreError::Forbidden("federation is disabled"));
        }
        let now = Utc::now();
        let new = NewInvite {
            user_id: &params.user_id,
            remote_server: &params.remote_server,
            remote_token: &params.remote_token,
            remote_attendee_id: params.remote_attendee_id,
            inviter_cloud_id: &params.inviter_cloud_id,
            inviter_display_name: &params.inviter_display_name,
            room_name: &params.room_name,
        };
        let invite = self
            .db
            .with_tx(|conn| invitations::insert(conn, &new, now))
            .map_err(|e| match e {
                StoreError::Conflict(_) => CoreError::AlreadyExists,
                e => e.into(),
            })?;
        info!(
            invite_id = invite.id,
            user = %invite.user_id,
            remote = %invite.remote_server,
            "federation invite received"
        );
        Ok(invite)
    }

    pub fn invitations(&self, user_id: &str) -> CoreResult<Vec<FederationInvite>> {
        Ok(self.db.with_conn(|conn| invitations::for_user(conn, user_id))?)
    }

    /// Accept an invitation and join the local proxy room for it.
    /// Accepting twice is harmless; a rejected invitation stays rejected.
    pub fn accept_invite(&self, invite_id: i64, user_id: &str) -> CoreResult<RoomView> {
        let now = Utc::now();
        let config = &self.config;
        let (room, attendee) = self.db.with_tx(|conn| -> CoreResult<(Room, Attendee)> {
            let invite = own_invite(conn, invite_id, user_id)?;
            if invite.state == InvitationState::Rejected {
                return Err(CoreError::InvalidState("invitation was rejected"));
            }

            let room = match rooms::find_proxy(conn, &invite.remote_server, &invite.remote_token)? {
                Some(room) => room,
                None => {
                    let template = NewRoom {
                        token: "",
                        name: &invite.room_name,
                        room_type: RoomType::Group,
                        object_type: "",
                        object_id: "",
                        default_permissions: config.default_permissions,
                        remote: Some((invite.remote_server.as_str(), invite.remote_token.as_str())),
                    };
                    insert_with_fresh_token(conn, config, &template, now)?
                }
            };
            let attendee = mirror_attendee(conn, &room, &invite)?;

            if !invitations::transition(
                conn,
                invite.id,
                invite.state,
                InvitationState::Accepted,
                Some(room.id),
            )? {
                return Err(CoreError::InvalidState("invitation changed concurrently"));
            }
            Ok((room, attendee))
        })?;

        info!(invite_id, room = %room.token, "federation invite accepted");
        Ok(view(room, Some(attendee), None))
    }

    /// Reject a pending invitation. There is no way back.
    pub fn reject_invite(&self, invite_id: i64, user_id: &str) -> CoreResult<FederationInvite> {
        self.db.with_tx(|conn| {
            let invite = own_invite(conn, invite_id, user_id)?;
            if invite.state != InvitationState::Invited
                || !invitations::transition(
                    conn,
                    invite.id,
                    InvitationState::Invited,
                    InvitationState::Rejected,
                    None,
                )?
            {
                return Err(CoreError::InvalidState("only pending invitations can be rejected"));
            }
            info!(invite_id, "federation invite rejected");
            Ok(invitations::by_id(conn, invite.id)?)
        })
    }
}

fn own_invite(conn: &Connection, invite_id: i64, user_id: &str) -> CoreResult<FederationInvite> {
    let invite = invitations::by_id(conn, invite_id).or_not_found(Entity::Invitation)?;
    if invite.user_id != user_id {
        return Err(CoreError::NotFound(Entity::Invitation));
    }
    Ok(invite)
}

fn mirror_attendee(conn: &Connection, room: &Room, invite: &FederationInvite) -> CoreResult<Attendee> {
    let actor = Actor::User(invite.user_id.clone());
    if let Some(existing) = attendees::find(conn, room.id, &actor)? {
        return Ok(existing);
    }
    Ok(attendees::insert(
        conn,
        &NewAttendee {
            room_id: room.id,
            actor: &actor,
            display_name: &invite.user_id,
            participant_type: ParticipantType::User,
            state: InvitationState::Accepted,
        },
    )?)
}
