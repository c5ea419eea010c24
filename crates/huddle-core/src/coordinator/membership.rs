use chrono::{DateTime, Utc};
use tracing::{debug, info};

use huddle_db::queries::attendees::{self, NewAttendee};
use huddle_db::queries::{bans, rooms, sessions};
use huddle_db::{Connection, StoreError};
use huddle_types::api::RoomView;
use huddle_types::models::{Attendee, Participant, Room, Session};
use huddle_types::{
    Actor, InCallFlags, InvitationState, Listable, LobbyState, ParticipantType, Permissions,
    RoomType,
};

use super::rooms::view;
use super::{RoomCoordinator, effective_permissions, load_room, require_attendee, require_moderator};
use crate::error::{CoreError, CoreResult, Entity, OrNotFound};
use crate::token;

/// Attempts at drawing a session id that is not live yet.
const SESSION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    /// `None` joins as an anonymous guest, resuming the guest behind
    /// `previous_session_id` when there is one.
    pub actor: Option<Actor>,
    /// Other identities of the same person, checked against bans.
    pub aliases: Vec<Actor>,
    pub display_name: String,
    /// Session this client held before. It is superseded by the new one.
    pub previous_session_id: Option<String>,
    /// Supersede the previous session even while it is in the call.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub room: Room,
    pub attendee: Attendee,
    pub session: Session,
    pub permissions: Permissions,
}

impl JoinOutcome {
    pub fn into_view(self) -> RoomView {
        view(self.room, Some(self.attendee), Some(self.session.session_id))
    }
}

impl RoomCoordinator {
    /// Open a new session in the room, creating the attendee on first join.
    pub fn join(&self, token: &str, req: JoinRequest) -> CoreResult<JoinOutcome> {
        let now = Utc::now();
        let outcome = self.db.with_tx(|conn| -> CoreResult<JoinOutcome> {
            let mut room = load_room(conn, token)?;
            let session_id = token::session_id();
            let actor = match &req.actor {
                Some(actor) => actor.clone(),
                None => match returning_guest(conn, &room, req.previous_session_id.as_deref())? {
                    Some(actor) => actor,
                    None => Actor::Guest(token::guest_actor_id(&session_id)),
                },
            };
            if !actor.can_join() {
                return Err(CoreError::Forbidden("actor cannot hold sessions"));
            }

            let identities: Vec<&Actor> = std::iter::once(&actor).chain(&req.aliases).collect();
            if let Some(ban) = bans::find_any(conn, room.id, &identities)? {
                debug!(room = %token, banned = %ban.banned, "join rejected by ban");
                return Err(CoreError::Forbidden("banned"));
            }

            let attendee = match attendees::find(conn, room.id, &actor)? {
                Some(attendee) => attendee,
                None => self_join(conn, &room, &actor, &req.display_name)?,
            };

            if room.lobby_state == LobbyState::NonModerators
                && room.lobby_timer.is_some_and(|timer| timer <= now)
            {
                rooms::set_lobby(conn, room.id, LobbyState::None, None)?;
                room.lobby_state = LobbyState::None;
                room.lobby_timer = None;
                info!(room = %token, "lobby timer elapsed, lobby opened");
            }

            let permissions = effective_permissions(&room, &attendee);
            if room.lobby_active(now)
                && !attendee.participant_type.is_moderator()
                && !permissions.contains(Permissions::LOBBY_IGNORE)
            {
                return Err(CoreError::LobbyActive);
            }

            if let Some(previous) = req.previous_session_id.as_deref() {
                supersede(conn, &attendee, previous, req.force)?;
            }

            let session = insert_session(conn, attendee.id, session_id, now)?;
            Ok(JoinOutcome {
                room,
                attendee,
                session,
                permissions,
            })
        })?;

        info!(
            room = %token,
            attendee_id = outcome.attendee.id,
            actor = %outcome.attendee.actor,
            "attendee joined"
        );
        Ok(outcome)
    }

    /// Close one session. Unknown session ids are ignored, so a late leave
    /// for a superseded tab never touches the session that replaced it.
    pub fn leave(&self, token: &str, session_id: &str) -> CoreResult<()> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let Some(session) = sessions::find(conn, session_id)? else {
                return Ok(());
            };
            let attendee = attendees::by_id(conn, session.attendee_id)?;
            if attendee.room_id != room.id {
                return Ok(());
            }

            sessions::delete(conn, session_id)?;
            let removed = attendees::delete_if_orphaned(conn, attendee.id)?;
            debug!(room = %token, attendee_id = attendee.id, removed, "session left");
            Ok(())
        })
    }

    /// Leave the room for good, dropping every session and subscription.
    pub fn leave_room(&self, token: &str, actor: &Actor) -> CoreResult<()> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            attendees::delete(conn, attendee.id)?;
            info!(room = %token, attendee_id = attendee.id, "attendee left room");
            Ok(())
        })
    }

    /// Add `actor` as a permanent member. Adding an existing member is a no-op.
    pub fn add_attendee(
        &self,
        token: &str,
        moderator: &Actor,
        actor: &Actor,
        display_name: &str,
    ) -> CoreResult<Attendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            require_moderator(conn, &room, moderator)?;
            if !matches!(actor, Actor::User(_) | Actor::FederatedUser(_)) {
                return Err(CoreError::Forbidden("only users can be added"));
            }
            if bans::find_any(conn, room.id, &[actor])?.is_some() {
                return Err(CoreError::Forbidden("banned"));
            }
            let new = NewAttendee {
                room_id: room.id,
                actor,
                display_name,
                participant_type: ParticipantType::User,
                state: InvitationState::Accepted,
            };
            match attendees::insert(conn, &new) {
                Ok(attendee) => {
                    info!(room = %token, attendee_id = attendee.id, actor = %actor, "attendee added");
                    Ok(attendee)
                }
                Err(StoreError::Conflict(_)) => require_attendee(conn, &room, actor),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Promote or demote an attendee. Only owners touch other owners.
    pub fn set_participant_type(
        &self,
        token: &str,
        moderator: &Actor,
        attendee_id: i64,
        participant_type: ParticipantType,
    ) -> CoreResult<Attendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let moderator = require_moderator(conn, &room, moderator)?;
            let target = attendee_in_room(conn, &room, attendee_id)?;
            let touches_owner = target.participant_type == ParticipantType::Owner
                || participant_type == ParticipantType::Owner;
            if touches_owner && moderator.participant_type != ParticipantType::Owner {
                return Err(CoreError::Forbidden("only owners can change owners"));
            }
            let guest = matches!(
                target.participant_type,
                ParticipantType::Guest | ParticipantType::GuestModerator
            );
            let valid = match participant_type {
                ParticipantType::Guest | ParticipantType::GuestModerator => guest,
                _ => !guest,
            };
            if !valid {
                return Err(CoreError::InvalidArgument(
                    "guests and users cannot swap participant kinds".into(),
                ));
            }
            attendees::set_participant_type(conn, target.id, participant_type)?;
            debug!(room = %token, attendee_id, ?participant_type, "participant type changed");
            Ok(attendees::by_id(conn, target.id)?)
        })
    }

    /// Kick an attendee.
    pub fn remove_attendee(&self, token: &str, moderator: &Actor, attendee_id: i64) -> CoreResult<()> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let moderator = require_moderator(conn, &room, moderator)?;
            let target = attendee_in_room(conn, &room, attendee_id)?;
            if target.participant_type == ParticipantType::Owner
                && moderator.participant_type != ParticipantType::Owner
            {
                return Err(CoreError::Forbidden("only owners can remove owners"));
            }
            attendees::delete(conn, target.id)?;
            info!(room = %token, attendee_id, "attendee removed");
            Ok(())
        })
    }

    pub fn ping(&self, token: &str, session_id: &str) -> CoreResult<Session> {
        let now = Utc::now();
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let (session, _) = session_in_room(conn, &room, session_id)?;
            sessions::touch(conn, &session.session_id, now)?;
            sessions::find(conn, session_id)?.ok_or(CoreError::NotFound(Entity::Session))
        })
    }

    /// Put a session into the call with the requested media flags.
    ///
    /// Starting a call needs CALL_START, joining a running one CALL_JOIN.
    pub fn join_call(&self, token: &str, session_id: &str, flags: InCallFlags) -> CoreResult<Session> {
        if !flags.is_in_call() {
            return self.leave_call(token, session_id);
        }
        let now = Utc::now();
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let (session, attendee) = session_in_room(conn, &room, session_id)?;
            let needed = if sessions::count_in_call(conn, room.id)? == 0 {
                Permissions::CALL_START
            } else {
                Permissions::CALL_JOIN
            };
            if !effective_permissions(&room, &attendee).contains(needed) {
                return Err(CoreError::Forbidden("missing call permission"));
            }

            sessions::set_in_call(conn, &session.session_id, flags)?;
            attendees::set_last_joined_call(conn, attendee.id, now)?;
            debug!(room = %token, attendee_id = attendee.id, flags = flags.bits(), "joined call");
            sessions::find(conn, session_id)?.ok_or(CoreError::NotFound(Entity::Session))
        })
    }

    pub fn leave_call(&self, token: &str, session_id: &str) -> CoreResult<Session> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let (session, _) = session_in_room(conn, &room, session_id)?;
            sessions::set_in_call(conn, &session.session_id, InCallFlags::DISCONNECTED)?;
            sessions::find(conn, session_id)?.ok_or(CoreError::NotFound(Entity::Session))
        })
    }

    /// Attendees of the room with their live sessions. Members only.
    pub fn participants(&self, token: &str, actor: &Actor) -> CoreResult<Vec<Participant>> {
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            attendees::list(conn, room.id)?
                .into_iter()
                .map(|attendee| -> CoreResult<Participant> {
                    let sessions = sessions::for_attendee(conn, attendee.id)?;
                    Ok(Participant { attendee, sessions })
                })
                .collect()
        })
    }

    /// Drop sessions that stopped pinging, then the transient attendees they
    /// leave behind. Returns `(sessions, attendees)` removed.
    pub fn purge_stale_sessions(&self, now: DateTime<Utc>) -> CoreResult<(usize, usize)> {
        let cutoff = self.config.session_cutoff(now);
        let purged = self.db.with_tx(|conn| -> CoreResult<(usize, usize)> {
            let sessions = sessions::delete_stale(conn, cutoff)?;
            let attendees = attendees::delete_orphaned(conn)?;
            Ok((sessions, attendees))
        })?;
        if purged != (0, 0) {
            info!(sessions = purged.0, attendees = purged.1, "stale sessions purged");
        }
        Ok(purged)
    }

    /// Identity behind a live session, for clients that only hold a session id.
    pub fn actor_for_session(&self, session_id: &str) -> CoreResult<Actor> {
        self.db.with_conn(|conn| {
            let session = sessions::find(conn, session_id)?
                .ok_or(CoreError::NotFound(Entity::Session))?;
            let attendee = attendees::by_id(conn, session.attendee_id).or_not_found(Entity::Attendee)?;
            Ok(attendee.actor)
        })
    }
}

/// Who may become an attendee just by joining.
fn self_join(conn: &Connection, room: &Room, actor: &Actor, display_name: &str) -> CoreResult<Attendee> {
    let participant_type = match (actor, room.room_type) {
        (Actor::Guest(_), RoomType::Public) => ParticipantType::Guest,
        (Actor::User(_), RoomType::Public) => ParticipantType::UserSelfJoined,
        (Actor::User(_), RoomType::Group) if room.listable != Listable::None => ParticipantType::User,
        _ => return Err(CoreError::Forbidden("not a participant")),
    };

    let new = NewAttendee {
        room_id: room.id,
        actor,
        display_name,
        participant_type,
        state: InvitationState::Accepted,
    };
    match attendees::insert(conn, &new) {
        Ok(attendee) => Ok(attendee),
        // Another join created it first
        Err(StoreError::Conflict(_)) => {
            attendees::find(conn, room.id, actor)?.ok_or(CoreError::NotFound(Entity::Attendee))
        }
        Err(e) => Err(e.into()),
    }
}

/// Guest identity behind a live session of this room, so a reloading guest
/// keeps its attendee.
fn returning_guest(conn: &Connection, room: &Room, previous: Option<&str>) -> CoreResult<Option<Actor>> {
    let Some(previous) = previous else {
        return Ok(None);
    };
    let Some(session) = sessions::find(conn, previous)? else {
        return Ok(None);
    };
    let attendee = attendees::by_id(conn, session.attendee_id).or_not_found(Entity::Attendee)?;
    if attendee.room_id != room.id || !matches!(attendee.actor, Actor::Guest(_)) {
        return Ok(None);
    }
    Ok(Some(attendee.actor))
}

/// Drop the client's previous session before it gets a new one.
fn supersede(conn: &Connection, attendee: &Attendee, previous: &str, force: bool) -> CoreResult<()> {
    match sessions::find(conn, previous)? {
        Some(old) if old.attendee_id == attendee.id => {
            if old.in_call.is_in_call() && !force {
                return Err(CoreError::SessionInCall(Box::new(old)));
            }
            sessions::delete(conn, previous)?;
            debug!(attendee_id = attendee.id, "previous session superseded");
            Ok(())
        }
        _ => Ok(()),
    }
}

fn insert_session(
    conn: &Connection,
    attendee_id: i64,
    first_choice: String,
    now: DateTime<Utc>,
) -> CoreResult<Session> {
    let mut candidate = first_choice;
    for _ in 0..SESSION_ATTEMPTS {
        match sessions::insert(conn, attendee_id, &candidate, now) {
            Ok(session) => return Ok(session),
            Err(StoreError::Conflict(_)) => candidate = token::session_id(),
            Err(e) => return Err(e.into()),
        }
    }
    Err(CoreError::AlreadyExists)
}

pub(crate) fn attendee_in_room(conn: &Connection, room: &Room, attendee_id: i64) -> CoreResult<Attendee> {
    let attendee = attendees::by_id(conn, attendee_id).or_not_found(Entity::Attendee)?;
    if attendee.room_id != room.id {
        return Err(CoreError::NotFound(Entity::Attendee));
    }
    Ok(attendee)
}

fn session_in_room(conn: &Connection, room: &Room, session_id: &str) -> CoreResult<(Session, Attendee)> {
    let session = sessions::find(conn, session_id)?.ok_or(CoreError::NotFound(Entity::Session))?;
    let attendee = attendees::by_id(conn, session.attendee_id).or_not_found(Entity::Attendee)?;
    if attendee.room_id != room.id {
        return Err(CoreError::NotFound(Entity::Session));
    }
    Ok((session, attendee))
}
