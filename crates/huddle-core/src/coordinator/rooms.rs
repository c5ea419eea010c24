use chrono::{DateTime, Utc};
use tracing::{debug, info};

use huddle_db::queries::attendees::{self, AttendeeFlag, NewAttendee};
use huddle_db::queries::rooms::{self, NewRoom};
use huddle_db::{Connection, StoreError};
use huddle_types::api::RoomView;
use huddle_types::models::{Attendee, Room};
use huddle_types::{
    Actor, InvitationState, Listable, LobbyState, NotificationLevel, ParticipantType,
    PermissionMethod, Permissions, RoomType,
};

use super::{RoomCoordinator, effective_permissions, load_room, require_attendee, require_moderator};
use crate::config::MAX_TOKEN_LENGTH;
use crate::error::{CoreError, CoreResult, Entity};
use crate::{CoreConfig, token};

const MAX_TOKEN_ATTEMPTS: usize = 30;
/// Failed attempts at one length before growing the token.
const ATTEMPTS_PER_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 255;

#[derive(Debug, Clone)]
pub struct NewRoomParams {
    pub room_type: RoomType,
    pub name: String,
    pub object_type: String,
    pub object_id: String,
}

impl RoomCoordinator {
    /// Create a room owned by `creator`.
    pub fn create_room(
        &self,
        creator: &Actor,
        display_name: &str,
        params: &NewRoomParams,
    ) -> CoreResult<RoomView> {
        if !matches!(creator, Actor::User(_)) {
            return Err(CoreError::Forbidden("only users can create rooms"));
        }
        let name = validate_name(&params.name)?;
        let now = Utc::now();

        let (room, owner) = self.db.with_tx(|conn| {
            let template = NewRoom {
                token: "",
                name,
                room_type: params.room_type,
                object_type: &params.object_type,
                object_id: &params.object_id,
                default_permissions: self.config.default_permissions,
                remote: None,
            };
            let room = insert_with_fresh_token(conn, &self.config, &template, now)?;
            let owner = attendees::insert(
                conn,
                &NewAttendee {
                    room_id: room.id,
                    actor: creator,
                    display_name,
                    participant_type: ParticipantType::Owner,
                    state: InvitationState::Accepted,
                },
            )?;
            Ok::<_, CoreError>((room, owner))
        })?;

        info!(room = %room.token, owner = %creator, kind = ?room.room_type, "room created");
        Ok(view(room, Some(owner), None))
    }

    /// The room as seen by `actor`. Non-members only see public or listable rooms.
    pub fn room_view(&self, token: &str, actor: &Actor) -> CoreResult<RoomView> {
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            let attendee = attendees::find(conn, room.id, actor)?;
            if attendee.is_none() && !visible_to_outsiders(&room) {
                return Err(CoreError::NotFound(Entity::Room));
            }
            Ok(view(room, attendee, None))
        })
    }

    /// Rooms `actor` is an attendee of, most recently active first.
    pub fn rooms_for(&self, actor: &Actor) -> CoreResult<Vec<RoomView>> {
        self.db.with_conn(|conn| {
            let rooms = rooms::for_actor(conn, actor)?;
            rooms
                .into_iter()
                .map(|room| -> CoreResult<RoomView> {
                    let attendee = attendees::find(conn, room.id, actor)?;
                    Ok(view(room, attendee, None))
                })
                .collect()
        })
    }

    /// Set the room default. Overrides of non-moderators are dropped so that
    /// everyone inherits the new value.
    pub fn set_default_permissions(
        &self,
        token: &str,
        moderator: &Actor,
        permissions: Permissions,
    ) -> CoreResult<Room> {
        self.set_room_permissions(token, moderator, permissions, rooms::set_default_permissions)
    }

    pub fn set_call_permissions(
        &self,
        token: &str,
        moderator: &Actor,
        permissions: Permissions,
    ) -> CoreResult<Room> {
        self.set_room_permissions(token, moderator, permissions, rooms::set_call_permissions)
    }

    fn set_room_permissions(
        &self,
        token: &str,
        moderator: &Actor,
        permissions: Permissions,
        write: fn(&Connection, i64, Permissions) -> Result<(), StoreError>,
    ) -> CoreResult<Room> {
        let permissions = Permissions::apply(PermissionMethod::Set, Permissions::DEFAULT, permissions);
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            require_moderator(conn, &room, moderator)?;
            write(conn, room.id, permissions)?;
            let reset = attendees::reset_permissions(conn, room.id)?;
            debug!(room = %token, permissions = %permissions, reset, "room permissions set");
            Ok(rooms::by_id(conn, room.id)?)
        })
    }

    pub fn set_lobby(
        &self,
        token: &str,
        moderator: &Actor,
        state: LobbyState,
        timer: Option<DateTime<Utc>>,
    ) -> CoreResult<Room> {
        let timer = match state {
            LobbyState::None => None,
            LobbyState::NonModerators => timer,
        };
        self.moderate(token, moderator, |conn, room| rooms::set_lobby(conn, room.id, state, timer))
    }

    pub fn set_read_only(&self, token: &str, moderator: &Actor, read_only: bool) -> CoreResult<Room> {
        self.moderate(token, moderator, |conn, room| {
            rooms::set_read_only(conn, room.id, read_only)
        })
    }

    pub fn set_listable(&self, token: &str, moderator: &Actor, listable: Listable) -> CoreResult<Room> {
        self.moderate(token, moderator, |conn, room| {
            rooms::set_listable(conn, room.id, listable)
        })
    }

    pub fn rename_room(&self, token: &str, moderator: &Actor, name: &str) -> CoreResult<Room> {
        let name = validate_name(name)?;
        if name.is_empty() {
            return Err(CoreError::InvalidArgument("room name must not be empty".into()));
        }
        self.moderate(token, moderator, |conn, room| rooms::set_name(conn, room.id, name))
    }

    fn moderate<F>(&self, token: &str, moderator: &Actor, change: F) -> CoreResult<Room>
    where
        F: FnOnce(&Connection, &Room) -> Result<(), StoreError>,
    {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            require_moderator(conn, &room, moderator)?;
            change(conn, &room)?;
            Ok(rooms::by_id(conn, room.id)?)
        })
    }

    /// Toggle one of the actor's own per-room flags.
    pub fn set_attendee_flag(
        &self,
        token: &str,
        actor: &Actor,
        flag: AttendeeFlag,
        value: bool,
    ) -> CoreResult<Attendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            attendees::set_flag(conn, attendee.id, flag, value)?;
            Ok(attendees::by_id(conn, attendee.id)?)
        })
    }

    pub fn set_notification_level(
        &self,
        token: &str,
        actor: &Actor,
        level: NotificationLevel,
    ) -> CoreResult<Attendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            attendees::set_notification_level(conn, attendee.id, level)?;
            Ok(attendees::by_id(conn, attendee.id)?)
        })
    }
}

pub(crate) fn view(room: Room, attendee: Option<Attendee>, session_id: Option<String>) -> RoomView {
    let permissions = match &attendee {
        Some(a) => effective_permissions(&room, a),
        None => Permissions::resolve(
            room.default_permissions,
            room.call_permissions,
            Permissions::DEFAULT,
        ),
    };
    RoomView {
        room,
        attendee,
        permissions,
        session_id,
    }
}

fn visible_to_outsiders(room: &Room) -> bool {
    room.room_type == RoomType::Public || room.listable != Listable::None
}

fn validate_name(name: &str) -> CoreResult<&str> {
    let name = name.trim();
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::InvalidArgument(format!(
            "room name longer than {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// Insert a room under a freshly generated token, retrying on collisions
/// and growing the token after repeated failures.
pub(crate) fn insert_with_fresh_token(
    conn: &Connection,
    config: &CoreConfig,
    template: &NewRoom<'_>,
    now: DateTime<Utc>,
) -> CoreResult<Room> {
    let mut rng = rand::rng();
    for attempt in 0..MAX_TOKEN_ATTEMPTS {
        let length = (config.token_length + attempt / ATTEMPTS_PER_LENGTH).min(MAX_TOKEN_LENGTH);
        let candidate = token::room_token(&mut rng, length, config.digits_only_tokens);
        if token::is_reserved(&candidate) {
            continue;
        }
        let new = NewRoom {
            token: &candidate,
            ..*template
        };
        match rooms::insert(conn, &new, now) {
            Ok(room) => return Ok(room),
            Err(StoreError::Conflict(_)) => {
                debug!(attempt, length, "room token collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(CoreError::InvalidState("no free room token"))
}
