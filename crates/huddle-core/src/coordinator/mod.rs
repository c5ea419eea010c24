//! Cross-entity operations.
//!
//! Each public operation opens at most one store transaction; helpers in the
//! submodules take the transaction's `&Connection` so they compose.

mod bans;
mod federation;
mod membership;
mod messages;
mod permissions;
mod read_state;
mod rooms;
mod scheduled;
mod threads;

use std::sync::Arc;

use huddle_db::{Connection, Database, queries};
use huddle_types::models::{Attendee, Room};
use huddle_types::{Actor, Permissions};

use crate::error::{CoreError, CoreResult, Entity, OrNotFound};
use crate::{CoreConfig, Notifier};

pub use federation::InviteParams;
pub use huddle_db::queries::attendees::AttendeeFlag;
pub use membership::{JoinOutcome, JoinRequest};
pub use messages::PostMessage;
pub use rooms::NewRoomParams;
pub use scheduled::ScheduleParams;
pub use threads::thread_title;

/// The only component that mutates more than one entity per operation.
#[derive(Clone)]
pub struct RoomCoordinator {
    db: Arc<Database>,
    config: Arc<CoreConfig>,
    notifier: Notifier,
}

impl RoomCoordinator {
    pub fn new(db: Arc<Database>, config: CoreConfig) -> Self {
        Self {
            db,
            config: Arc::new(config.normalized()),
            notifier: Notifier::new(),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

pub(crate) fn load_room(conn: &Connection, token: &str) -> CoreResult<Room> {
    queries::rooms::by_token(conn, token).or_not_found(Entity::Room)
}

pub(crate) fn require_attendee(conn: &Connection, room: &Room, actor: &Actor) -> CoreResult<Attendee> {
    queries::attendees::find(conn, room.id, actor)?.ok_or(CoreError::NotFound(Entity::Attendee))
}

pub(crate) fn require_moderator(conn: &Connection, room: &Room, actor: &Actor) -> CoreResult<Attendee> {
    let attendee = require_attendee(conn, room, actor)?;
    if !attendee.participant_type.is_moderator() {
        return Err(CoreError::Forbidden("moderator required"));
    }
    Ok(attendee)
}

/// Permissions an attendee actually holds in `room`.
pub(crate) fn effective_permissions(room: &Room, attendee: &Attendee) -> Permissions {
    if attendee.participant_type.is_moderator() {
        return Permissions::MAX_CUSTOM;
    }
    Permissions::resolve(
        room.default_permissions,
        room.call_permissions,
        attendee.permissions,
    )
}

/// Chat capability, with read-only rooms muting everyone but moderators.
pub(crate) fn can_chat(room: &Room, attendee: &Attendee) -> bool {
    if attendee.participant_type.is_moderator() {
        return true;
    }
    !room.read_only && effective_permissions(room, attendee).contains(Permissions::CHAT)
}
