use tracing::debug;

use huddle_db::Connection;
use huddle_db::queries::{attendees, messages};
use huddle_types::Actor;
use huddle_types::models::{Attendee, UNREAD_FIRST_MESSAGE};

use super::threads::refresh_thread_flags;
use super::{RoomCoordinator, load_room, require_attendee};
use crate::error::CoreResult;
use crate::read_marker;

impl RoomCoordinator {
    /// Read the room up to `message_id`, or to the newest message when absent.
    pub fn mark_read(&self, token: &str, actor: &Actor, message_id: Option<i64>) -> CoreResult<Attendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            let requested = match message_id {
                Some(id) => Some(id),
                None => messages::last_id(conn, room.id)?,
            };
            let marker = attendees::advance_last_read(conn, attendee.id, read_marker::normalize(requested))?;
            recount(conn, &attendee, marker)?;
            refresh_thread_flags(conn, attendee.id)?;
            debug!(room = %token, attendee_id = attendee.id, marker, "room marked read");
            Ok(attendees::by_id(conn, attendee.id)?)
        })
    }

    /// Leave only the newest message unread.
    pub fn mark_unread(&self, token: &str, actor: &Actor) -> CoreResult<Attendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            let marker = match messages::last_id(conn, room.id)? {
                Some(last) => read_marker::unread_marker(messages::previous_id(conn, room.id, last)?),
                None => UNREAD_FIRST_MESSAGE,
            };
            attendees::set_last_read(conn, attendee.id, marker)?;
            recount(conn, &attendee, marker)?;
            debug!(room = %token, attendee_id = attendee.id, marker, "room marked unread");
            Ok(attendees::by_id(conn, attendee.id)?)
        })
    }

    /// Newest message every user in the room has read, for read receipts.
    pub fn last_common_read(&self, token: &str, actor: &Actor) -> CoreResult<Option<i64>> {
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            Ok(attendees::last_common_read(conn, room.id)?)
        })
    }
}

/// Unread count from scratch, so bulk marker moves never double count.
fn recount(conn: &Connection, attendee: &Attendee, marker: i64) -> CoreResult<()> {
    let unread = messages::count_after(conn, attendee.room_id, read_marker::count_floor(marker))?;
    attendees::set_unread_messages(conn, attendee.id, unread)?;
    Ok(())
}
