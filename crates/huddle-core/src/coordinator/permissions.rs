use tracing::debug;

use huddle_db::queries::attendees;
use huddle_types::models::Attendee;
use huddle_types::{Actor, PermissionMethod, Permissions};

use super::membership::attendee_in_room;
use super::{RoomCoordinator, effective_permissions, load_room, require_attendee, require_moderator};
use crate::error::{CoreError, CoreResult};

impl RoomCoordinator {
    /// Change one attendee's permission override.
    ///
    /// An attendee that still inherits starts from what it currently
    /// resolves to, so `add`/`remove` never touch the room default.
    pub fn grant_permissions(
        &self,
        token: &str,
        moderator: &Actor,
        attendee_id: i64,
        method: PermissionMethod,
        delta: Permissions,
    ) -> CoreResult<Attendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            require_moderator(conn, &room, moderator)?;
            let target = attendee_in_room(conn, &room, attendee_id)?;
            if target.participant_type.is_moderator() {
                return Err(CoreError::Forbidden("moderators always hold every permission"));
            }

            let current = if target.permissions.is_default() {
                effective_permissions(&room, &target)
            } else {
                target.permissions
            };
            let updated = Permissions::apply(method, current, delta);
            attendees::set_permissions(conn, target.id, updated)?;
            debug!(
                room = %token,
                attendee_id,
                ?method,
                from = %current,
                to = %updated,
                "attendee permissions changed"
            );
            Ok(attendees::by_id(conn, target.id)?)
        })
    }

    /// What `actor` may do in the room right now.
    pub fn effective_permissions(&self, token: &str, actor: &Actor) -> CoreResult<Permissions> {
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            Ok(effective_permissions(&room, &attendee))
        })
    }
}
