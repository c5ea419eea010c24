use chrono::Utc;
use tracing::info;

use huddle_db::StoreError;
use huddle_db::queries::attendees;
use huddle_db::queries::bans::{self, NewBan};
use huddle_types::Actor;
use huddle_types::models::Ban;

use super::{RoomCoordinator, load_room, require_moderator};
use crate::error::{CoreError, CoreResult, Entity};

impl RoomCoordinator {
    /// Ban `banned` from the room and drop its membership at once.
    pub fn ban_actor(
        &self,
        token: &str,
        moderator: &Actor,
        banned: &Actor,
        internal_note: &str,
    ) -> CoreResult<Ban> {
        let now = Utc::now();
        let ban = self.db.with_tx(|conn| -> CoreResult<Ban> {
            let room = load_room(conn, token)?;
            require_moderator(conn, &room, moderator)?;

            let target = attendees::find(conn, room.id, banned)?;
            if target
                .as_ref()
                .is_some_and(|a| a.participant_type.is_moderator())
            {
                return Err(CoreError::Forbidden("moderators cannot be banned"));
            }

            let display_name = target.as_ref().map_or("", |a| a.display_name.as_str());
            let ban = match bans::insert(
                conn,
                &NewBan {
                    room_id: Some(room.id),
                    banned,
                    banned_display_name: display_name,
                    moderator,
                    internal_note,
                },
                now,
            ) {
                Ok(ban) => ban,
                Err(StoreError::Conflict(_)) => return Err(CoreError::AlreadyBanned),
                Err(e) => return Err(e.into()),
            };

            // Sessions and thread subscriptions go with the attendee
            if let Some(target) = target {
                attendees::delete(conn, target.id)?;
            }
            Ok(ban)
        })?;

        info!(room = %token, banned = %banned, by = %moderator, "actor banned");
        Ok(ban)
    }

    pub fn unban(&self, token: &str, moderator: &Actor, ban_id: i64) -> CoreResult<()> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            require_moderator(conn, &room, moderator)?;
            if !bans::delete(conn, room.id, ban_id)? {
                return Err(CoreError::NotFound(Entity::Ban));
            }
            info!(room = %token, ban_id, "ban lifted");
            Ok(())
        })
    }

    pub fn bans(&self, token: &str, moderator: &Actor) -> CoreResult<Vec<Ban>> {
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_moderator(conn, &room, moderator)?;
            Ok(bans::for_room(conn, room.id)?)
        })
    }
}
