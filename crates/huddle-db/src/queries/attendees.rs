use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use huddle_types::models::Attendee;
use huddle_types::{Actor, InvitationState, NotificationLevel, ParticipantType, Permissions};

use crate::models::{ATTENDEE_COLUMNS, attendee_from_row, to_ts};
use crate::{Database, StoreResult};

pub struct NewAttendee<'a> {
    pub room_id: i64,
    pub actor: &'a Actor,
    pub display_name: &'a str,
    pub participant_type: ParticipantType,
    pub state: InvitationState,
}

/// Per-attendee boolean room flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendeeFlag {
    Favorite,
    Archived,
    Important,
    Sensitive,
}

impl AttendeeFlag {
    fn column(self) -> &'static str {
        match self {
            Self::Favorite => "favorite",
            Self::Archived => "archived",
            Self::Important => "important",
            Self::Sensitive => "sensitive",
        }
    }
}

/// Insert an attendee. Another attendee for the same actor in the same room
/// yields `StoreError::Conflict`.
pub fn insert(conn: &Connection, attendee: &NewAttendee<'_>) -> StoreResult<Attendee> {
    conn.execute(
        "INSERT INTO attendees (room_id, actor_type, actor_id, display_name, participant_type, state)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            attendee.room_id,
            attendee.actor.actor_type().as_str(),
            attendee.actor.id(),
            attendee.display_name,
            i64::from(attendee.participant_type),
            i64::from(attendee.state),
        ],
    )?;
    by_id(conn, conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> StoreResult<Attendee> {
    let sql = format!("SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], attendee_from_row)?)
}

pub fn find(conn: &Connection, room_id: i64, actor: &Actor) -> StoreResult<Option<Attendee>> {
    let sql = format!(
        "SELECT {ATTENDEE_COLUMNS} FROM attendees
         WHERE room_id = ?1 AND actor_type = ?2 AND actor_id = ?3"
    );
    Ok(conn
        .query_row(
            &sql,
            params![room_id, actor.actor_type().as_str(), actor.id()],
            attendee_from_row,
        )
        .optional()?)
}

pub fn list(conn: &Connection, room_id: i64) -> StoreResult<Vec<Attendee>> {
    let sql = format!("SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE room_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([room_id], attendee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_permissions(conn: &Connection, id: i64, permissions: Permissions) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees SET permissions = ?2 WHERE id = ?1",
        params![id, permissions.bits()],
    )?;
    Ok(())
}

/// Drop the explicit overrides of everyone below moderator so they inherit
/// a freshly set room value.
pub fn reset_permissions(conn: &Connection, room_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "UPDATE attendees SET permissions = 0
         WHERE room_id = ?1 AND permissions <> 0 AND participant_type NOT IN (1, 2, 6)",
        [room_id],
    )?)
}

pub fn set_participant_type(
    conn: &Connection,
    id: i64,
    participant_type: ParticipantType,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees SET participant_type = ?2 WHERE id = ?1",
        params![id, i64::from(participant_type)],
    )?;
    Ok(())
}

pub fn set_flag(conn: &Connection, id: i64, flag: AttendeeFlag, value: bool) -> StoreResult<()> {
    let sql = format!("UPDATE attendees SET {} = ?2 WHERE id = ?1", flag.column());
    conn.execute(&sql, params![id, value])?;
    Ok(())
}

pub fn set_notification_level(
    conn: &Connection,
    id: i64,
    level: NotificationLevel,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees SET notification_level = ?2 WHERE id = ?1",
        params![id, i64::from(level)],
    )?;
    Ok(())
}

pub fn set_last_joined_call(conn: &Connection, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees SET last_joined_call = ?2 WHERE id = ?1",
        params![id, to_ts(at)],
    )?;
    Ok(())
}

/// Move the read marker forward to `message_id` if it is ahead of the
/// stored one. Returns the marker now stored.
pub fn advance_last_read(conn: &Connection, id: i64, message_id: i64) -> StoreResult<i64> {
    conn.execute(
        "UPDATE attendees SET last_read_message = MAX(last_read_message, ?2) WHERE id = ?1",
        params![id, message_id],
    )?;
    Ok(conn.query_row(
        "SELECT last_read_message FROM attendees WHERE id = ?1",
        [id],
        |r| r.get(0),
    )?)
}

/// Overwrite the read marker, moving it backwards if needed.
pub fn set_last_read(conn: &Connection, id: i64, message_id: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees SET last_read_message = ?2 WHERE id = ?1",
        params![id, message_id],
    )?;
    Ok(())
}

pub fn set_unread_messages(conn: &Connection, id: i64, unread: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees SET unread_messages = ?2 WHERE id = ?1",
        params![id, unread],
    )?;
    Ok(())
}

/// Count one more unread message for everyone in the room but the author.
pub fn bump_unread(conn: &Connection, room_id: i64, author_id: i64) -> StoreResult<usize> {
    Ok(conn.execute(
        "UPDATE attendees SET unread_messages = unread_messages + 1
         WHERE room_id = ?1 AND id <> ?2",
        params![room_id, author_id],
    )?)
}

pub fn register_mention(
    conn: &Connection,
    id: i64,
    message_id: i64,
    direct: bool,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees
         SET last_mention_message = MAX(last_mention_message, ?2),
             last_mention_direct = CASE WHEN ?3 THEN MAX(last_mention_direct, ?2)
                                        ELSE last_mention_direct END
         WHERE id = ?1",
        params![id, message_id, direct],
    )?;
    Ok(())
}

/// Raise the list-level badges for an unread mention inside a thread.
pub fn flag_thread_mention(conn: &Connection, id: i64, direct: bool) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees
         SET has_unread_thread_mentions = 1,
             has_unread_thread_directs = CASE WHEN ?2 THEN 1 ELSE has_unread_thread_directs END
         WHERE id = ?1",
        params![id, direct],
    )?;
    Ok(())
}

pub fn clear_thread_flags(conn: &Connection, id: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE attendees SET has_unread_thread_mentions = 0, has_unread_thread_directs = 0
         WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

/// Delete the attendee. Sessions and thread subscriptions cascade.
pub fn delete(conn: &Connection, id: i64) -> StoreResult<bool> {
    Ok(conn.execute("DELETE FROM attendees WHERE id = ?1", [id])? > 0)
}

/// Delete the attendee if it is transient and has no sessions left.
pub fn delete_if_orphaned(conn: &Connection, id: i64) -> StoreResult<bool> {
    Ok(conn.execute(
        "DELETE FROM attendees
         WHERE id = ?1 AND participant_type IN (4, 5)
           AND NOT EXISTS (SELECT 1 FROM sessions WHERE attendee_id = ?1)",
        [id],
    )? > 0)
}

/// Delete every transient attendee without a session.
pub fn delete_orphaned(conn: &Connection) -> StoreResult<usize> {
    Ok(conn.execute(
        "DELETE FROM attendees
         WHERE participant_type IN (4, 5)
           AND NOT EXISTS (SELECT 1 FROM sessions s WHERE s.attendee_id = attendees.id)",
        [],
    )?)
}

/// Lowest read marker among user attendees, ignoring sentinels.
pub fn last_common_read(conn: &Connection, room_id: i64) -> StoreResult<Option<i64>> {
    Ok(conn.query_row(
        "SELECT MIN(last_read_message) FROM attendees
         WHERE room_id = ?1 AND actor_type = 'users' AND last_read_message > 0",
        [room_id],
        |r| r.get(0),
    )?)
}

impl Database {
    pub fn attendees(&self, room_id: i64) -> StoreResult<Vec<Attendee>> {
        self.with_conn(|conn| list(conn, room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use crate::queries::rooms::{self, NewRoom};
    use huddle_types::RoomType;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let room = db
            .with_conn_mut(|c| {
                rooms::insert(
                    c,
                    &NewRoom {
                        token: "attendee",
                        name: "",
                        room_type: RoomType::Group,
                        object_type: "",
                        object_id: "",
                        default_permissions: Permissions::DEFAULT,
                        remote: None,
                    },
                    Utc::now(),
                )
            })
            .unwrap();
        (db, room.id)
    }

    fn add(db: &Database, room_id: i64, actor: &Actor, ty: ParticipantType) -> StoreResult<Attendee> {
        db.with_conn_mut(|c| {
            insert(
                c,
                &NewAttendee {
                    room_id,
                    actor,
                    display_name: "",
                    participant_type: ty,
                    state: InvitationState::Accepted,
                },
            )
        })
    }

    #[test]
    fn test_one_attendee_per_actor_and_room() {
        let (db, room_id) = setup();
        let alice = Actor::User("alice".into());
        let first = add(&db, room_id, &alice, ParticipantType::User).unwrap();
        assert_eq!(first.last_read_message, -2);
        assert!(first.permissions.is_default());

        let dup = add(&db, room_id, &alice, ParticipantType::User);
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        // Same id under another actor type is a different identity
        add(&db, room_id, &Actor::Guest("alice".into()), ParticipantType::Guest).unwrap();
        assert_eq!(db.attendees(room_id).unwrap().len(), 2);
    }

    #[test]
    fn test_read_marker_does_not_regress() {
        let (db, room_id) = setup();
        let a = add(&db, room_id, &Actor::User("bob".into()), ParticipantType::User).unwrap();
        assert_eq!(db.with_conn_mut(|c| advance_last_read(c, a.id, 42)).unwrap(), 42);
        assert_eq!(db.with_conn_mut(|c| advance_last_read(c, a.id, 41)).unwrap(), 42);
    }

    #[test]
    fn test_reset_keeps_moderator_overrides() {
        let (db, room_id) = setup();
        let owner = add(&db, room_id, &Actor::User("o".into()), ParticipantType::Owner).unwrap();
        let user = add(&db, room_id, &Actor::User("u".into()), ParticipantType::User).unwrap();
        db.with_conn_mut(|c| {
            set_permissions(c, owner.id, Permissions::MAX_CUSTOM)?;
            set_permissions(c, user.id, Permissions::CHAT.union(Permissions::CUSTOM))
        })
        .unwrap();

        assert_eq!(db.with_conn_mut(|c| reset_permissions(c, room_id)).unwrap(), 1);
        let owner = db.with_conn(|c| by_id(c, owner.id)).unwrap();
        let user = db.with_conn(|c| by_id(c, user.id)).unwrap();
        assert_eq!(owner.permissions, Permissions::MAX_CUSTOM);
        assert!(user.permissions.is_default());
    }
}
