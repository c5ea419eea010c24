//! Mapping between SQLite rows and the shared entity types.
//!
//! Timestamps are stored as unix seconds. Enums and bitfields are stored as
//! their integer values and validated on the way out, so a corrupt row
//! surfaces as an error instead of an out-of-range value.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use huddle_types::models::{
    Attendee, Ban, FederationInvite, Message, Room, ScheduledMessage, Session, Thread,
    ThreadAttendee,
};
use huddle_types::{Actor, ActorType, InCallFlags, Permissions, UnknownValue};

pub(crate) const ROOM_COLUMNS: &str = "id, token, name, type, object_type, object_id, \
    default_permissions, call_permissions, lobby_state, lobby_timer, listable, read_only, \
    last_activity, last_message_id, last_pinned_id, has_federation, remote_server, \
    remote_token, created_at";

pub(crate) const ATTENDEE_COLUMNS: &str = "id, room_id, actor_type, actor_id, display_name, \
    participant_type, permissions, favorite, archived, important, sensitive, \
    notification_level, last_joined_call, last_read_message, last_mention_message, \
    last_mention_direct, unread_messages, has_unread_thread_mentions, \
    has_unread_thread_directs, state, hidden_pinned_id";

pub(crate) const SESSION_COLUMNS: &str = "id, attendee_id, session_id, in_call, last_ping";

pub(crate) const THREAD_COLUMNS: &str =
    "id, room_id, last_message_id, num_replies, last_activity, name";

pub(crate) const THREAD_ATTENDEE_COLUMNS: &str = "id, thread_id, room_id, attendee_id, \
    actor_type, actor_id, notification_level, last_read_message, last_mention_message, \
    last_mention_direct";

pub(crate) const BAN_COLUMNS: &str = "id, room_id, banned_actor_type, banned_actor_id, \
    banned_display_name, moderator_actor_type, moderator_actor_id, banned_at, internal_note";

pub(crate) const MESSAGE_COLUMNS: &str =
    "id, room_id, actor_type, actor_id, message, message_type, parent_id, thread_id, created_at";

pub(crate) const SCHEDULED_COLUMNS: &str = "id, room_id, actor_type, actor_id, message, \
    message_type, metadata, thread_id, parent_id, send_at, created_at";

pub(crate) const INVITE_COLUMNS: &str = "id, user_id, state, local_room_id, remote_server, \
    remote_token, remote_attendee_id, inviter_cloud_id, inviter_display_name, room_name, \
    created_at";

pub(crate) fn to_ts(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        conversion_error(
            idx,
            Type::Integer,
            UnknownValue {
                kind: "timestamp",
                value: secs,
            },
        )
    })
}

fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        None => Ok(None),
        Some(_) => ts(row, idx).map(Some),
    }
}

fn int_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: TryFrom<i64, Error = UnknownValue>,
{
    let raw: i64 = row.get(idx)?;
    T::try_from(raw).map_err(|e| conversion_error(idx, Type::Integer, e))
}

fn permissions(row: &Row<'_>, idx: usize) -> rusqlite::Result<Permissions> {
    let raw: i64 = row.get(idx)?;
    Permissions::from_i64(raw).map_err(|e| conversion_error(idx, Type::Integer, e))
}

fn in_call(row: &Row<'_>, idx: usize) -> rusqlite::Result<InCallFlags> {
    let raw: i64 = row.get(idx)?;
    InCallFlags::from_bits(raw).map_err(|e| conversion_error(idx, Type::Integer, e))
}

/// Actor from a `(actor_type, actor_id)` column pair starting at `idx`.
fn actor(row: &Row<'_>, idx: usize) -> rusqlite::Result<Actor> {
    let kind: String = row.get(idx)?;
    let actor_type = kind
        .parse::<ActorType>()
        .map_err(|e| conversion_error(idx, Type::Text, e))?;
    let id: String = row.get(idx + 1)?;
    Ok(Actor::new(actor_type, id))
}

pub(crate) fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        token: row.get(1)?,
        name: row.get(2)?,
        room_type: int_enum(row, 3)?,
        object_type: row.get(4)?,
        object_id: row.get(5)?,
        default_permissions: permissions(row, 6)?,
        call_permissions: permissions(row, 7)?,
        lobby_state: int_enum(row, 8)?,
        lobby_timer: opt_ts(row, 9)?,
        listable: int_enum(row, 10)?,
        read_only: row.get(11)?,
        last_activity: opt_ts(row, 12)?,
        last_message_id: row.get(13)?,
        last_pinned_id: row.get(14)?,
        has_federation: row.get(15)?,
        remote_server: row.get(16)?,
        remote_token: row.get(17)?,
        created_at: ts(row, 18)?,
    })
}

pub(crate) fn attendee_from_row(row: &Row<'_>) -> rusqlite::Result<Attendee> {
    Ok(Attendee {
        id: row.get(0)?,
        room_id: row.get(1)?,
        actor: actor(row, 2)?,
        display_name: row.get(4)?,
        participant_type: int_enum(row, 5)?,
        permissions: permissions(row, 6)?,
        favorite: row.get(7)?,
        archived: row.get(8)?,
        important: row.get(9)?,
        sensitive: row.get(10)?,
        notification_level: int_enum(row, 11)?,
        last_joined_call: opt_ts(row, 12)?,
        last_read_message: row.get(13)?,
        last_mention_message: row.get(14)?,
        last_mention_direct: row.get(15)?,
        unread_messages: row.get(16)?,
        has_unread_thread_mentions: row.get(17)?,
        has_unread_thread_directs: row.get(18)?,
        state: int_enum(row, 19)?,
        hidden_pinned_id: row.get(20)?,
    })
}

pub(crate) fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        attendee_id: row.get(1)?,
        session_id: row.get(2)?,
        in_call: in_call(row, 3)?,
        last_ping: ts(row, 4)?,
    })
}

pub(crate) fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        room_id: row.get(1)?,
        last_message_id: row.get(2)?,
        num_replies: row.get(3)?,
        last_activity: ts(row, 4)?,
        name: row.get(5)?,
    })
}

pub(crate) fn thread_attendee_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadAttendee> {
    thread_attendee_from_row_at(row, 0)
}

/// Subscription columns starting at `at`, for joins that select other
/// columns first.
pub(crate) fn thread_attendee_from_row_at(
    row: &Row<'_>,
    at: usize,
) -> rusqlite::Result<ThreadAttendee> {
    Ok(ThreadAttendee {
        id: row.get(at)?,
        thread_id: row.get(at + 1)?,
        room_id: row.get(at + 2)?,
        attendee_id: row.get(at + 3)?,
        actor: actor(row, at + 4)?,
        notification_level: int_enum(row, at + 6)?,
        last_read_message: row.get(at + 7)?,
        last_mention_message: row.get(at + 8)?,
        last_mention_direct: row.get(at + 9)?,
    })
}

pub(crate) fn ban_from_row(row: &Row<'_>) -> rusqlite::Result<Ban> {
    Ok(Ban {
        id: row.get(0)?,
        room_id: row.get(1)?,
        banned: actor(row, 2)?,
        banned_display_name: row.get(4)?,
        moderator: actor(row, 5)?,
        banned_at: ts(row, 7)?,
        internal_note: row.get(8)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        room_id: row.get(1)?,
        actor: actor(row, 2)?,
        message: row.get(4)?,
        message_type: row.get(5)?,
        parent_id: row.get(6)?,
        thread_id: row.get(7)?,
        created_at: ts(row, 8)?,
    })
}

pub(crate) fn scheduled_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduledMessage> {
    let metadata: String = row.get(6)?;
    Ok(ScheduledMessage {
        id: row.get(0)?,
        room_id: row.get(1)?,
        actor: actor(row, 2)?,
        message: row.get(4)?,
        message_type: row.get(5)?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| conversion_error(6, Type::Text, e))?,
        thread_id: row.get(7)?,
        parent_id: row.get(8)?,
        send_at: ts(row, 9)?,
        created_at: ts(row, 10)?,
    })
}

pub(crate) fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<FederationInvite> {
    Ok(FederationInvite {
        id: row.get(0)?,
        user_id: row.get(1)?,
        state: int_enum(row, 2)?,
        local_room_id: row.get(3)?,
        remote_server: row.get(4)?,
        remote_token: row.get(5)?,
        remote_attendee_id: row.get(6)?,
        inviter_cloud_id: row.get(7)?,
        inviter_display_name: row.get(8)?,
        room_name: row.get(9)?,
        created_at: ts(row, 10)?,
    })
}
