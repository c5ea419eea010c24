use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use huddle_types::models::{Thread, ThreadAttendee};
use huddle_types::{Actor, NotificationLevel};

use crate::models::{
    THREAD_ATTENDEE_COLUMNS, THREAD_COLUMNS, thread_attendee_from_row,
    thread_attendee_from_row_at, thread_from_row, to_ts,
};
use crate::StoreResult;

/// Insert a thread anchored at message `id`. An existing thread for the
/// same anchor yields `StoreError::Conflict`.
pub fn insert(
    conn: &Connection,
    id: i64,
    room_id: i64,
    name: &str,
    now: DateTime<Utc>,
) -> StoreResult<Thread> {
    conn.execute(
        "INSERT INTO threads (id, room_id, last_message_id, num_replies, last_activity, name)
         VALUES (?1, ?2, 0, 0, ?3, ?4)",
        params![id, room_id, to_ts(now), name],
    )?;
    by_id(conn, room_id, id)
}

pub fn by_id(conn: &Connection, room_id: i64, id: i64) -> StoreResult<Thread> {
    let sql = format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1 AND room_id = ?2");
    Ok(conn.query_row(&sql, params![id, room_id], thread_from_row)?)
}

/// Count one more reply. The last message pointer and the activity
/// timestamp only move forward, so out-of-order writers cannot regress them.
pub fn record_reply(
    conn: &Connection,
    id: i64,
    message_id: i64,
    at: DateTime<Utc>,
) -> StoreResult<bool> {
    Ok(conn.execute(
        "UPDATE threads
         SET num_replies = num_replies + 1,
             last_message_id = MAX(last_message_id, ?2),
             last_activity = MAX(last_activity, ?3)
         WHERE id = ?1",
        params![id, message_id, to_ts(at)],
    )? > 0)
}

/// Overwrite the reply statistics after adopting pre-existing replies.
pub fn set_reply_stats(
    conn: &Connection,
    id: i64,
    num_replies: i64,
    last_message_id: i64,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE threads SET num_replies = ?2, last_message_id = MAX(last_message_id, ?3)
         WHERE id = ?1",
        params![id, num_replies, last_message_id],
    )?;
    Ok(())
}

pub fn rename(conn: &Connection, id: i64, name: &str) -> StoreResult<bool> {
    Ok(conn.execute(
        "UPDATE threads SET name = ?2 WHERE id = ?1",
        params![id, name],
    )? > 0)
}

/// Threads of a room, most recently active first.
pub fn recent(conn: &Connection, room_id: i64, limit: u32) -> StoreResult<Vec<Thread>> {
    let sql = format!(
        "SELECT {THREAD_COLUMNS} FROM threads WHERE room_id = ?1
         ORDER BY last_activity DESC, id DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![room_id, limit], thread_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Subscriptions --

pub struct NewSubscription<'a> {
    pub thread_id: i64,
    pub room_id: i64,
    pub attendee_id: i64,
    pub actor: &'a Actor,
    pub notification_level: NotificationLevel,
}

/// Insert a subscription row. A row for the same
/// `(thread, room, actor)` yields `StoreError::Conflict`.
pub fn insert_subscription(
    conn: &Connection,
    sub: &NewSubscription<'_>,
) -> StoreResult<ThreadAttendee> {
    conn.execute(
        "INSERT INTO thread_attendees (thread_id, room_id, attendee_id, actor_type, actor_id, notification_level)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            sub.thread_id,
            sub.room_id,
            sub.attendee_id,
            sub.actor.actor_type().as_str(),
            sub.actor.id(),
            i64::from(sub.notification_level),
        ],
    )?;
    let sql = format!("SELECT {THREAD_ATTENDEE_COLUMNS} FROM thread_attendees WHERE id = ?1");
    Ok(conn.query_row(&sql, [conn.last_insert_rowid()], thread_attendee_from_row)?)
}

pub fn find_subscription(
    conn: &Connection,
    thread_id: i64,
    room_id: i64,
    actor: &Actor,
) -> StoreResult<Option<ThreadAttendee>> {
    let sql = format!(
        "SELECT {THREAD_ATTENDEE_COLUMNS} FROM thread_attendees
         WHERE thread_id = ?1 AND room_id = ?2 AND actor_type = ?3 AND actor_id = ?4"
    );
    Ok(conn
        .query_row(
            &sql,
            params![thread_id, room_id, actor.actor_type().as_str(), actor.id()],
            thread_attendee_from_row,
        )
        .optional()?)
}

pub fn set_subscription_level(
    conn: &Connection,
    subscription_id: i64,
    level: NotificationLevel,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE thread_attendees SET notification_level = ?2 WHERE id = ?1",
        params![subscription_id, i64::from(level)],
    )?;
    Ok(())
}

pub fn advance_thread_read(
    conn: &Connection,
    subscription_id: i64,
    message_id: i64,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE thread_attendees SET last_read_message = MAX(last_read_message, ?2) WHERE id = ?1",
        params![subscription_id, message_id],
    )?;
    Ok(())
}

pub fn register_thread_mention(
    conn: &Connection,
    subscription_id: i64,
    message_id: i64,
    direct: bool,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE thread_attendees
         SET last_mention_message = MAX(last_mention_message, ?2),
             last_mention_direct = CASE WHEN ?3 THEN MAX(last_mention_direct, ?2)
                                        ELSE last_mention_direct END
         WHERE id = ?1",
        params![subscription_id, message_id, direct],
    )?;
    Ok(())
}

/// Whether the attendee still has a mention it has not read in any thread.
pub fn has_unread_mentions(conn: &Connection, attendee_id: i64) -> StoreResult<(bool, bool)> {
    Ok(conn.query_row(
        "SELECT
            COALESCE(MAX(last_mention_message > MAX(last_read_message, 0)), 0),
            COALESCE(MAX(last_mention_direct > MAX(last_read_message, 0)), 0)
         FROM thread_attendees WHERE attendee_id = ?1",
        [attendee_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?)
}

/// Threads the actor follows across all rooms, most recently active first.
/// Subscriptions muted with `Never` are left out.
pub fn subscribed(
    conn: &Connection,
    actor: &Actor,
    limit: u32,
    offset: u32,
) -> StoreResult<Vec<(Thread, ThreadAttendee)>> {
    let thread_cols = THREAD_COLUMNS
        .split(", ")
        .map(|c| format!("t.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sub_cols = THREAD_ATTENDEE_COLUMNS
        .split(", ")
        .map(|c| format!("ta.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {thread_cols}, {sub_cols}
         FROM thread_attendees ta
         JOIN threads t ON t.id = ta.thread_id
         WHERE ta.actor_type = ?1 AND ta.actor_id = ?2 AND ta.notification_level <> ?3
         ORDER BY t.last_activity DESC, t.id DESC
         LIMIT ?4 OFFSET ?5"
    );
    let thread_width = THREAD_COLUMNS.split(", ").count();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                actor.actor_type().as_str(),
                actor.id(),
                i64::from(NotificationLevel::Never),
                limit,
                offset,
            ],
            |row| {
                let thread = thread_from_row(row)?;
                let sub = thread_attendee_from_row_at(row, thread_width)?;
                Ok((thread, sub))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
