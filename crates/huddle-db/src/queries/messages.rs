use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use huddle_types::Actor;
use huddle_types::models::Message;

use crate::models::{MESSAGE_COLUMNS, message_from_row, to_ts};
use crate::{Database, StoreResult};

pub struct NewMessage<'a> {
    pub room_id: i64,
    pub actor: &'a Actor,
    pub message: &'a str,
    pub message_type: &'a str,
    pub parent_id: Option<i64>,
    pub thread_id: i64,
}

pub fn insert(conn: &Connection, msg: &NewMessage<'_>, now: DateTime<Utc>) -> StoreResult<Message> {
    conn.execute(
        "INSERT INTO messages (room_id, actor_type, actor_id, message, message_type, parent_id, thread_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            msg.room_id,
            msg.actor.actor_type().as_str(),
            msg.actor.id(),
            msg.message,
            msg.message_type,
            msg.parent_id,
            msg.thread_id,
            to_ts(now),
        ],
    )?;
    by_id(conn, conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> StoreResult<Message> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], message_from_row)?)
}

/// Messages of the room newer than `since_id`, oldest first.
pub fn since(conn: &Connection, room_id: i64, since_id: i64, limit: u32) -> StoreResult<Vec<Message>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE room_id = ?1 AND id > ?2
         ORDER BY id ASC LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![room_id, since_id, limit], message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Messages of one thread, anchor included, oldest first.
pub fn in_thread(conn: &Connection, thread_id: i64, limit: u32) -> StoreResult<Vec<Message>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE thread_id = ?1
         ORDER BY id ASC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![thread_id, limit], message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_after(conn: &Connection, room_id: i64, after_id: i64) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE room_id = ?1 AND id > ?2",
        params![room_id, after_id],
        |r| r.get(0),
    )?)
}

pub fn last_id(conn: &Connection, room_id: i64) -> StoreResult<Option<i64>> {
    Ok(conn.query_row(
        "SELECT MAX(id) FROM messages WHERE room_id = ?1",
        [room_id],
        |r| r.get(0),
    )?)
}

/// Id of the message right before `before_id` in the room.
pub fn previous_id(conn: &Connection, room_id: i64, before_id: i64) -> StoreResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM messages WHERE room_id = ?1 AND id < ?2 ORDER BY id DESC LIMIT 1",
            params![room_id, before_id],
            |r| r.get(0),
        )
        .optional()?)
}

/// Move the anchor and its direct replies that are not yet threaded into
/// thread `anchor_id`. Returns how many replies moved, anchor excluded.
pub fn adopt_into_thread(conn: &Connection, room_id: i64, anchor_id: i64) -> StoreResult<usize> {
    conn.execute(
        "UPDATE messages SET thread_id = ?2 WHERE room_id = ?1 AND id = ?2 AND thread_id = 0",
        params![room_id, anchor_id],
    )?;
    Ok(conn.execute(
        "UPDATE messages SET thread_id = ?2
         WHERE room_id = ?1 AND parent_id = ?2 AND thread_id = 0",
        params![room_id, anchor_id],
    )?)
}

/// `(reply count, newest reply id)` of a thread, anchor excluded.
pub fn reply_stats(conn: &Connection, thread_id: i64) -> StoreResult<(i64, Option<i64>)> {
    Ok(conn.query_row(
        "SELECT COUNT(*), MAX(id) FROM messages WHERE thread_id = ?1 AND id <> ?1",
        [thread_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?)
}

impl Database {
    pub fn messages_since(&self, room_id: i64, since_id: i64, limit: u32) -> StoreResult<Vec<Message>> {
        self.with_conn(|conn| since(conn, room_id, since_id, limit))
    }
}
