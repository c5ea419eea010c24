use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use huddle_types::InCallFlags;
use huddle_types::models::Session;

use crate::models::{SESSION_COLUMNS, session_from_row, to_ts};
use crate::StoreResult;

/// Insert a session. A session id that is already live yields
/// `StoreError::Conflict`.
pub fn insert(
    conn: &Connection,
    attendee_id: i64,
    session_id: &str,
    now: DateTime<Utc>,
) -> StoreResult<Session> {
    conn.execute(
        "INSERT INTO sessions (attendee_id, session_id, in_call, last_ping) VALUES (?1, ?2, 0, ?3)",
        params![attendee_id, session_id, to_ts(now)],
    )?;
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    Ok(conn.query_row(&sql, [conn.last_insert_rowid()], session_from_row)?)
}

pub fn find(conn: &Connection, session_id: &str) -> StoreResult<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1");
    Ok(conn.query_row(&sql, [session_id], session_from_row).optional()?)
}

pub fn for_attendee(conn: &Connection, attendee_id: i64) -> StoreResult<Vec<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE attendee_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([attendee_id], session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete one session by its id. Deleting a missing session is a no-op.
pub fn delete(conn: &Connection, session_id: &str) -> StoreResult<bool> {
    Ok(conn.execute("DELETE FROM sessions WHERE session_id = ?1", [session_id])? > 0)
}

pub fn touch(conn: &Connection, session_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
    Ok(conn.execute(
        "UPDATE sessions SET last_ping = MAX(last_ping, ?2) WHERE session_id = ?1",
        params![session_id, to_ts(now)],
    )? > 0)
}

pub fn set_in_call(conn: &Connection, session_id: &str, flags: InCallFlags) -> StoreResult<bool> {
    Ok(conn.execute(
        "UPDATE sessions SET in_call = ?2 WHERE session_id = ?1",
        params![session_id, flags.bits()],
    )? > 0)
}

/// Live sessions of the room that are currently in the call.
pub fn count_in_call(conn: &Connection, room_id: i64) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM sessions s
         JOIN attendees a ON a.id = s.attendee_id
         WHERE a.room_id = ?1 AND s.in_call <> 0",
        [room_id],
        |r| r.get(0),
    )?)
}

/// Delete sessions whose last ping is older than `cutoff`.
pub fn delete_stale(conn: &Connection, cutoff: DateTime<Utc>) -> StoreResult<usize> {
    Ok(conn.execute("DELETE FROM sessions WHERE last_ping < ?1", [to_ts(cutoff)])?)
}
