use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use huddle_types::models::Room;
use huddle_types::{Actor, Listable, LobbyState, Permissions, RoomType};

use crate::models::{ROOM_COLUMNS, room_from_row, to_ts};
use crate::{Database, StoreResult};

#[derive(Debug, Clone, Copy)]
pub struct NewRoom<'a> {
    pub token: &'a str,
    pub name: &'a str,
    pub room_type: RoomType,
    pub object_type: &'a str,
    pub object_id: &'a str,
    pub default_permissions: Permissions,
    /// `(server, token)` of the hosting server for federated proxies.
    pub remote: Option<(&'a str, &'a str)>,
}

/// Insert a room. A taken token or remote pair yields `StoreError::Conflict`.
pub fn insert(conn: &Connection, room: &NewRoom<'_>, now: DateTime<Utc>) -> StoreResult<Room> {
    let (remote_server, remote_token) = match room.remote {
        Some((server, token)) => (Some(server), Some(token)),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO rooms (token, name, type, object_type, object_id, default_permissions,
                            has_federation, remote_server, remote_token, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            room.token,
            room.name,
            i64::from(room.room_type),
            room.object_type,
            room.object_id,
            room.default_permissions.bits(),
            room.remote.is_some(),
            remote_server,
            remote_token,
            to_ts(now),
        ],
    )?;
    by_id(conn, conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> StoreResult<Room> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], room_from_row)?)
}

pub fn by_token(conn: &Connection, token: &str) -> StoreResult<Room> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE token = ?1");
    Ok(conn.query_row(&sql, [token], room_from_row)?)
}

pub fn find_proxy(
    conn: &Connection,
    remote_server: &str,
    remote_token: &str,
) -> StoreResult<Option<Room>> {
    let sql = format!(
        "SELECT {ROOM_COLUMNS} FROM rooms WHERE remote_server = ?1 AND remote_token = ?2"
    );
    Ok(conn
        .query_row(&sql, [remote_server, remote_token], room_from_row)
        .optional()?)
}

/// Rooms the actor is an attendee of, most recently active first.
pub fn for_actor(conn: &Connection, actor: &Actor) -> StoreResult<Vec<Room>> {
    let sql = format!(
        "SELECT {ROOM_COLUMNS} FROM rooms
         WHERE id IN (SELECT room_id FROM attendees WHERE actor_type = ?1 AND actor_id = ?2)
         ORDER BY COALESCE(last_activity, created_at) DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![actor.actor_type().as_str(), actor.id()], room_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_default_permissions(
    conn: &Connection,
    room_id: i64,
    permissions: Permissions,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE rooms SET default_permissions = ?2 WHERE id = ?1",
        params![room_id, permissions.bits()],
    )?;
    Ok(())
}

pub fn set_call_permissions(
    conn: &Connection,
    room_id: i64,
    permissions: Permissions,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE rooms SET call_permissions = ?2 WHERE id = ?1",
        params![room_id, permissions.bits()],
    )?;
    Ok(())
}

pub fn set_lobby(
    conn: &Connection,
    room_id: i64,
    state: LobbyState,
    timer: Option<DateTime<Utc>>,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE rooms SET lobby_state = ?2, lobby_timer = ?3 WHERE id = ?1",
        params![room_id, i64::from(state), timer.map(to_ts)],
    )?;
    Ok(())
}

pub fn set_read_only(conn: &Connection, room_id: i64, read_only: bool) -> StoreResult<()> {
    conn.execute(
        "UPDATE rooms SET read_only = ?2 WHERE id = ?1",
        params![room_id, read_only],
    )?;
    Ok(())
}

pub fn set_listable(conn: &Connection, room_id: i64, listable: Listable) -> StoreResult<()> {
    conn.execute(
        "UPDATE rooms SET listable = ?2 WHERE id = ?1",
        params![room_id, i64::from(listable)],
    )?;
    Ok(())
}

pub fn set_name(conn: &Connection, room_id: i64, name: &str) -> StoreResult<()> {
    conn.execute(
        "UPDATE rooms SET name = ?2 WHERE id = ?1",
        params![room_id, name],
    )?;
    Ok(())
}

/// Advance the room's last message pointer. Never moves backwards.
pub fn record_message(
    conn: &Connection,
    room_id: i64,
    message_id: i64,
    at: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE rooms
         SET last_message_id = MAX(last_message_id, ?2),
             last_activity = MAX(COALESCE(last_activity, 0), ?3)
         WHERE id = ?1",
        params![room_id, message_id, to_ts(at)],
    )?;
    Ok(())
}

impl Database {
    pub fn room_by_token(&self, token: &str) -> StoreResult<Room> {
        self.with_conn(|conn| by_token(conn, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    fn new_room(token: &str) -> NewRoom<'_> {
        NewRoom {
            token,
            name: "Standup",
            room_type: RoomType::Group,
            object_type: "",
            object_id: "",
            default_permissions: Permissions::DEFAULT,
            remote: None,
        }
    }

    #[test]
    fn test_token_is_unique() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.with_conn_mut(|c| insert(c, &new_room("abcdefgh"), now))
            .unwrap();
        let dup = db.with_conn_mut(|c| insert(c, &new_room("abcdefgh"), now));
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_record_message_is_monotonic() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let room = db
            .with_conn_mut(|c| insert(c, &new_room("monotone"), now))
            .unwrap();

        db.with_conn_mut(|c| record_message(c, room.id, 10, now)).unwrap();
        db.with_conn_mut(|c| record_message(c, room.id, 7, now)).unwrap();

        let room = db.room_by_token("monotone").unwrap();
        assert_eq!(room.last_message_id, 10);
        assert_eq!(room.last_activity.map(|t| t.timestamp()), Some(now.timestamp()));
    }

    #[test]
    fn test_missing_room_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.room_by_token("nope"), Err(StoreError::NotFound)));
    }
}
