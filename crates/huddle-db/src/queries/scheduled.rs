use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use huddle_types::Actor;
use huddle_types::models::ScheduledMessage;

use crate::models::{SCHEDULED_COLUMNS, scheduled_from_row, to_ts};
use crate::StoreResult;

pub struct NewScheduledMessage<'a> {
    pub room_id: i64,
    pub actor: &'a Actor,
    pub message: &'a str,
    pub message_type: &'a str,
    pub metadata: &'a serde_json::Value,
    pub thread_id: i64,
    pub parent_id: Option<i64>,
    pub send_at: DateTime<Utc>,
}

pub fn insert(
    conn: &Connection,
    msg: &NewScheduledMessage<'_>,
    now: DateTime<Utc>,
) -> StoreResult<ScheduledMessage> {
    conn.execute(
        "INSERT INTO scheduled_messages (room_id, actor_type, actor_id, message, message_type,
                                         metadata, thread_id, parent_id, send_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            msg.room_id,
            msg.actor.actor_type().as_str(),
            msg.actor.id(),
            msg.message,
            msg.message_type,
            serde_json::to_string(msg.metadata)?,
            msg.thread_id,
            msg.parent_id,
            to_ts(msg.send_at),
            to_ts(now),
        ],
    )?;
    by_id(conn, conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> StoreResult<ScheduledMessage> {
    let sql = format!("SELECT {SCHEDULED_COLUMNS} FROM scheduled_messages WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], scheduled_from_row)?)
}

pub fn update(
    conn: &Connection,
    id: i64,
    message: &str,
    send_at: DateTime<Utc>,
) -> StoreResult<bool> {
    Ok(conn.execute(
        "UPDATE scheduled_messages SET message = ?2, send_at = ?3 WHERE id = ?1",
        params![id, message, to_ts(send_at)],
    )? > 0)
}

pub fn delete(conn: &Connection, id: i64) -> StoreResult<bool> {
    Ok(conn.execute("DELETE FROM scheduled_messages WHERE id = ?1", [id])? > 0)
}

/// Pending messages of one actor in one room, earliest first.
pub fn for_actor(
    conn: &Connection,
    room_id: i64,
    actor: &Actor,
) -> StoreResult<Vec<ScheduledMessage>> {
    let sql = format!(
        "SELECT {SCHEDULED_COLUMNS} FROM scheduled_messages
         WHERE room_id = ?1 AND actor_type = ?2 AND actor_id = ?3
         ORDER BY send_at, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![room_id, actor.actor_type().as_str(), actor.id()],
            scheduled_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Messages whose send time has come, earliest first.
pub fn due(conn: &Connection, now: DateTime<Utc>, limit: u32) -> StoreResult<Vec<ScheduledMessage>> {
    let sql = format!(
        "SELECT {SCHEDULED_COLUMNS} FROM scheduled_messages
         WHERE send_at <= ?1
         ORDER BY send_at, id LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![to_ts(now), limit], scheduled_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_due_only_returns_past_messages() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let actor = Actor::User("fay".into());
        let meta = json!({ "silent": true });
        db.with_conn_mut(|c| {
            for (text, offset) in [("late", 60), ("early", -60)] {
                insert(
                    c,
                    &NewScheduledMessage {
                        room_id: 1,
                        actor: &actor,
                        message: text,
                        message_type: "comment",
                        metadata: &meta,
                        thread_id: 0,
                        parent_id: None,
                        send_at: now + Duration::seconds(offset),
                    },
                    now,
                )?;
            }
            Ok::<_, crate::StoreError>(())
        })
        .unwrap();

        let due = db.with_conn(|c| due(c, now, 10)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].message, "early");
        assert_eq!(due[0].metadata["silent"], true);

        let all = db.with_conn(|c| for_actor(c, 1, &actor)).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message, "early");
    }
}
