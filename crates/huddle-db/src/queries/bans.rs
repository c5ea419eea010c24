use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use huddle_types::Actor;
use huddle_types::models::Ban;

use crate::models::{BAN_COLUMNS, ban_from_row, to_ts};
use crate::StoreResult;

pub struct NewBan<'a> {
    /// `None` bans the actor from every room.
    pub room_id: Option<i64>,
    pub banned: &'a Actor,
    pub banned_display_name: &'a str,
    pub moderator: &'a Actor,
    pub internal_note: &'a str,
}

/// Insert a ban. Banning the same actor twice in the same scope yields
/// `StoreError::Conflict`.
pub fn insert(conn: &Connection, ban: &NewBan<'_>, now: DateTime<Utc>) -> StoreResult<Ban> {
    conn.execute(
        "INSERT INTO bans (room_id, banned_actor_type, banned_actor_id, banned_display_name,
                           moderator_actor_type, moderator_actor_id, banned_at, internal_note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            ban.room_id,
            ban.banned.actor_type().as_str(),
            ban.banned.id(),
            ban.banned_display_name,
            ban.moderator.actor_type().as_str(),
            ban.moderator.id(),
            to_ts(now),
            ban.internal_note,
        ],
    )?;
    let sql = format!("SELECT {BAN_COLUMNS} FROM bans WHERE id = ?1");
    Ok(conn.query_row(&sql, [conn.last_insert_rowid()], ban_from_row)?)
}

pub fn delete(conn: &Connection, room_id: i64, ban_id: i64) -> StoreResult<bool> {
    Ok(conn.execute(
        "DELETE FROM bans WHERE id = ?1 AND room_id = ?2",
        params![ban_id, room_id],
    )? > 0)
}

pub fn for_room(conn: &Connection, room_id: i64) -> StoreResult<Vec<Ban>> {
    let sql = format!("SELECT {BAN_COLUMNS} FROM bans WHERE room_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([room_id], ban_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// First ban in this room or instance-wide matching any of `actors`.
pub fn find_any(conn: &Connection, room_id: i64, actors: &[&Actor]) -> StoreResult<Option<Ban>> {
    let sql = format!(
        "SELECT {BAN_COLUMNS} FROM bans
         WHERE (room_id = ?1 OR room_id IS NULL)
           AND banned_actor_type = ?2 AND banned_actor_id = ?3
         ORDER BY room_id IS NULL, id
         LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    for actor in actors {
        let hit = stmt
            .query_row(
                params![room_id, actor.actor_type().as_str(), actor.id()],
                ban_from_row,
            )
            .optional()?;
        if hit.is_some() {
            return Ok(hit);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::rooms::{self, NewRoom};
    use crate::{Database, StoreError};
    use huddle_types::{Permissions, RoomType};

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let room = db
            .with_conn_mut(|c| {
                rooms::insert(
                    c,
                    &NewRoom {
                        token: "bannable",
                        name: "",
                        room_type: RoomType::Public,
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

    fn ban(db: &Database, room_id: Option<i64>, who: &Actor) -> StoreResult<Ban> {
        let moderator = Actor::User("mod".into());
        db.with_conn_mut(|c| {
            insert(
                c,
                &NewBan {
                    room_id,
                    banned: who,
                    banned_display_name: "",
                    moderator: &moderator,
                    internal_note: "spam",
                },
                Utc::now(),
            )
        })
    }

    #[test]
    fn test_double_ban_conflicts() {
        let (db, room_id) = setup();
        let troll = Actor::Guest("abc".into());
        ban(&db, Some(room_id), &troll).unwrap();
        assert!(matches!(ban(&db, Some(room_id), &troll), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_instance_wide_bans_are_unique_too() {
        let (db, _) = setup();
        let troll = Actor::User("troll".into());
        ban(&db, None, &troll).unwrap();
        assert!(matches!(ban(&db, None, &troll), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_find_matches_aliases_and_instance_bans() {
        let (db, room_id) = setup();
        let user = Actor::User("zed".into());
        let guest = Actor::Guest("cafe".into());
        ban(&db, None, &guest).unwrap();

        let hit = db
            .with_conn(|c| find_any(c, room_id, &[&user, &guest]))
            .unwrap()
            .unwrap();
        assert_eq!(hit.banned, guest);
        assert_eq!(hit.room_id, None);

        let miss = db.with_conn(|c| find_any(c, room_id, &[&user])).unwrap();
        assert!(miss.is_none());
    }
}
