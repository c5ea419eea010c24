use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

/// Bring the schema up to the latest version. Safe to call on every open.
pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("running migration v1 (rooms, attendees, sessions, messages)");
        apply(
            conn,
            "
            CREATE TABLE rooms (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                token               TEXT NOT NULL UNIQUE,
                name                TEXT NOT NULL DEFAULT '',
                type                INTEGER NOT NULL,
                object_type         TEXT NOT NULL DEFAULT '',
                object_id           TEXT NOT NULL DEFAULT '',
                default_permissions INTEGER NOT NULL DEFAULT 0,
                call_permissions    INTEGER NOT NULL DEFAULT 0,
                lobby_state         INTEGER NOT NULL DEFAULT 0,
                lobby_timer         INTEGER,
                listable            INTEGER NOT NULL DEFAULT 0,
                read_only           INTEGER NOT NULL DEFAULT 0,
                last_activity       INTEGER,
                last_message_id     INTEGER NOT NULL DEFAULT 0,
                last_pinned_id      INTEGER NOT NULL DEFAULT 0,
                has_federation      INTEGER NOT NULL DEFAULT 0,
                remote_server       TEXT,
                remote_token        TEXT,
                created_at          INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX idx_rooms_remote
                ON rooms(remote_server, remote_token)
                WHERE remote_server IS NOT NULL;

            CREATE TABLE attendees (
                id                          INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id                     INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                actor_type                  TEXT NOT NULL,
                actor_id                    TEXT NOT NULL,
                display_name                TEXT NOT NULL DEFAULT '',
                participant_type            INTEGER NOT NULL,
                permissions                 INTEGER NOT NULL DEFAULT 0,
                favorite                    INTEGER NOT NULL DEFAULT 0,
                archived                    INTEGER NOT NULL DEFAULT 0,
                important                   INTEGER NOT NULL DEFAULT 0,
                sensitive                   INTEGER NOT NULL DEFAULT 0,
                notification_level          INTEGER NOT NULL DEFAULT 0,
                last_joined_call            INTEGER,
                last_read_message           INTEGER NOT NULL DEFAULT -2,
                last_mention_message        INTEGER NOT NULL DEFAULT 0,
                last_mention_direct         INTEGER NOT NULL DEFAULT 0,
                unread_messages             INTEGER NOT NULL DEFAULT 0,
                has_unread_thread_mentions  INTEGER NOT NULL DEFAULT 0,
                has_unread_thread_directs   INTEGER NOT NULL DEFAULT 0,
                state                       INTEGER NOT NULL DEFAULT 1,
                hidden_pinned_id            INTEGER NOT NULL DEFAULT 0,
                UNIQUE(room_id, actor_type, actor_id)
            );

            CREATE INDEX idx_attendees_actor ON attendees(actor_type, actor_id);

            CREATE TABLE sessions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                attendee_id     INTEGER NOT NULL REFERENCES attendees(id) ON DELETE CASCADE,
                session_id      TEXT NOT NULL UNIQUE CHECK (length(session_id) <= 512),
                in_call         INTEGER NOT NULL DEFAULT 0,
                last_ping       INTEGER NOT NULL
            );

            CREATE INDEX idx_sessions_attendee ON sessions(attendee_id);
            CREATE INDEX idx_sessions_last_ping ON sessions(last_ping);

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id         INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                actor_type      TEXT NOT NULL,
                actor_id        TEXT NOT NULL,
                message         TEXT NOT NULL,
                message_type    TEXT NOT NULL DEFAULT 'comment',
                parent_id       INTEGER,
                thread_id       INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_messages_room ON messages(room_id, id);
            CREATE INDEX idx_messages_parent ON messages(parent_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("running migration v2 (threads)");
        apply(
            conn,
            "
            CREATE TABLE threads (
                id              INTEGER PRIMARY KEY,
                room_id         INTEGER NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                last_message_id INTEGER NOT NULL DEFAULT 0,
                num_replies     INTEGER NOT NULL DEFAULT 0,
                last_activity   INTEGER NOT NULL,
                name            TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX idx_threads_room_activity ON threads(room_id, last_activity DESC);
            CREATE INDEX idx_messages_thread ON messages(thread_id, id);

            CREATE TABLE thread_attendees (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id               INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
                room_id                 INTEGER NOT NULL,
                attendee_id             INTEGER NOT NULL REFERENCES attendees(id) ON DELETE CASCADE,
                actor_type              TEXT NOT NULL,
                actor_id                TEXT NOT NULL,
                notification_level      INTEGER NOT NULL DEFAULT 0,
                last_read_message       INTEGER NOT NULL DEFAULT -2,
                last_mention_message    INTEGER NOT NULL DEFAULT 0,
                last_mention_direct     INTEGER NOT NULL DEFAULT 0,
                UNIQUE(thread_id, room_id, actor_type, actor_id)
            );

            CREATE INDEX idx_thread_attendees_actor ON thread_attendees(actor_type, actor_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("running migration v3 (bans, scheduled messages, federation invites)");
        apply(
            conn,
            "
            CREATE TABLE bans (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id                 INTEGER REFERENCES rooms(id) ON DELETE CASCADE,
                banned_actor_type       TEXT NOT NULL,
                banned_actor_id         TEXT NOT NULL,
                banned_display_name     TEXT NOT NULL DEFAULT '',
                moderator_actor_type    TEXT NOT NULL,
                moderator_actor_id      TEXT NOT NULL,
                banned_at               INTEGER NOT NULL,
                internal_note           TEXT NOT NULL DEFAULT ''
            );

            -- NULL room ids are instance-wide bans and must collide with each other too
            CREATE UNIQUE INDEX idx_bans_actor_room
                ON bans(banned_actor_type, banned_actor_id, IFNULL(room_id, 0));

            CREATE TABLE scheduled_messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id         INTEGER NOT NULL,
                actor_type      TEXT NOT NULL,
                actor_id        TEXT NOT NULL,
                message         TEXT NOT NULL,
                message_type    TEXT NOT NULL DEFAULT 'comment',
                metadata        TEXT NOT NULL DEFAULT '{}',
                thread_id       INTEGER NOT NULL DEFAULT 0,
                parent_id       INTEGER,
                send_at         INTEGER NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_scheduled_send_at ON scheduled_messages(send_at);
            CREATE INDEX idx_scheduled_room_actor
                ON scheduled_messages(room_id, actor_type, actor_id);

            CREATE TABLE federation_invites (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id                 TEXT NOT NULL,
                state                   INTEGER NOT NULL DEFAULT 0,
                local_room_id           INTEGER REFERENCES rooms(id) ON DELETE SET NULL,
                remote_server           TEXT NOT NULL,
                remote_token            TEXT NOT NULL,
                remote_attendee_id      INTEGER NOT NULL,
                inviter_cloud_id        TEXT NOT NULL,
                inviter_display_name    TEXT NOT NULL DEFAULT '',
                room_name               TEXT NOT NULL DEFAULT '',
                created_at              INTEGER NOT NULL,
                UNIQUE(user_id, remote_server, remote_token)
            );

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    Ok(())
}

/// One version step. A step that fails halfway leaves nothing behind.
fn apply(conn: &Connection, sql: &str) -> StoreResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn test_failed_step_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE messages (stray INTEGER);").unwrap();
        assert!(run(&conn).is_err());

        let rooms: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'rooms'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(rooms, 0);

        conn.execute_batch("DROP TABLE messages;").unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn test_session_id_width_limit() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO rooms (token, type, created_at) VALUES ('abcdefgh', 3, 0);
             INSERT INTO attendees (room_id, actor_type, actor_id, participant_type)
                VALUES (1, 'users', 'alice', 1);",
        )
        .unwrap();

        let ok = "s".repeat(512);
        conn.execute(
            "INSERT INTO sessions (attendee_id, session_id, last_ping) VALUES (1, ?1, 0)",
            [&ok],
        )
        .unwrap();

        let too_long = "t".repeat(513);
        assert!(
            conn.execute(
                "INSERT INTO sessions (attendee_id, session_id, last_ping) VALUES (1, ?1, 0)",
                [&too_long],
            )
            .is_err()
        );
    }
}
