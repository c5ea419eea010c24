use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use huddle_types::InvitationState;
use huddle_types::models::FederationInvite;

use crate::models::{INVITE_COLUMNS, invite_from_row, to_ts};
use crate::StoreResult;

pub struct NewInvite<'a> {
    pub user_id: &'a str,
    pub remote_server: &'a str,
    pub remote_token: &'a str,
    pub remote_attendee_id: i64,
    pub inviter_cloud_id: &'a str,
    pub inviter_display_name: &'a str,
    pub room_name: &'a str,
}

/// Insert a pending invitation. A second invitation of the same user to the
/// same remote room yields `StoreError::Conflict`.
pub fn insert(
    conn: &Connection,
    invite: &NewInvite<'_>,
    now: DateTime<Utc>,
) -> StoreResult<FederationInvite> {
    conn.execute(
        "INSERT INTO federation_invites (user_id, state, remote_server, remote_token,
                                         remote_attendee_id, inviter_cloud_id,
                                         inviter_display_name, room_name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            invite.user_id,
            i64::from(InvitationState::Invited),
            invite.remote_server,
            invite.remote_token,
            invite.remote_attendee_id,
            invite.inviter_cloud_id,
            invite.inviter_display_name,
            invite.room_name,
            to_ts(now),
        ],
    )?;
    by_id(conn, conn.last_insert_rowid())
}

pub fn by_id(conn: &Connection, id: i64) -> StoreResult<FederationInvite> {
    let sql = format!("SELECT {INVITE_COLUMNS} FROM federation_invites WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], invite_from_row)?)
}

pub fn for_user(conn: &Connection, user_id: &str) -> StoreResult<Vec<FederationInvite>> {
    let sql = format!("SELECT {INVITE_COLUMNS} FROM federation_invites WHERE user_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], invite_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Move an invitation from `from` to `to` only if it is still in `from`.
/// Returns false when another writer changed the state first.
pub fn transition(
    conn: &Connection,
    id: i64,
    from: InvitationState,
    to: InvitationState,
    local_room_id: Option<i64>,
) -> StoreResult<bool> {
    Ok(conn.execute(
        "UPDATE federation_invites
         SET state = ?3, local_room_id = COALESCE(?4, local_room_id)
         WHERE id = ?1 AND state = ?2",
        params![id, i64::from(from), i64::from(to), local_room_id],
    )? > 0)
}
