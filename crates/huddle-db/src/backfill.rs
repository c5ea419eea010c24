//! Data corrections for rows written under older rules.
//!
//! Each function is a guarded `UPDATE` that only touches rows still in the
//! old shape, so running it again after an interruption changes nothing.

use rusqlite::{Connection, params};
use tracing::info;

use huddle_types::Permissions;
use huddle_types::models::UNREAD_FIRST_MESSAGE;

use crate::StoreResult;

/// Rows changed by [`split_permission_bit`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitReport {
    pub room_defaults: usize,
    pub room_calls: usize,
    pub attendees: usize,
}

impl SplitReport {
    pub fn total(&self) -> usize {
        self.room_defaults + self.room_calls + self.attendees
    }
}

/// Grant `new` to every stored bitfield that has `old` but not `new`.
///
/// Applies [`Permissions::split_bit`] to room defaults, room call
/// permissions and attendee overrides in one transaction.
pub fn split_permission_bit(
    conn: &Connection,
    old: Permissions,
    new: Permissions,
) -> StoreResult<SplitReport> {
    let tx = conn.unchecked_transaction()?;
    let (old, new) = (old.bits(), new.bits());

    let report = SplitReport {
        room_defaults: tx.execute(
            "UPDATE rooms SET default_permissions = default_permissions | ?2
             WHERE default_permissions & ?1 = ?1 AND default_permissions & ?2 <> ?2",
            params![old, new],
        )?,
        room_calls: tx.execute(
            "UPDATE rooms SET call_permissions = call_permissions | ?2
             WHERE call_permissions & ?1 = ?1 AND call_permissions & ?2 <> ?2",
            params![old, new],
        )?,
        attendees: tx.execute(
            "UPDATE attendees SET permissions = permissions | ?2
             WHERE permissions & ?1 = ?1 AND permissions & ?2 <> ?2",
            params![old, new],
        )?,
    };
    tx.commit()?;

    info!(
        room_defaults = report.room_defaults,
        room_calls = report.room_calls,
        attendees = report.attendees,
        "permission bit split applied"
    );
    Ok(report)
}

/// Rewrite stored `0` read markers to the "unread from first message"
/// sentinel, at room and thread scope. Returns the rows changed.
pub fn fix_read_marker_sentinel(conn: &Connection) -> StoreResult<usize> {
    let tx = conn.unchecked_transaction()?;
    let attendees = tx.execute(
        "UPDATE attendees SET last_read_message = ?1 WHERE last_read_message = 0",
        [UNREAD_FIRST_MESSAGE],
    )?;
    let threads = tx.execute(
        "UPDATE thread_attendees SET last_read_message = ?1 WHERE last_read_message = 0",
        [UNREAD_FIRST_MESSAGE],
    )?;
    tx.commit()?;

    info!(attendees, threads, "read marker sentinel fixed");
    Ok(attendees + threads)
}
