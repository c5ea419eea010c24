use chrono::{DateTime, Utc};
use tracing::debug;

use huddle_db::queries::threads::{self, NewSubscription};
use huddle_db::queries::{attendees, messages};
use huddle_db::{Connection, StoreError};
use huddle_types::models::{Attendee, Message, Room, Thread, ThreadAttendee};
use huddle_types::{Actor, NotificationLevel};

use super::{RoomCoordinator, load_room, require_attendee};
use crate::error::{CoreError, CoreResult, Entity, OrNotFound};
use crate::read_marker;

const MAX_TITLE_CHARS: usize = 203;
const TRUNCATED_TITLE_CHARS: usize = 200;
const MAX_RECENT_THREADS: u32 = 50;
const MAX_SUBSCRIBED_THREADS: u32 = 100;

/// Thread names are capped, overlong ones end in an ellipsis.
pub fn thread_title(title: &str) -> String {
    let title = title.trim();
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_owned();
    }
    let mut short: String = title.chars().take(TRUNCATED_TITLE_CHARS).collect();
    short.push('…');
    short
}

impl RoomCoordinator {
    /// Start a thread at `anchor_id`, or return the one it already belongs to.
    pub fn ensure_thread(
        &self,
        token: &str,
        actor: &Actor,
        anchor_id: i64,
        title: &str,
    ) -> CoreResult<Thread> {
        let now = Utc::now();
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            let anchor = message_in_room(conn, &room, anchor_id)?;
            ensure_thread_in(conn, &room, &anchor, title, now)
        })
    }

    pub fn thread(&self, token: &str, actor: &Actor, thread_id: i64) -> CoreResult<Thread> {
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            threads::by_id(conn, room.id, thread_id).or_not_found(Entity::Thread)
        })
    }

    /// Threads of the room by last activity.
    pub fn recent_threads(&self, token: &str, actor: &Actor, limit: u32) -> CoreResult<Vec<Thread>> {
        let limit = limit.clamp(1, MAX_RECENT_THREADS);
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            Ok(threads::recent(conn, room.id, limit)?)
        })
    }

    /// Threads `actor` follows across rooms, muted ones excluded.
    pub fn subscribed_threads(
        &self,
        actor: &Actor,
        limit: u32,
        offset: u32,
    ) -> CoreResult<Vec<(Thread, ThreadAttendee)>> {
        let limit = limit.clamp(1, MAX_SUBSCRIBED_THREADS);
        Ok(self
            .db
            .with_conn(|conn| threads::subscribed(conn, actor, limit, offset))?)
    }

    /// Follow a thread at `level`. Subscribing again only changes the level.
    pub fn subscribe(
        &self,
        token: &str,
        actor: &Actor,
        thread_id: i64,
        level: NotificationLevel,
    ) -> CoreResult<ThreadAttendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            threads::by_id(conn, room.id, thread_id).or_not_found(Entity::Thread)?;
            subscribe_in(conn, room.id, &attendee, thread_id, Some(level))
        })
    }

    /// Rename a thread. Allowed for moderators and the author of the anchor.
    pub fn rename_thread(
        &self,
        token: &str,
        actor: &Actor,
        thread_id: i64,
        title: &str,
    ) -> CoreResult<Thread> {
        let title = thread_title(title);
        if title.is_empty() {
            return Err(CoreError::InvalidArgument("thread title must not be empty".into()));
        }
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            threads::by_id(conn, room.id, thread_id).or_not_found(Entity::Thread)?;
            let anchor = messages::by_id(conn, thread_id).or_not_found(Entity::Message)?;
            if !attendee.participant_type.is_moderator() && anchor.actor != attendee.actor {
                return Err(CoreError::Forbidden("only moderators or the thread author can rename"));
            }
            threads::rename(conn, thread_id, &title)?;
            Ok(threads::by_id(conn, room.id, thread_id)?)
        })
    }

    /// Read a thread up to `message_id` and refresh the list-level badges.
    pub fn mark_thread_read(
        &self,
        token: &str,
        actor: &Actor,
        thread_id: i64,
        message_id: Option<i64>,
    ) -> CoreResult<ThreadAttendee> {
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            let thread = threads::by_id(conn, room.id, thread_id).or_not_found(Entity::Thread)?;
            let sub = subscribe_in(conn, room.id, &attendee, thread_id, None)?;
            let upto = match message_id {
                Some(id) => read_marker::normalize(Some(id)),
                None => thread.last_message_id.max(thread.id),
            };
            threads::advance_thread_read(conn, sub.id, upto)?;
            refresh_thread_flags(conn, attendee.id)?;
            threads::find_subscription(conn, thread_id, room.id, &attendee.actor)?
                .ok_or(CoreError::NotFound(Entity::Thread))
        })
    }
}

/// Thread of `anchor`, created on first use. Replies that were posted before
/// the thread existed are adopted into it.
pub(crate) fn ensure_thread_in(
    conn: &Connection,
    room: &Room,
    anchor: &Message,
    title: &str,
    now: DateTime<Utc>,
) -> CoreResult<Thread> {
    if anchor.thread_id > 0 {
        return threads::by_id(conn, room.id, anchor.thread_id).or_not_found(Entity::Thread);
    }

    let title = thread_title(title);
    let thread = match threads::insert(conn, anchor.id, room.id, &title, now) {
        Ok(thread) => thread,
        // Raced with another writer, the thread is theirs and just as good
        Err(StoreError::Conflict(_)) => return Ok(threads::by_id(conn, room.id, anchor.id)?),
        Err(e) => return Err(e.into()),
    };

    let adopted = messages::adopt_into_thread(conn, room.id, anchor.id)?;
    if adopted > 0 {
        let (replies, last) = messages::reply_stats(conn, thread.id)?;
        threads::set_reply_stats(conn, thread.id, replies, last.unwrap_or(0))?;
    }
    debug!(room = %room.token, thread_id = thread.id, adopted, "thread created");
    Ok(threads::by_id(conn, room.id, thread.id)?)
}

/// Subscription of `attendee` to the thread, created on demand. `level`
/// overwrites the stored level; `None` keeps it.
pub(crate) fn subscribe_in(
    conn: &Connection,
    room_id: i64,
    attendee: &Attendee,
    thread_id: i64,
    level: Option<NotificationLevel>,
) -> CoreResult<ThreadAttendee> {
    if let Some(existing) = threads::find_subscription(conn, thread_id, room_id, &attendee.actor)? {
        return update_level(conn, existing, level);
    }

    let new = NewSubscription {
        thread_id,
        room_id,
        attendee_id: attendee.id,
        actor: &attendee.actor,
        notification_level: level.unwrap_or(NotificationLevel::Default),
    };
    match threads::insert_subscription(conn, &new) {
        Ok(sub) => Ok(sub),
        Err(StoreError::Conflict(_)) => {
            let existing = threads::find_subscription(conn, thread_id, room_id, &attendee.actor)?
                .ok_or(CoreError::NotFound(Entity::Thread))?;
            update_level(conn, existing, level)
        }
        Err(e) => Err(e.into()),
    }
}

fn update_level(
    conn: &Connection,
    mut sub: ThreadAttendee,
    level: Option<NotificationLevel>,
) -> CoreResult<ThreadAttendee> {
    match level {
        Some(level) if level != sub.notification_level => {
            threads::set_subscription_level(conn, sub.id, level)?;
            sub.notification_level = level;
        }
        _ => {}
    }
    Ok(sub)
}

/// Recompute the attendee's "unread mention in some thread" badges.
pub(crate) fn refresh_thread_flags(conn: &Connection, attendee_id: i64) -> CoreResult<()> {
    let (mention, direct) = threads::has_unread_mentions(conn, attendee_id)?;
    attendees::clear_thread_flags(conn, attendee_id)?;
    if mention || direct {
        attendees::flag_thread_mention(conn, attendee_id, direct)?;
    }
    Ok(())
}

pub(crate) fn message_in_room(conn: &Connection, room: &Room, message_id: i64) -> CoreResult<Message> {
    let message = messages::by_id(conn, message_id).or_not_found(Entity::Message)?;
    if message.room_id != room.id {
        return Err(CoreError::NotFound(Entity::Message));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_titles_are_kept() {
        assert_eq!(thread_title("  standup notes "), "standup notes");
        let exact = "x".repeat(203);
        assert_eq!(thread_title(&exact), exact);
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let long = "é".repeat(250);
        let title = thread_title(&long);
        assert_eq!(title.chars().count(), 201);
        assert!(title.ends_with('…'));
    }
}
