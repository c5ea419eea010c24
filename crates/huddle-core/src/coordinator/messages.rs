use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use huddle_db::Connection;
use huddle_db::queries::messages::{self, NewMessage};
use huddle_db::queries::{attendees, rooms, threads};
use huddle_types::models::{Attendee, Message, NO_THREAD, Room};
use huddle_types::Actor;

use super::threads::{ensure_thread_in, message_in_room, subscribe_in};
use super::{RoomCoordinator, can_chat, load_room, require_attendee};
use crate::error::{CoreError, CoreResult, Entity, OrNotFound};
use crate::notifier::{PollOutcome, RoomActivity};

pub(crate) const COMMENT: &str = "comment";
const MAX_PAGE: u32 = 200;
const MAX_MESSAGE_CHARS: usize = 32_000;

#[derive(Debug, Clone, Default)]
pub struct PostMessage {
    pub text: String,
    /// Replying starts a thread at the parent if it has none yet.
    pub reply_to: Option<i64>,
    pub thread_id: Option<i64>,
    pub mentions: Vec<Actor>,
    /// `@all`, a non-direct mention of everyone in the room.
    pub mention_all: bool,
}

impl RoomCoordinator {
    pub fn post_message(&self, token: &str, actor: &Actor, post: PostMessage) -> CoreResult<Message> {
        let now = Utc::now();
        let message = self.db.with_tx(|conn| -> CoreResult<Message> {
            let room = load_room(conn, token)?;
            let author = require_attendee(conn, &room, actor)?;
            post_in(conn, &room, &author, &post, COMMENT, now)
        })?;

        self.notifier.notify(RoomActivity {
            room_id: message.room_id,
            last_message_id: message.id,
        });
        Ok(message)
    }

    /// Messages after `since_id`, oldest first.
    pub fn messages(
        &self,
        token: &str,
        actor: &Actor,
        since_id: i64,
        limit: u32,
    ) -> CoreResult<Vec<Message>> {
        let limit = limit.clamp(1, MAX_PAGE);
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            Ok(messages::since(conn, room.id, since_id, limit)?)
        })
    }

    /// Replies of one thread, anchor first.
    pub fn thread_messages(
        &self,
        token: &str,
        actor: &Actor,
        thread_id: i64,
        limit: u32,
    ) -> CoreResult<Vec<Message>> {
        let limit = limit.clamp(1, MAX_PAGE);
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            threads::by_id(conn, room.id, thread_id).or_not_found(Entity::Thread)?;
            Ok(messages::in_thread(conn, thread_id, limit)?)
        })
    }

    /// Wait until the room has messages newer than `last_known_id`, for at
    /// most the clamped `timeout`.
    pub async fn wait_for_messages(
        &self,
        token: &str,
        actor: &Actor,
        last_known_id: i64,
        limit: u32,
        timeout: Duration,
    ) -> CoreResult<PollOutcome> {
        let limit = limit.clamp(1, MAX_PAGE);
        let deadline = Instant::now() + self.config.clamp_long_poll(timeout);

        // Subscribe before looking, so a post in between is not missed
        let mut activity = self.notifier.subscribe();
        let room_id = self.db.with_conn(|conn| -> CoreResult<i64> {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            Ok(room.id)
        })?;

        loop {
            let fresh = self
                .db
                .with_conn(|conn| messages::since(conn, room_id, last_known_id, limit))?;
            if !fresh.is_empty() {
                return Ok(PollOutcome::Modified(fresh));
            }

            loop {
                match timeout_at(deadline, activity.recv()).await {
                    Err(_elapsed) => return Ok(PollOutcome::NotModified),
                    Ok(Ok(event)) if event.room_id == room_id && event.last_message_id > last_known_id => {
                        break;
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(RecvError::Lagged(skipped))) => {
                        debug!(room = %token, skipped, "long-poll lagged, rechecking");
                        break;
                    }
                    Ok(Err(RecvError::Closed)) => return Ok(PollOutcome::NotModified),
                }
            }
        }
    }
}

/// Store a message from `author` and update everything that hangs off it:
/// room pointers, thread counters, read markers, unread counts, mentions.
pub(crate) fn post_in(
    conn: &Connection,
    room: &Room,
    author: &Attendee,
    post: &PostMessage,
    message_type: &str,
    now: DateTime<Utc>,
) -> CoreResult<Message> {
    if !can_chat(room, author) {
        return Err(CoreError::Forbidden("chat not permitted"));
    }
    let text = post.text.trim();
    if text.is_empty() {
        return Err(CoreError::InvalidArgument("message must not be empty".into()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CoreError::InvalidArgument(format!(
            "message longer than {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let thread_id = match (post.reply_to, post.thread_id) {
        (Some(parent_id), _) => {
            let parent = message_in_room(conn, room, parent_id)?;
            ensure_thread_in(conn, room, &parent, "", now)?.id
        }
        (None, Some(thread_id)) => threads::by_id(conn, room.id, thread_id)
            .or_not_found(Entity::Thread)?
            .id,
        (None, None) => NO_THREAD,
    };

    let message = messages::insert(
        conn,
        &NewMessage {
            room_id: room.id,
            actor: &author.actor,
            message: text,
            message_type,
            parent_id: post.reply_to,
            thread_id,
        },
        now,
    )?;
    rooms::record_message(conn, room.id, message.id, now)?;
    attendees::advance_last_read(conn, author.id, message.id)?;
    attendees::set_unread_messages(conn, author.id, 0)?;
    attendees::bump_unread(conn, room.id, author.id)?;

    if thread_id != NO_THREAD {
        threads::record_reply(conn, thread_id, message.id, now)?;
        let sub = subscribe_in(conn, room.id, author, thread_id, None)?;
        threads::advance_thread_read(conn, sub.id, message.id)?;
    }

    register_mentions(conn, room, author, post, &message)?;
    debug!(room = %room.token, message_id = message.id, thread_id, "message posted");
    Ok(message)
}

fn register_mentions(
    conn: &Connection,
    room: &Room,
    author: &Attendee,
    post: &PostMessage,
    message: &Message,
) -> CoreResult<()> {
    let mut targets: Vec<(Attendee, bool)> = Vec::new();
    for actor in &post.mentions {
        if let Some(attendee) = attendees::find(conn, room.id, actor)? {
            if attendee.id != author.id && !targets.iter().any(|(t, _)| t.id == attendee.id) {
                targets.push((attendee, true));
            }
        }
    }
    if post.mention_all {
        for attendee in attendees::list(conn, room.id)? {
            if attendee.id != author.id && !targets.iter().any(|(t, _)| t.id == attendee.id) {
                targets.push((attendee, false));
            }
        }
    }

    for (attendee, direct) in &targets {
        attendees::register_mention(conn, attendee.id, message.id, *direct)?;
        if message.thread_id != NO_THREAD {
            let sub = subscribe_in(conn, room.id, attendee, message.thread_id, None)?;
            threads::register_thread_mention(conn, sub.id, message.id, *direct)?;
            attendees::flag_thread_mention(conn, attendee.id, *direct)?;
        }
    }
    Ok(())
}
