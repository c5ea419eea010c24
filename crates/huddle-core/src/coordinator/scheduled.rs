use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use huddle_db::Connection;
use huddle_db::queries::scheduled::{self, NewScheduledMessage};
use huddle_db::queries::{attendees, rooms, threads};
use huddle_types::Actor;
use huddle_types::models::{Message, NO_THREAD, ScheduledMessage};

use super::messages::{COMMENT, PostMessage, post_in};
use super::{RoomCoordinator, can_chat, load_room, require_attendee};
use crate::error::{CoreError, CoreResult, Entity, OrNotFound};
use crate::notifier::RoomActivity;

/// Due messages handled per sweep.
const DISPATCH_BATCH: u32 = 100;

#[derive(Debug, Clone)]
pub struct ScheduleParams {
    pub text: String,
    pub send_at: DateTime<Utc>,
    pub thread_id: Option<i64>,
    pub reply_to: Option<i64>,
    pub metadata: serde_json::Value,
}

impl RoomCoordinator {
    pub fn schedule_message(
        &self,
        token: &str,
        actor: &Actor,
        params: &ScheduleParams,
    ) -> CoreResult<ScheduledMessage> {
        let now = Utc::now();
        if params.send_at <= now {
            return Err(CoreError::InvalidArgument("send time must be in the future".into()));
        }
        if params.text.trim().is_empty() {
            return Err(CoreError::InvalidArgument("message must not be empty".into()));
        }
        self.db.with_tx(|conn| {
            let room = load_room(conn, token)?;
            let attendee = require_attendee(conn, &room, actor)?;
            if !can_chat(&room, &attendee) {
                return Err(CoreError::Forbidden("chat not permitted"));
            }
            let thread_id = match params.thread_id {
                Some(id) if id != NO_THREAD => {
                    threads::by_id(conn, room.id, id).or_not_found(Entity::Thread)?.id
                }
                _ => NO_THREAD,
            };
            let scheduled = scheduled::insert(
                conn,
                &NewScheduledMessage {
                    room_id: room.id,
                    actor,
                    message: params.text.trim(),
                    message_type: COMMENT,
                    metadata: &params.metadata,
                    thread_id,
                    parent_id: params.reply_to,
                    send_at: params.send_at,
                },
                now,
            )?;
            debug!(room = %token, id = scheduled.id, send_at = %params.send_at, "message scheduled");
            Ok(scheduled)
        })
    }

    pub fn edit_scheduled(
        &self,
        token: &str,
        actor: &Actor,
        id: i64,
        text: &str,
        send_at: DateTime<Utc>,
    ) -> CoreResult<ScheduledMessage> {
        if send_at <= Utc::now() {
            return Err(CoreError::InvalidArgument("send time must be in the future".into()));
        }
        if text.trim().is_empty() {
            return Err(CoreError::InvalidArgument("message must not be empty".into()));
        }
        self.db.with_tx(|conn| {
            let own = own_scheduled(conn, token, actor, id)?;
            scheduled::update(conn, own.id, text.trim(), send_at)?;
            Ok(scheduled::by_id(conn, own.id)?)
        })
    }

    pub fn delete_scheduled(&self, token: &str, actor: &Actor, id: i64) -> CoreResult<()> {
        self.db.with_tx(|conn| {
            let own = own_scheduled(conn, token, actor, id)?;
            scheduled::delete(conn, own.id)?;
            Ok(())
        })
    }

    /// Pending messages `actor` scheduled in the room, earliest first.
    pub fn scheduled_messages(&self, token: &str, actor: &Actor) -> CoreResult<Vec<ScheduledMessage>> {
        self.db.with_conn(|conn| {
            let room = load_room(conn, token)?;
            require_attendee(conn, &room, actor)?;
            Ok(scheduled::for_actor(conn, room.id, actor)?)
        })
    }

    /// Post every scheduled message whose time has come. Each one is posted
    /// and deleted in its own transaction. Messages that can no longer be
    /// posted are dropped. A storage failure leaves that row for the next
    /// sweep without holding up the rest of the batch.
    pub fn dispatch_due_messages(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let due = self.db.with_conn(|conn| scheduled::due(conn, now, DISPATCH_BATCH))?;
        let mut posted = 0;
        for pending in due {
            let message = match self.db.with_tx(|conn| dispatch_one(conn, pending.id, now)) {
                Ok(message) => message,
                Err(e) => {
                    warn!(id = pending.id, error = %e, "scheduled message dispatch failed, will retry");
                    continue;
                }
            };
            if let Some(message) = message {
                posted += 1;
                self.notifier.notify(RoomActivity {
                    room_id: message.room_id,
                    last_message_id: message.id,
                });
            }
        }
        if posted > 0 {
            info!(posted, "scheduled messages dispatched");
        }
        Ok(posted)
    }
}

fn own_scheduled(conn: &Connection, token: &str, actor: &Actor, id: i64) -> CoreResult<ScheduledMessage> {
    let room = load_room(conn, token)?;
    let pending = scheduled::by_id(conn, id).or_not_found(Entity::ScheduledMessage)?;
    if pending.room_id != room.id || &pending.actor != actor {
        return Err(CoreError::NotFound(Entity::ScheduledMessage));
    }
    Ok(pending)
}

fn dispatch_one(conn: &Connection, id: i64, now: DateTime<Utc>) -> CoreResult<Option<Message>> {
    let pending = match scheduled::by_id(conn, id).or_not_found(Entity::ScheduledMessage) {
        Ok(pending) => pending,
        // Another dispatcher got it first
        Err(CoreError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let room = match rooms::by_id(conn, pending.room_id).or_not_found(Entity::Room) {
        Ok(room) => room,
        Err(CoreError::NotFound(_)) => {
            warn!(id, room_id = pending.room_id, "room vanished, dropping scheduled message");
            scheduled::delete(conn, id)?;
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let Some(author) = attendees::find(conn, room.id, &pending.actor)? else {
        warn!(id, room = %room.token, "author left the room, dropping scheduled message");
        scheduled::delete(conn, id)?;
        return Ok(None);
    };

    let post = PostMessage {
        text: pending.message.clone(),
        reply_to: pending.parent_id,
        thread_id: (pending.thread_id != NO_THREAD).then_some(pending.thread_id),
        mentions: Vec::new(),
        mention_all: false,
    };
    let outcome = post_in(conn, &room, &author, &post, &pending.message_type, now);
    scheduled::delete(conn, id)?;
    match outcome {
        Ok(message) => Ok(Some(message)),
        Err(CoreError::Store(e)) => Err(CoreError::Store(e)),
        Err(e) => {
            warn!(id, room = %room.token, error = %e, "dropping undeliverable scheduled message");
            Ok(None)
        }
    }
}
