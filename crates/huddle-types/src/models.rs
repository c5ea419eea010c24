use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Actor, InCallFlags, InvitationState, Listable, LobbyState, NotificationLevel,
    ParticipantType, Permissions, RoomType,
};

/// Read marker meaning "nothing read yet, start from the first message".
///
/// `0` is never a valid stored read marker: clients used to send it by
/// accident and trigger full history reloads.
pub const UNREAD_FIRST_MESSAGE: i64 = -2;

/// Thread id of messages that are not part of a thread.
pub const NO_THREAD: i64 = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: i64,
    pub token: String,
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub object_type: String,
    pub object_id: String,
    pub default_permissions: Permissions,
    pub call_permissions: Permissions,
    pub lobby_state: LobbyState,
    pub lobby_timer: Option<DateTime<Utc>>,
    pub listable: Listable,
    pub read_only: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub last_message_id: i64,
    pub last_pinned_id: i64,
    pub has_federation: bool,
    /// Set on local proxies of rooms hosted on another server.
    pub remote_server: Option<String>,
    pub remote_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Lobby blocks non-moderators right now. An elapsed timer opens it.
    pub fn lobby_active(&self, now: DateTime<Utc>) -> bool {
        match (self.lobby_state, self.lobby_timer) {
            (LobbyState::None, _) => false,
            (LobbyState::NonModerators, Some(timer)) => timer > now,
            (LobbyState::NonModerators, None) => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub id: i64,
    pub room_id: i64,
    #[serde(flatten)]
    pub actor: Actor,
    pub display_name: String,
    pub participant_type: ParticipantType,
    /// `DEFAULT` inherits from the room.
    pub permissions: Permissions,
    pub favorite: bool,
    pub archived: bool,
    pub important: bool,
    pub sensitive: bool,
    pub notification_level: NotificationLevel,
    pub last_joined_call: Option<DateTime<Utc>>,
    pub last_read_message: i64,
    pub last_mention_message: i64,
    pub last_mention_direct: i64,
    pub unread_messages: i64,
    pub has_unread_thread_mentions: bool,
    pub has_unread_thread_directs: bool,
    pub state: InvitationState,
    pub hidden_pinned_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub attendee_id: i64,
    pub session_id: String,
    pub in_call: InCallFlags,
    pub last_ping: DateTime<Utc>,
}

/// An attendee together with its live sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub attendee: Attendee,
    pub sessions: Vec<Session>,
}

/// A thread shares its id with the message it is anchored at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: i64,
    pub room_id: i64,
    pub last_message_id: i64,
    pub num_replies: i64,
    pub last_activity: DateTime<Utc>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadAttendee {
    pub id: i64,
    pub thread_id: i64,
    pub room_id: i64,
    pub attendee_id: i64,
    #[serde(flatten)]
    pub actor: Actor,
    pub notification_level: NotificationLevel,
    pub last_read_message: i64,
    pub last_mention_message: i64,
    pub last_mention_direct: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    pub id: i64,
    /// `None` for instance-wide bans.
    pub room_id: Option<i64>,
    pub banned: Actor,
    pub banned_display_name: String,
    pub moderator: Actor,
    pub banned_at: DateTime<Utc>,
    pub internal_note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    #[serde(flatten)]
    pub actor: Actor,
    pub message: String,
    pub message_type: String,
    pub parent_id: Option<i64>,
    pub thread_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    pub id: i64,
    pub room_id: i64,
    #[serde(flatten)]
    pub actor: Actor,
    pub message: String,
    pub message_type: String,
    pub metadata: serde_json::Value,
    pub thread_id: i64,
    pub parent_id: Option<i64>,
    pub send_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// An inbound invitation for a local user to a room hosted elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationInvite {
    pub id: i64,
    pub user_id: String,
    pub state: InvitationState,
    pub local_room_id: Option<i64>,
    pub remote_server: String,
    pub remote_token: String,
    pub remote_attendee_id: i64,
    pub inviter_cloud_id: String,
    pub inviter_display_name: String,
    pub room_name: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn room(lobby_state: LobbyState, lobby_timer: Option<DateTime<Utc>>) -> Room {
        Room {
            id: 1,
            token: "abcdefgh".into(),
            name: String::new(),
            room_type: RoomType::Group,
            object_type: String::new(),
            object_id: String::new(),
            default_permissions: Permissions::DEFAULT,
            call_permissions: Permissions::DEFAULT,
            lobby_state,
            lobby_timer,
            listable: Listable::None,
            read_only: false,
            last_activity: None,
            last_message_id: 0,
            last_pinned_id: 0,
            has_federation: false,
            remote_server: None,
            remote_token: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_lobby_timer() {
        let now = Utc::now();
        assert!(!room(LobbyState::None, None).lobby_active(now));
        assert!(room(LobbyState::NonModerators, None).lobby_active(now));
        assert!(room(LobbyState::NonModerators, Some(now + Duration::minutes(5))).lobby_active(now));
        assert!(!room(LobbyState::NonModerators, Some(now - Duration::minutes(5))).lobby_active(now));
    }

    #[test]
    fn test_message_flattens_actor() {
        let msg = Message {
            id: 7,
            room_id: 1,
            actor: Actor::User("alice".into()),
            message: "hi".into(),
            message_type: "comment".into(),
            parent_id: None,
            thread_id: NO_THREAD,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["actorType"], "users");
        assert_eq!(json["actorId"], "alice");
        assert_eq!(json["threadId"], 0);
    }
}
