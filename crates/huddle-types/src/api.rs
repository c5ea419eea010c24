use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Attendee, Room, Session};
use crate::{
    Actor, ActorType, InCallFlags, Listable, LobbyState, NotificationLevel, ParticipantType,
    PermissionMethod, Permissions, RoomType,
};

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub room_type: RoomType,
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub object_type: String,
    #[serde(default)]
    pub object_id: String,
}

/// A room as seen by one actor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    #[serde(flatten)]
    pub room: Room,
    pub attendee: Option<Attendee>,
    pub permissions: Permissions,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetRoomPermissionsRequest {
    /// Raw bitmask, validated by the handler.
    pub permissions: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LobbyRequest {
    pub state: LobbyState,
    /// Unix seconds after which the lobby opens by itself.
    pub timer: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReadOnlyRequest {
    pub read_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RenameRoomRequest {
    pub room_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListableRequest {
    pub scope: Listable,
}

/// Room or thread notification level.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotificationLevelRequest {
    pub level: NotificationLevel,
}

// -- Participants --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinRoomRequest {
    /// Supersede a previous session of this client even if it is in a call.
    #[serde(default = "default_force")]
    pub force: bool,
    /// Session this client held before, if any.
    pub session_id: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

fn default_force() -> bool {
    true
}

/// Returned with 409 when a non-forced join would supersede an in-call session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConflictResponse {
    pub session_id: String,
    pub in_call: InCallFlags,
    pub last_ping: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddParticipantRequest {
    pub actor_type: ActorType,
    pub actor_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParticipantTypeRequest {
    pub participant_type: ParticipantType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePermissionsRequest {
    pub attendee_id: i64,
    pub method: PermissionMethod,
    pub permissions: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinCallRequest {
    pub flags: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session: Session,
}

// -- Bans --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BanRequest {
    pub actor_type: ActorType,
    pub actor_id: String,
    #[serde(default)]
    pub internal_note: String,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessageRequest {
    pub message: String,
    pub reply_to: Option<i64>,
    #[serde(default)]
    pub thread_id: i64,
    /// Explicitly mentioned actors.
    #[serde(default)]
    pub mentions: Vec<Actor>,
    #[serde(default)]
    pub mention_all: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MarkReadRequest {
    pub last_read_message: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadStateResponse {
    /// Newest message every user member has read.
    pub last_common_read: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduleMessageRequest {
    pub message: String,
    /// Unix seconds.
    pub send_at: i64,
    #[serde(default)]
    pub thread_id: i64,
    pub reply_to: Option<i64>,
    #[serde(default = "empty_metadata")]
    pub metadata: serde_json::Value,
}

fn empty_metadata() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditScheduledRequest {
    pub message: String,
    pub send_at: i64,
}

// -- Threads --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RenameThreadRequest {
    pub title: String,
}

// -- Federation --

/// Invitation pushed by the server that hosts the room.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReceiveInviteRequest {
    pub user_id: String,
    pub remote_server: String,
    pub remote_token: String,
    pub remote_attendee_id: i64,
    pub inviter_cloud_id: String,
    #[serde(default)]
    pub inviter_display_name: String,
    #[serde(default)]
    pub room_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_defaults_to_force() {
        let req: JoinRoomRequest = serde_json::from_str("{}").unwrap();
        assert!(req.force);
        assert!(req.session_id.is_none());

        let req: JoinRoomRequest =
            serde_json::from_str(r#"{"force":false,"sessionId":"abc"}"#).unwrap();
        assert!(!req.force);
        assert_eq!(req.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_send_message_mentions() {
        let req: SendMessageRequest = serde_json::from_str(
            r#"{"message":"hi @bob","mentions":[{"actorType":"users","actorId":"bob"}]}"#,
        )
        .unwrap();
        assert_eq!(req.mentions, vec![Actor::User("bob".into())]);
        assert!(!req.mention_all);
        assert_eq!(req.thread_id, 0);
        assert!(serde_json::from_str::<SendMessageRequest>(r#"{"message":"x","bogus":1}"#).is_err());
    }

    #[test]
    fn test_schedule_defaults() {
        let req: ScheduleMessageRequest =
            serde_json::from_str(r#"{"message":"later","sendAt":1900000000}"#).unwrap();
        assert_eq!(req.thread_id, 0);
        assert!(req.reply_to.is_none());
        assert!(req.metadata.as_object().is_some_and(|m| m.is_empty()));
    }
}
