use std::fmt;

use thiserror::Error;

use huddle_db::StoreError;
use huddle_types::UnknownPermissionBits;
use huddle_types::models::Session;

pub type CoreResult<T> = Result<T, CoreError>;

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Room,
    Attendee,
    Session,
    Thread,
    Message,
    Ban,
    ScheduledMessage,
    Invitation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Room => "room",
            Self::Attendee => "attendee",
            Self::Session => "session",
            Self::Thread => "thread",
            Self::Message => "message",
            Self::Ban => "ban",
            Self::ScheduledMessage => "scheduled message",
            Self::Invitation => "invitation",
        })
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("already exists")]
    AlreadyExists,

    #[error("actor is already banned")]
    AlreadyBanned,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("lobby is active")]
    LobbyActive,

    /// A non-forced join would supersede a session that is in the call.
    #[error("previous session is still in the call")]
    SessionInCall(Box<Session>),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    InvalidPermissions(#[from] UnknownPermissionBits),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Attach the missing entity to a store `NotFound`.
pub(crate) trait OrNotFound<T> {
    fn or_not_found(self, entity: Entity) -> CoreResult<T>;
}

impl<T> OrNotFound<T> for Result<T, StoreError> {
    fn or_not_found(self, entity: Entity) -> CoreResult<T> {
        match self {
            Err(StoreError::NotFound) => Err(CoreError::NotFound(entity)),
            other => other.map_err(CoreError::from),
        }
    }
}
