//! Value types shared by the store, the coordinator and the HTTP layer.

/// Fieldless enum stored and transmitted as its integer discriminant.
macro_rules! int_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl TryFrom<i64> for $name {
            type Error = $crate::UnknownValue;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    other => Err($crate::UnknownValue {
                        kind: stringify!($name),
                        value: other,
                    }),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(v: $name) -> Self {
                v as i64
            }
        }
    };
}

pub mod actor;
pub mod api;
pub mod call;
pub mod models;
pub mod permissions;
pub mod room;

pub use actor::{Actor, ActorRef, ActorType, UnknownActorType};
pub use call::InCallFlags;
pub use permissions::{PermissionMethod, Permissions, UnknownPermissionBits};
pub use room::{InvitationState, Listable, LobbyState, NotificationLevel, ParticipantType, RoomType};

/// An integer that does not map to any variant of a stored enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: i64,
}
