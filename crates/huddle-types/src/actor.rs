use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown actor type: {0}")]
pub struct UnknownActorType(pub String);

/// Discriminator stored in the `actor_type` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Users,
    Groups,
    Guests,
    Emails,
    Circles,
    FederatedUsers,
    Phones,
    Bridged,
    Bots,
}

impl ActorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Groups => "groups",
            Self::Guests => "guests",
            Self::Emails => "emails",
            Self::Circles => "circles",
            Self::FederatedUsers => "federated_users",
            Self::Phones => "phones",
            Self::Bridged => "bridged",
            Self::Bots => "bots",
        }
    }
}

impl FromStr for ActorType {
    type Err = UnknownActorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "users" => Self::Users,
            "groups" => Self::Groups,
            "guests" => Self::Guests,
            "emails" => Self::Emails,
            "circles" => Self::Circles,
            "federated_users" => Self::FederatedUsers,
            "phones" => Self::Phones,
            "bridged" => Self::Bridged,
            "bots" => Self::Bots,
            other => return Err(UnknownActorType(other.to_string())),
        })
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is acting: a stable identity bound to a kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "ActorRef", from = "ActorRef")]
pub enum Actor {
    User(String),
    Group(String),
    Guest(String),
    Email(String),
    Circle(String),
    FederatedUser(String),
    Phone(String),
    Bridged(String),
    Bot(String),
}

impl Actor {
    pub fn new(actor_type: ActorType, id: impl Into<String>) -> Self {
        let id = id.into();
        match actor_type {
            ActorType::Users => Self::User(id),
            ActorType::Groups => Self::Group(id),
            ActorType::Guests => Self::Guest(id),
            ActorType::Emails => Self::Email(id),
            ActorType::Circles => Self::Circle(id),
            ActorType::FederatedUsers => Self::FederatedUser(id),
            ActorType::Phones => Self::Phone(id),
            ActorType::Bridged => Self::Bridged(id),
            ActorType::Bots => Self::Bot(id),
        }
    }

    pub fn actor_type(&self) -> ActorType {
        match self {
            Self::User(_) => ActorType::Users,
            Self::Group(_) => ActorType::Groups,
            Self::Guest(_) => ActorType::Guests,
            Self::Email(_) => ActorType::Emails,
            Self::Circle(_) => ActorType::Circles,
            Self::FederatedUser(_) => ActorType::FederatedUsers,
            Self::Phone(_) => ActorType::Phones,
            Self::Bridged(_) => ActorType::Bridged,
            Self::Bot(_) => ActorType::Bots,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User(id)
            | Self::Group(id)
            | Self::Guest(id)
            | Self::Email(id)
            | Self::Circle(id)
            | Self::FederatedUser(id)
            | Self::Phone(id)
            | Self::Bridged(id)
            | Self::Bot(id) => id,
        }
    }

    /// Groups and circles are membership sources, they never hold sessions.
    pub fn can_join(&self) -> bool {
        !matches!(self, Self::Group(_) | Self::Circle(_))
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.actor_type(), self.id())
    }
}

/// Wire shape of an [`Actor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRef {
    pub actor_type: ActorType,
    pub actor_id: String,
}

impl From<Actor> for ActorRef {
    fn from(actor: Actor) -> Self {
        let actor_type = actor.actor_type();
        let actor_id = match actor {
            Actor::User(id)
            | Actor::Group(id)
            | Actor::Guest(id)
            | Actor::Email(id)
            | Actor::Circle(id)
            | Actor::FederatedUser(id)
            | Actor::Phone(id)
            | Actor::Bridged(id)
            | Actor::Bot(id) => id,
        };
        Self { actor_type, actor_id }
    }
}

impl From<ActorRef> for Actor {
    fn from(r: ActorRef) -> Self {
        Actor::new(r.actor_type, r.actor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_strings() {
        for t in [
            ActorType::Users,
            ActorType::FederatedUsers,
            ActorType::Phones,
            ActorType::Bots,
        ] {
            assert_eq!(t.as_str().parse::<ActorType>().unwrap(), t);
        }
        assert!("robots".parse::<ActorType>().is_err());
    }

    #[test]
    fn test_actor_wire_shape() {
        let actor = Actor::FederatedUser("alice@remote.example".into());
        let json = serde_json::to_value(&actor).unwrap();
        assert_eq!(json["actorType"], "federated_users");
        assert_eq!(json["actorId"], "alice@remote.example");

        let back: Actor = serde_json::from_value(json).unwrap();
        assert_eq!(back, actor);
    }

    #[test]
    fn test_groups_cannot_join() {
        assert!(!Actor::Group("staff".into()).can_join());
        assert!(Actor::Guest("abc".into()).can_join());
    }
}
