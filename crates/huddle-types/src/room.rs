int_enum! {
    /// Conversation kind.
    pub enum RoomType {
        OneToOne = 1,
        Group = 2,
        Public = 3,
        Changelog = 4,
        OneToOneFormer = 5,
        NoteToSelf = 6,
    }
}

int_enum! {
    pub enum LobbyState {
        None = 0,
        NonModerators = 1,
    }
}

int_enum! {
    /// Who can find the room without being a member.
    pub enum Listable {
        None = 0,
        Users = 1,
        All = 2,
    }
}

int_enum! {
    pub enum ParticipantType {
        Owner = 1,
        Moderator = 2,
        User = 3,
        Guest = 4,
        UserSelfJoined = 5,
        GuestModerator = 6,
    }
}

impl ParticipantType {
    pub fn is_moderator(self) -> bool {
        matches!(self, Self::Owner | Self::Moderator | Self::GuestModerator)
    }

    /// Attendees that only exist while they have a live session.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Guest | Self::UserSelfJoined)
    }
}

int_enum! {
    pub enum NotificationLevel {
        Default = 0,
        Always = 1,
        Mention = 2,
        Never = 3,
    }
}

int_enum! {
    /// Federation invitation lifecycle. `Rejected` is terminal.
    pub enum InvitationState {
        Invited = 0,
        Accepted = 1,
        Rejected = 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_round_trip_and_rejection() {
        assert_eq!(RoomType::try_from(6), Ok(RoomType::NoteToSelf));
        assert_eq!(i64::from(ParticipantType::GuestModerator), 6);
        let err = LobbyState::try_from(7).unwrap_err();
        assert_eq!(err.kind, "LobbyState");
        assert!(serde_json::from_str::<NotificationLevel>("9").is_err());
        assert_eq!(serde_json::to_string(&Listable::Users).unwrap(), "1");
    }

    #[test]
    fn test_moderator_and_transient_types() {
        assert!(ParticipantType::GuestModerator.is_moderator());
        assert!(!ParticipantType::User.is_moderator());
        assert!(ParticipantType::UserSelfJoined.is_transient());
        assert!(!ParticipantType::Owner.is_transient());
    }
}
