mod common;

use chrono::{Duration, Utc};

use common::{coordinator, count, group_with, join, room, user};
use huddle_core::coordinator::JoinRequest;
use huddle_core::sweeper::sweep_once;
use huddle_core::{CoreError, Entity};
use huddle_types::{
    Actor, InCallFlags, LobbyState, ParticipantType, PermissionMethod, Permissions, RoomType,
};

#[test]
fn test_two_devices_share_one_attendee() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);

    let phone = join(&coord, &token, &bob);
    let laptop = join(&coord, &token, &bob);
    assert_ne!(phone.session.session_id, laptop.session.session_id);
    assert_eq!(phone.attendee.id, laptop.attendee.id);

    coord
        .join_call(&token, &laptop.session.session_id, InCallFlags::IN_CALL)
        .unwrap();
    coord.leave(&token, &phone.session.session_id).unwrap();

    let participants = coord.participants(&token, &alice).unwrap();
    let bob_row = participants
        .iter()
        .find(|p| p.attendee.actor == bob)
        .unwrap();
    assert_eq!(bob_row.sessions.len(), 1);
    assert_eq!(bob_row.sessions[0].session_id, laptop.session.session_id);
    assert!(bob_row.sessions[0].in_call.is_in_call());
}

#[test]
fn test_leaving_stale_session_after_rejoin_keeps_attendee() {
    let coord = coordinator();
    let owner = user("owner");
    let token = room(&coord, &owner, RoomType::Public);
    let carol = user("carol");

    let a = join(&coord, &token, &carol);
    let b = coord
        .join(
            &token,
            JoinRequest {
                actor: Some(carol.clone()),
                previous_session_id: Some(a.session.session_id.clone()),
                force: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(a.attendee.participant_type, ParticipantType::UserSelfJoined);

    // The old tab says goodbye late
    coord.leave(&token, &a.session.session_id).unwrap();

    let participants = coord.participants(&token, &owner).unwrap();
    let carol_row = participants
        .iter()
        .find(|p| p.attendee.actor == carol)
        .expect("carol is still a participant");
    assert_eq!(carol_row.sessions.len(), 1);
    assert_eq!(carol_row.sessions[0].session_id, b.session.session_id);
}

#[test]
fn test_self_joined_user_leaves_with_last_session() {
    let coord = coordinator();
    let owner = user("owner");
    let token = room(&coord, &owner, RoomType::Public);
    let dave = user("dave");

    let joined = join(&coord, &token, &dave);
    coord.leave(&token, &joined.session.session_id).unwrap();
    // Leaving twice is fine
    coord.leave(&token, &joined.session.session_id).unwrap();

    let err = coord.participants(&token, &dave).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(Entity::Attendee)));
}

#[test]
fn test_anonymous_guest_joins_public_room_only() {
    let coord = coordinator();
    let owner = user("owner");
    let public = room(&coord, &owner, RoomType::Public);
    let group = room(&coord, &owner, RoomType::Group);

    let guest = coord.join(&public, JoinRequest::default()).unwrap();
    assert_eq!(guest.attendee.participant_type, ParticipantType::Guest);
    match &guest.attendee.actor {
        Actor::Guest(id) => assert_eq!(id.len(), 64),
        other => panic!("unexpected actor {other}"),
    }

    let err = coord.join(&group, JoinRequest::default()).unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    let err = coord
        .join(
            &group,
            JoinRequest {
                actor: Some(user("stranger")),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[test]
fn test_non_forced_join_reports_in_call_session() {
    let coord = coordinator();
    let alice = user("alice");
    let token = group_with(&coord, &alice, &[]);

    let first = join(&coord, &token, &alice);
    coord
        .join_call(
            &token,
            &first.session.session_id,
            InCallFlags::from_bits(3).unwrap(),
        )
        .unwrap();

    let err = coord
        .join(
            &token,
            JoinRequest {
                actor: Some(alice.clone()),
                previous_session_id: Some(first.session.session_id.clone()),
                force: false,
                ..Default::default()
            },
        )
        .unwrap_err();
    match err {
        CoreError::SessionInCall(session) => {
            assert_eq!(session.session_id, first.session.session_id)
        }
        other => panic!("unexpected error {other:?}"),
    }

    // Forcing replaces the in-call session
    let second = coord
        .join(
            &token,
            JoinRequest {
                actor: Some(alice.clone()),
                previous_session_id: Some(first.session.session_id.clone()),
                force: true,
                ..Default::default()
            },
        )
        .unwrap();
    let sessions = coord.participants(&token, &alice).unwrap()[0].sessions.clone();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, second.session.session_id);
}

#[test]
fn test_lobby_blocks_users_until_timer_runs_out() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);

    coord
        .set_lobby(&token, &alice, LobbyState::NonModerators, None)
        .unwrap();
    assert!(matches!(
        coord.join(
            &token,
            JoinRequest {
                actor: Some(bob.clone()),
                ..Default::default()
            }
        ),
        Err(CoreError::LobbyActive)
    ));
    // Moderators pass the lobby
    join(&coord, &token, &alice);

    let past = Utc::now() - Duration::seconds(5);
    coord
        .set_lobby(&token, &alice, LobbyState::NonModerators, Some(past))
        .unwrap();
    let joined = join(&coord, &token, &bob);
    assert_eq!(joined.room.lobby_state, LobbyState::None);
}

#[test]
fn test_sweeper_purges_dead_sessions() {
    let coord = coordinator();
    let owner = user("owner");
    let token = room(&coord, &owner, RoomType::Public);
    join(&coord, &token, &owner);
    join(&coord, &token, &user("visitor"));
    coord.join(&token, JoinRequest::default()).unwrap();

    let later = Utc::now() + Duration::seconds(101);
    let report = sweep_once(&coord, later).unwrap();
    assert_eq!(report.sessions_purged, 3);
    // Visitor and guest were transient, the owner stays
    assert_eq!(report.attendees_purged, 2);
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM attendees"), 1);

    let again = sweep_once(&coord, later).unwrap();
    assert_eq!(again.sessions_purged, 0);
}

#[test]
fn test_ping_keeps_session_alive() {
    let coord = coordinator();
    let alice = user("alice");
    let token = group_with(&coord, &alice, &[]);
    let joined = join(&coord, &token, &alice);

    let pinged = coord.ping(&token, &joined.session.session_id).unwrap();
    assert!(pinged.last_ping >= joined.session.last_ping);
    assert_eq!(coord.actor_for_session(&joined.session.session_id).unwrap(), alice);

    let err = coord.ping(&token, "missing").unwrap_err();
    assert!(matches!(err, CoreError::NotFound(Entity::Session)));
}

#[test]
fn test_only_owner_removes_owner() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let bob_row = coord
        .participants(&token, &alice)
        .unwrap()
        .into_iter()
        .find(|p| p.attendee.actor == bob)
        .unwrap()
        .attendee;
    let alice_id = coord.room_view(&token, &alice).unwrap().attendee.unwrap().id;

    coord
        .set_participant_type(&token, &alice, bob_row.id, ParticipantType::Moderator)
        .unwrap();
    let err = coord.remove_attendee(&token, &bob, alice_id).unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    coord.remove_attendee(&token, &alice, bob_row.id).unwrap();
    assert_eq!(coord.participants(&token, &alice).unwrap().len(), 1);
}

#[test]
fn test_call_start_requires_permission() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    coord
        .set_default_permissions(
            &token,
            &alice,
            huddle_types::Permissions::CALL_JOIN.union(huddle_types::Permissions::CHAT),
        )
        .unwrap();

    let bob_session = join(&coord, &token, &bob).session.session_id;
    let err = coord
        .join_call(&token, &bob_session, InCallFlags::IN_CALL)
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    // Once a moderator started the call, joining is enough
    let alice_session = join(&coord, &token, &alice).session.session_id;
    coord
        .join_call(&token, &alice_session, InCallFlags::IN_CALL)
        .unwrap();
    let session = coord
        .join_call(&token, &bob_session, InCallFlags::IN_CALL)
        .unwrap();
    assert!(session.in_call.is_in_call());

    let left = coord.leave_call(&token, &bob_session).unwrap();
    assert!(!left.in_call.is_in_call());
}

#[test]
fn test_returning_guest_keeps_attendee() {
    let coord = coordinator();
    let owner = user("owner");
    let token = room(&coord, &owner, RoomType::Public);

    let a = coord.join(&token, JoinRequest::default()).unwrap();
    let b = coord
        .join(
            &token,
            JoinRequest {
                previous_session_id: Some(a.session.session_id.clone()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(a.attendee.id, b.attendee.id);
    assert_eq!(a.attendee.actor, b.attendee.actor);
    assert_ne!(a.session.session_id, b.session.session_id);
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM attendees WHERE participant_type = 4"), 1);
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM sessions"), 1);

    // A late leave of the replaced tab keeps the guest in the room
    coord.leave(&token, &a.session.session_id).unwrap();
    assert_eq!(coord.actor_for_session(&b.session.session_id).unwrap(), b.attendee.actor);

    // Someone else's session is no way back into their identity
    let owner_session = join(&coord, &token, &owner).session.session_id;
    let c = coord
        .join(
            &token,
            JoinRequest {
                previous_session_id: Some(owner_session.clone()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(matches!(c.attendee.actor, Actor::Guest(_)));
    assert_ne!(c.attendee.id, b.attendee.id);
    assert_eq!(coord.actor_for_session(&owner_session).unwrap(), owner);
}

#[test]
fn test_lobby_ignore_lets_user_through() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let carol = user("carol");
    let token = group_with(&coord, &alice, &[&bob, &carol]);
    let bob_id = coord
        .participants(&token, &alice)
        .unwrap()
        .into_iter()
        .find(|p| p.attendee.actor == bob)
        .unwrap()
        .attendee
        .id;
    coord
        .grant_permissions(&token, &alice, bob_id, PermissionMethod::Set, Permissions::LOBBY_IGNORE)
        .unwrap();
    coord
        .set_lobby(&token, &alice, LobbyState::NonModerators, None)
        .unwrap();

    let joined = join(&coord, &token, &bob);
    assert!(joined.permissions.contains(Permissions::LOBBY_IGNORE));
    assert_eq!(joined.attendee.participant_type, ParticipantType::User);

    let err = coord
        .join(
            &token,
            JoinRequest {
                actor: Some(carol.clone()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::LobbyActive));
}
