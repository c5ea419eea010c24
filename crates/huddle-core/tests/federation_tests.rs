mod common;

use common::{coordinator, coordinator_with, count};
use huddle_core::coordinator::InviteParams;
use huddle_core::{CoreConfig, CoreError};
use huddle_types::InvitationState;

fn params(user_id: &str, remote_token: &str) -> InviteParams {
    InviteParams {
        user_id: user_id.into(),
        remote_server: "https://cloud.example".into(),
        remote_token: remote_token.into(),
        remote_attendee_id: 17,
        inviter_cloud_id: "hal@cloud.example".into(),
        inviter_display_name: "Hal".into(),
        room_name: "Planning".into(),
    }
}

#[test]
fn test_accept_creates_proxy_room_once() {
    let coord = coordinator();
    let invite = coord.receive_invite(&params("gina", "rmt12345")).unwrap();
    assert_eq!(invite.state, InvitationState::Invited);

    let view = coord.accept_invite(invite.id, "gina").unwrap();
    assert_eq!(view.room.remote_server.as_deref(), Some("https://cloud.example"));
    assert_eq!(view.room.name, "Planning");
    assert!(view.attendee.is_some());

    // Accepting again is harmless and reuses the room
    let again = coord.accept_invite(invite.id, "gina").unwrap();
    assert_eq!(again.room.id, view.room.id);
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM rooms"), 1);
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM attendees"), 1);

    let listed = coord.invitations("gina").unwrap();
    assert_eq!(listed[0].state, InvitationState::Accepted);
    assert_eq!(listed[0].local_room_id, Some(view.room.id));
}

#[test]
fn test_two_users_share_proxy_room() {
    let coord = coordinator();
    let a = coord.receive_invite(&params("gina", "rmt12345")).unwrap();
    let b = coord.receive_invite(&params("hank", "rmt12345")).unwrap();

    let ra = coord.accept_invite(a.id, "gina").unwrap();
    let rb = coord.accept_invite(b.id, "hank").unwrap();
    assert_eq!(ra.room.id, rb.room.id);
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM attendees"), 2);
}

#[test]
fn test_rejected_is_terminal() {
    let coord = coordinator();
    let invite = coord.receive_invite(&params("gina", "rmt12345")).unwrap();
    let rejected = coord.reject_invite(invite.id, "gina").unwrap();
    assert_eq!(rejected.state, InvitationState::Rejected);

    assert!(matches!(
        coord.accept_invite(invite.id, "gina"),
        Err(CoreError::InvalidState(_))
    ));
    assert!(matches!(
        coord.reject_invite(invite.id, "gina"),
        Err(CoreError::InvalidState(_))
    ));
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM rooms"), 0);
}

#[test]
fn test_invites_belong_to_their_user() {
    let coord = coordinator();
    let invite = coord.receive_invite(&params("gina", "rmt12345")).unwrap();
    assert!(matches!(
        coord.accept_invite(invite.id, "mallory"),
        Err(CoreError::NotFound(_))
    ));
}

#[test]
fn test_duplicate_invite_and_disabled_federation() {
    let coord = coordinator();
    coord.receive_invite(&params("gina", "rmt12345")).unwrap();
    assert!(matches!(
        coord.receive_invite(&params("gina", "rmt12345")),
        Err(CoreError::AlreadyExists)
    ));

    let closed = coordinator_with(CoreConfig {
        federation_enabled: false,
        ..CoreConfig::default()
    });
    assert!(matches!(
        closed.receive_invite(&params("gina", "rmt12345")),
        Err(CoreError::Forbidden(_))
    ));
}
