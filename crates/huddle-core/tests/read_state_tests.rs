mod common;

use common::{coordinator, group_with, user};
use huddle_core::RoomCoordinator;
use huddle_core::coordinator::PostMessage;
use huddle_types::Actor;
use huddle_types::models::UNREAD_FIRST_MESSAGE;

fn post(coord: &RoomCoordinator, token: &str, actor: &Actor, text: &str) -> i64 {
    coord
        .post_message(
            token,
            actor,
            PostMessage {
                text: text.into(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
}

#[test]
fn test_mark_read_never_regresses() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let _m1 = post(&coord, &token, &alice, "one");
    let m2 = post(&coord, &token, &alice, "two");

    let after = coord.mark_read(&token, &bob, Some(m2)).unwrap();
    assert_eq!(after.last_read_message, m2);
    let after = coord.mark_read(&token, &bob, Some(m2 - 1)).unwrap();
    assert_eq!(after.last_read_message, m2);

    // Zero is never stored
    let after = coord.mark_read(&token, &bob, Some(0)).unwrap();
    assert_eq!(after.last_read_message, m2);
}

#[test]
fn test_unread_counter_follows_posts_and_reads() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let fresh = coord.room_view(&token, &bob).unwrap().attendee.unwrap();
    assert_eq!(fresh.last_read_message, UNREAD_FIRST_MESSAGE);

    let m1 = post(&coord, &token, &alice, "one");
    post(&coord, &token, &alice, "two");
    post(&coord, &token, &alice, "three");

    let bob_row = coord.room_view(&token, &bob).unwrap().attendee.unwrap();
    assert_eq!(bob_row.unread_messages, 3);
    let alice_row = coord.room_view(&token, &alice).unwrap().attendee.unwrap();
    assert_eq!(alice_row.unread_messages, 0);

    let bob_row = coord.mark_read(&token, &bob, Some(m1)).unwrap();
    assert_eq!(bob_row.unread_messages, 2);
    let bob_row = coord.mark_read(&token, &bob, None).unwrap();
    assert_eq!(bob_row.unread_messages, 0);
}

#[test]
fn test_mark_unread_leaves_newest_message() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);

    // Nothing to read yet
    let empty = coord.mark_unread(&token, &bob).unwrap();
    assert_eq!(empty.last_read_message, UNREAD_FIRST_MESSAGE);

    let m1 = post(&coord, &token, &alice, "one");
    let only = coord.mark_unread(&token, &bob).unwrap();
    assert_eq!(only.last_read_message, UNREAD_FIRST_MESSAGE);
    assert_eq!(only.unread_messages, 1);

    post(&coord, &token, &alice, "two");
    coord.mark_read(&token, &bob, None).unwrap();
    let bob_row = coord.mark_unread(&token, &bob).unwrap();
    assert_eq!(bob_row.last_read_message, m1);
    assert_eq!(bob_row.unread_messages, 1);
}

#[test]
fn test_mentions_distinguish_direct_and_all() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let carol = user("carol");
    let token = group_with(&coord, &alice, &[&bob, &carol]);

    let msg = coord
        .post_message(
            &token,
            &alice,
            PostMessage {
                text: "@bob and @all".into(),
                mentions: vec![bob.clone()],
                mention_all: true,
                ..Default::default()
            },
        )
        .unwrap();

    let bob_row = coord.room_view(&token, &bob).unwrap().attendee.unwrap();
    assert_eq!(bob_row.last_mention_message, msg.id);
    assert_eq!(bob_row.last_mention_direct, msg.id);

    let carol_row = coord.room_view(&token, &carol).unwrap().attendee.unwrap();
    assert_eq!(carol_row.last_mention_message, msg.id);
    assert_ne!(carol_row.last_mention_direct, msg.id);

    let alice_row = coord.room_view(&token, &alice).unwrap().attendee.unwrap();
    assert_ne!(alice_row.last_mention_message, msg.id);
}

#[test]
fn test_last_common_read_ignores_unread_attendees() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let carol = user("carol");
    let token = group_with(&coord, &alice, &[&bob, &carol]);
    let m1 = post(&coord, &token, &alice, "one");
    let m2 = post(&coord, &token, &alice, "two");

    coord.mark_read(&token, &bob, Some(m1)).unwrap();
    // Carol has not read anything and does not hold the receipt back
    assert_eq!(coord.last_common_read(&token, &alice).unwrap(), Some(m1));

    coord.mark_read(&token, &bob, Some(m2)).unwrap();
    assert_eq!(coord.last_common_read(&token, &alice).unwrap(), Some(m2));
}
