mod common;

use common::{coordinator, count, group_with, user};
use huddle_core::coordinator::PostMessage;
use huddle_core::{CoreError, RoomCoordinator};
use huddle_types::{Actor, NotificationLevel};
use huddle_types::models::Message;

fn post(coord: &RoomCoordinator, token: &str, actor: &Actor, text: &str) -> Message {
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
}

fn reply(coord: &RoomCoordinator, token: &str, actor: &Actor, parent: i64, text: &str) -> Message {
    coord
        .post_message(
            token,
            actor,
            PostMessage {
                text: text.into(),
                reply_to: Some(parent),
                ..Default::default()
            },
        )
        .unwrap()
}

#[test]
fn test_ensure_thread_is_idempotent() {
    let coord = coordinator();
    let alice = user("alice");
    let token = group_with(&coord, &alice, &[]);
    let anchor = post(&coord, &token, &alice, "topic");

    let first = coord.ensure_thread(&token, &alice, anchor.id, "Topic").unwrap();
    let second = coord.ensure_thread(&token, &alice, anchor.id, "Other").unwrap();
    assert_eq!(first.id, anchor.id);
    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Topic");
    assert_eq!(count(&coord, "SELECT COUNT(*) FROM threads"), 1);
}

#[test]
fn test_reply_creates_thread_and_counts() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let anchor = post(&coord, &token, &alice, "lunch?");

    let r1 = reply(&coord, &token, &bob, anchor.id, "yes");
    assert_eq!(r1.thread_id, anchor.id);
    // Replying to a reply stays in the same thread
    let r2 = reply(&coord, &token, &alice, r1.id, "great");
    assert_eq!(r2.thread_id, anchor.id);

    let thread = coord.thread(&token, &alice, anchor.id).unwrap();
    assert_eq!(thread.num_replies, 2);
    assert_eq!(thread.last_message_id, r2.id);

    let listed = coord.thread_messages(&token, &bob, anchor.id, 50).unwrap();
    let ids: Vec<i64> = listed.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![anchor.id, r1.id, r2.id]);
}

#[test]
fn test_subscribe_twice_keeps_one_row() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let anchor = post(&coord, &token, &alice, "topic");
    coord.ensure_thread(&token, &alice, anchor.id, "").unwrap();

    coord
        .subscribe(&token, &bob, anchor.id, NotificationLevel::Always)
        .unwrap();
    let sub = coord
        .subscribe(&token, &bob, anchor.id, NotificationLevel::Mention)
        .unwrap();
    assert_eq!(sub.notification_level, NotificationLevel::Mention);
    assert_eq!(
        count(&coord, "SELECT COUNT(*) FROM thread_attendees WHERE actor_id = 'bob'"),
        1
    );
}

#[test]
fn test_muted_threads_are_not_listed() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let loud = post(&coord, &token, &alice, "loud");
    let quiet = post(&coord, &token, &alice, "quiet");
    reply(&coord, &token, &bob, loud.id, "+1");
    reply(&coord, &token, &bob, quiet.id, "+1");

    coord
        .subscribe(&token, &bob, quiet.id, NotificationLevel::Never)
        .unwrap();
    let subscribed = coord.subscribed_threads(&bob, 500, 0).unwrap();
    assert_eq!(subscribed.len(), 1);
    assert_eq!(subscribed[0].0.id, loud.id);

    let recent = coord.recent_threads(&token, &alice, 0).unwrap();
    assert_eq!(recent.len(), 1);
}

#[test]
fn test_rename_rules() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let anchor = post(&coord, &token, &bob, "bob's topic");
    coord.ensure_thread(&token, &bob, anchor.id, "").unwrap();

    let renamed = coord
        .rename_thread(&token, &bob, anchor.id, &"a".repeat(300))
        .unwrap();
    assert_eq!(renamed.name.chars().count(), 201);

    // Moderators can rename anyone's thread
    coord.rename_thread(&token, &alice, anchor.id, "Agenda").unwrap();

    let err = coord.rename_thread(&token, &bob, anchor.id, "   ").unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument(_)));

    let other = post(&coord, &token, &alice, "alice's topic");
    coord.ensure_thread(&token, &alice, other.id, "").unwrap();
    let err = coord.rename_thread(&token, &bob, other.id, "Mine").unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}

#[test]
fn test_thread_mention_raises_badge_until_read() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);
    let anchor = post(&coord, &token, &alice, "topic");
    let mention = coord
        .post_message(
            &token,
            &alice,
            PostMessage {
                text: "@bob look".into(),
                reply_to: Some(anchor.id),
                mentions: vec![bob.clone()],
                ..Default::default()
            },
        )
        .unwrap();

    let bob_view = coord.room_view(&token, &bob).unwrap().attendee.unwrap();
    assert!(bob_view.has_unread_thread_mentions);
    assert!(bob_view.has_unread_thread_directs);
    assert_eq!(bob_view.last_mention_direct, mention.id);

    coord
        .mark_thread_read(&token, &bob, anchor.id, None)
        .unwrap();
    let bob_view = coord.room_view(&token, &bob).unwrap().attendee.unwrap();
    assert!(!bob_view.has_unread_thread_mentions);
    assert!(!bob_view.has_unread_thread_directs);
}
