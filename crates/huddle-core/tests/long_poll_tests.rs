mod common;

use std::time::Duration;

use common::{coordinator, group_with, user};
use huddle_core::PollOutcome;
use huddle_core::coordinator::PostMessage;
use tokio::time::Instant;

fn say(text: &str) -> PostMessage {
    PostMessage {
        text: text.into(),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_huge_timeout_is_clamped() {
    let coord = coordinator();
    let alice = user("alice");
    let token = group_with(&coord, &alice, &[]);

    let started = Instant::now();
    let outcome = coord
        .wait_for_messages(&token, &alice, 0, 100, Duration::from_secs(100_000))
        .await
        .unwrap();
    assert!(matches!(outcome, PollOutcome::NotModified));

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(30));
    assert!(waited < Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn test_existing_messages_return_immediately() {
    let coord = coordinator();
    let alice = user("alice");
    let token = group_with(&coord, &alice, &[]);
    let first = coord.post_message(&token, &alice, say("hi")).unwrap();

    let started = Instant::now();
    let outcome = coord
        .wait_for_messages(&token, &alice, 0, 100, Duration::from_secs(30))
        .await
        .unwrap();
    match outcome {
        PollOutcome::Modified(messages) => assert_eq!(messages[0].id, first.id),
        PollOutcome::NotModified => panic!("expected messages"),
    }
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_post_wakes_waiting_reader() {
    let coord = coordinator();
    let alice = user("alice");
    let bob = user("bob");
    let token = group_with(&coord, &alice, &[&bob]);

    let writer = coord.clone();
    let writer_token = token.clone();
    let poster = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        writer
            .post_message(&writer_token, &alice, say("anyone?"))
            .unwrap()
    });

    let started = Instant::now();
    let outcome = coord
        .wait_for_messages(&token, &bob, 0, 100, Duration::from_secs(30))
        .await
        .unwrap();
    let posted = poster.await.unwrap();
    match outcome {
        PollOutcome::Modified(messages) => {
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].id, posted.id);
        }
        PollOutcome::NotModified => panic!("expected the new message"),
    }
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_other_rooms_do_not_wake_reader() {
    let coord = coordinator();
    let alice = user("alice");
    let quiet = group_with(&coord, &alice, &[]);
    let busy = group_with(&coord, &alice, &[]);

    let writer = coord.clone();
    let writer_alice = alice.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        writer
            .post_message(&busy, &writer_alice, say("elsewhere"))
            .unwrap();
    });

    let outcome = coord
        .wait_for_messages(&quiet, &alice, 0, 100, Duration::from_secs(10))
        .await
        .unwrap();
    assert!(matches!(outcome, PollOutcome::NotModified));
}
