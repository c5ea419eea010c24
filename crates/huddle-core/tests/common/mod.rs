#![allow(dead_code)]

use std::sync::Arc;

use huddle_core::coordinator::{JoinOutcome, JoinRequest, NewRoomParams};
use huddle_core::{CoreConfig, RoomCoordinator};
use huddle_db::{Database, StoreError};
use huddle_types::{Actor, RoomType};

pub fn coordinator() -> RoomCoordinator {
    coordinator_with(CoreConfig::default())
}

pub fn coordinator_with(config: CoreConfig) -> RoomCoordinator {
    let db = Database::open_in_memory().expect("in-memory database");
    RoomCoordinator::new(Arc::new(db), config)
}

pub fn user(id: &str) -> Actor {
    Actor::User(id.to_owned())
}

/// A room of `room_type` owned by `owner`. Returns its token.
pub fn room(coord: &RoomCoordinator, owner: &Actor, room_type: RoomType) -> String {
    let params = NewRoomParams {
        room_type,
        name: "Standup".into(),
        object_type: String::new(),
        object_id: String::new(),
    };
    coord
        .create_room(owner, "Owner", &params)
        .expect("create room")
        .room
        .token
}

pub fn join(coord: &RoomCoordinator, token: &str, actor: &Actor) -> JoinOutcome {
    coord
        .join(
            token,
            JoinRequest {
                actor: Some(actor.clone()),
                display_name: actor.id().to_owned(),
                force: true,
                ..Default::default()
            },
        )
        .expect("join")
}

/// Group room with `owner` and the given members added.
pub fn group_with(coord: &RoomCoordinator, owner: &Actor, members: &[&Actor]) -> String {
    let token = room(coord, owner, RoomType::Group);
    for member in members {
        coord
            .add_attendee(&token, owner, member, member.id())
            .expect("add attendee");
    }
    token
}

pub fn count(coord: &RoomCoordinator, sql: &str) -> i64 {
    coord
        .database()
        .with_conn(|c| c.query_row(sql, [], |r| r.get(0)).map_err(StoreError::from))
        .expect("count query")
}
