//! HTTP surface over the room engine.

pub mod bans;
pub mod chat;
pub mod error;
pub mod federation;
pub mod middleware;
pub mod participants;
pub mod rooms;
pub mod scheduled;
pub mod threads;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use huddle_core::{CoreError, CoreResult, RoomCoordinator};
use huddle_types::Actor;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Identity;

/// All routes, with identity extraction, CORS and request tracing applied.
pub fn router(coordinator: RoomCoordinator) -> Router {
    let room_routes = Router::new()
        .route("/room", get(rooms::list_rooms).post(rooms::create_room))
        .route("/room/{token}", get(rooms::get_room).put(rooms::rename_room))
        .route("/room/{token}/permissions/{mode}", put(rooms::set_permissions))
        .route("/room/{token}/webinar/lobby", put(rooms::set_lobby))
        .route("/room/{token}/read-only", put(rooms::set_read_only))
        .route("/room/{token}/listable", put(rooms::set_listable))
        .route("/room/{token}/notify", post(rooms::set_notification_level))
        .route(
            "/room/{token}/flags/{flag}",
            post(rooms::set_flag).delete(rooms::clear_flag),
        )
        .route(
            "/room/{token}/participants",
            get(participants::list_participants).post(participants::add_participant),
        )
        .route(
            "/room/{token}/participants/active",
            post(participants::join_room).delete(participants::leave_room),
        )
        .route("/room/{token}/participants/self", delete(participants::leave_membership))
        .route(
            "/room/{token}/attendees/{attendee_id}",
            put(participants::set_participant_type).delete(participants::remove_attendee),
        )
        .route("/room/{token}/attendees/permissions", put(participants::update_permissions));

    let call_routes = Router::new()
        .route("/call/{token}", post(participants::join_call).delete(participants::leave_call))
        .route("/call/{token}/ping", post(participants::ping));

    let ban_routes = Router::new()
        .route("/ban/{token}", get(bans::list_bans).post(bans::ban))
        .route("/ban/{token}/{ban_id}", delete(bans::unban));

    let chat_routes = Router::new()
        .route("/chat/{token}", get(chat::receive_messages).post(chat::send_message))
        .route(
            "/chat/{token}/read",
            get(chat::read_state).post(chat::mark_read).delete(chat::mark_unread),
        )
        .route(
            "/chat/{token}/schedule",
            get(scheduled::list_scheduled).post(scheduled::schedule_message),
        )
        .route(
            "/chat/{token}/schedule/{id}",
            put(scheduled::edit_scheduled).delete(scheduled::delete_scheduled),
        )
        .route("/chat/{token}/threads/recent", get(threads::recent_threads))
        .route("/chat/{token}/threads/{thread_id}", get(threads::get_thread).put(threads::rename_thread))
        .route("/chat/{token}/threads/{thread_id}/messages", get(threads::thread_messages))
        .route("/chat/{token}/threads/{thread_id}/notify", post(threads::set_notification_level))
        .route("/chat/{token}/threads/{thread_id}/read", post(threads::mark_thread_read))
        .route("/chat/{token}/{message_id}/thread", post(threads::create_thread))
        .route("/threads/subscribed", get(threads::subscribed_threads));

    let federation_routes = Router::new()
        .route(
            "/federation/invitations",
            get(federation::list_invitations).post(federation::receive_invite),
        )
        .route(
            "/federation/invitations/{invite_id}",
            post(federation::accept_invite).delete(federation::reject_invite),
        );

    Router::new()
        .merge(room_routes)
        .merge(call_routes)
        .merge(ban_routes)
        .merge(chat_routes)
        .merge(federation_routes)
        .layer(axum_middleware::from_fn(middleware::identify))
        .with_state(coordinator)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run a store-bound coordinator call off the async runtime.
pub(crate) async fn blocking<T, F>(coordinator: &RoomCoordinator, f: F) -> ApiResult<T>
where
    F: FnOnce(&RoomCoordinator) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let coordinator = coordinator.clone();
    tokio::task::spawn_blocking(move || f(&coordinator))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Worker
        })?
        .map_err(ApiError::from)
}

/// The caller's actor. Clients that joined as guests only carry their
/// session id, which is resolved to the guest behind it.
pub(crate) async fn caller(coordinator: &RoomCoordinator, identity: &Identity) -> ApiResult<Actor> {
    if let Some(actor) = &identity.actor {
        return Ok(actor.clone());
    }
    let session_id = identity.session()?.to_owned();
    match blocking(coordinator, move |c| c.actor_for_session(&session_id)).await {
        Err(ApiError::Core(CoreError::NotFound(_))) => Err(ApiError::Unauthorized),
        other => other,
    }
}
