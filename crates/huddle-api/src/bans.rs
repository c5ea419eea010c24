use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use huddle_core::RoomCoordinator;
use huddle_types::Actor;
use huddle_types::api::BanRequest;
use huddle_types::models::Ban;

use crate::error::ApiResult;
use crate::middleware::Identity;
use crate::{blocking, caller};

pub async fn list_bans(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Ban>>> {
    let actor = caller(&state, &identity).await?;
    let bans = blocking(&state, move |c| c.bans(&token, &actor)).await?;
    Ok(Json(bans))
}

pub async fn ban(
    State(state): State<RoomCoordinator>,
    Path(token): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<BanRequest>,
) -> ApiResult<impl IntoResponse> {
    let moderator = caller(&state, &identity).await?;
    let banned = Actor::new(req.actor_type, req.actor_id);
    let ban = blocking(&state, move |c| {
        c.ban_actor(&token, &moderator, &banned, &req.internal_note)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ban)))
}

pub async fn unban(
    State(state): State<RoomCoordinator>,
    Path((token, ban_id)): Path<(String, i64)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let moderator = caller(&state, &identity).await?;
    blocking(&state, move |c| c.unban(&token, &moderator, ban_id)).await?;
    Ok(StatusCode::OK)
}
