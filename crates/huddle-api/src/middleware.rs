use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use huddle_types::{Actor, ActorType};

use crate::error::{ApiError, ApiResult};

pub const ACTOR_TYPE_HEADER: &str = "x-huddle-actor-type";
pub const ACTOR_ID_HEADER: &str = "x-huddle-actor-id";
pub const SESSION_HEADER: &str = "x-huddle-session";

/// Who is calling, as vouched for by the hosting layer in front of us.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub actor: Option<Actor>,
    pub session_id: Option<String>,
}

impl Identity {
    pub fn actor(&self) -> ApiResult<&Actor> {
        self.actor.as_ref().ok_or(ApiError::Unauthorized)
    }

    pub fn session(&self) -> ApiResult<&str> {
        self.session_id.as_deref().ok_or(ApiError::Unauthorized)
    }
}

/// Read the trusted identity headers into an [`Identity`] extension.
///
/// Requests without actor headers pass as anonymous; handlers decide whether
/// that is enough. Malformed headers are rejected outright.
pub async fn identify(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let identity = parse_identity(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn parse_identity(headers: &HeaderMap) -> Option<Identity> {
    let header = |name: &str| -> Option<Result<&str, ()>> {
        headers
            .get(name)
            .map(|v| v.to_str().map(str::trim).map_err(|_| ()))
    };

    let actor = match (header(ACTOR_TYPE_HEADER), header(ACTOR_ID_HEADER)) {
        (None, None) => None,
        (Some(Ok(kind)), Some(Ok(id))) if !id.is_empty() => {
            let kind: ActorType = kind.parse().ok()?;
            Some(Actor::new(kind, id))
        }
        _ => return None,
    };
    let session_id = match header(SESSION_HEADER) {
        None => None,
        Some(Ok(sid)) if !sid.is_empty() => Some(sid.to_owned()),
        Some(_) => return None,
    };
    Some(Identity { actor, session_id })
}
