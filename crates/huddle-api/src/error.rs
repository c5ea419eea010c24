use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use huddle_core::CoreError;
use huddle_types::api::SessionConflictResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No usable identity headers.
    #[error("missing or invalid identity")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("worker task failed")]
    Worker,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Core(e) => match e {
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::LobbyActive => StatusCode::PRECONDITION_FAILED,
                CoreError::AlreadyExists
                | CoreError::AlreadyBanned
                | CoreError::SessionInCall(_)
                | CoreError::InvalidState(_) => StatusCode::CONFLICT,
                CoreError::InvalidPermissions(_) | CoreError::InvalidArgument(_) => {
                    StatusCode::BAD_REQUEST
                }
                CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Worker => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Core(CoreError::SessionInCall(session)) = self {
            let body = SessionConflictResponse {
                session_id: session.session_id,
                in_call: session.in_call,
                last_ping: session.last_ping,
            };
            return (status, Json(body)).into_response();
        }

        if status.is_server_error() {
            // Storage details stay in the log
            error!(error = %self, "request failed");
            return (status, Json(json!({ "error": "internal error" }))).into_response();
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::Entity;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::NotFound(Entity::Room), StatusCode::NOT_FOUND),
            (CoreError::Forbidden("banned"), StatusCode::FORBIDDEN),
            (CoreError::LobbyActive, StatusCode::PRECONDITION_FAILED),
            (CoreError::AlreadyBanned, StatusCode::CONFLICT),
            (CoreError::InvalidState("rejected"), StatusCode::CONFLICT),
            (CoreError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
