use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use emoguess_game::GameError;
use emoguess_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no session, call POST /session first")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(&'static str),

    #[error(transparent)]
    Game(#[from] GameError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Game(e) => match e {
                GameError::AlreadyJoined | GameError::RoomFull => StatusCode::CONFLICT,
                GameError::NotInGame => StatusCode::FORBIDDEN,
                GameError::GameNotFound(_)
                | GameError::UserNotFound(_)
                | GameError::TurnNotFound(_)
                | GameError::WordNotFound(_) => StatusCode::NOT_FOUND,
                GameError::NoWords
                | GameError::Codec(_)
                | GameError::Feed(_)
                | GameError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "internal server error".to_string()
        } else {
            debug!("Request rejected ({}): {}", status, self);
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_client_statuses() {
        assert_eq!(ApiError::from(GameError::AlreadyJoined).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(GameError::RoomFull).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(GameError::NotInGame).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(GameError::GameNotFound("g".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn persistence_errors_are_opaque() {
        let err = ApiError::from(GameError::Persistence(anyhow::anyhow!("disk on fire")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
