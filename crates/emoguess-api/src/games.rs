use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use emoguess_types::api::{CreateGameResponse, GameWordResponse, SubmitContentRequest};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::Session;

/// Longest accepted guess or chat line, in characters.
const MAX_CONTENT_CHARS: usize = 200;

pub async fn create_game(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.game.init_game(&session.user_id).await?;
    Ok((StatusCode::CREATED, Json(CreateGameResponse { game_id: game.id })))
}

pub async fn join_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<StatusCode, ApiError> {
    state.game.join_game(&game_id, &session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.game.game_state(&game_id, &session.user_id).await?))
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.game.leaderboard(&game_id, &session.user_id).await?))
}

pub async fn get_word(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let word = state.game.game_word(&game_id, &session.user_id).await?;
    Ok(Json(GameWordResponse { word }))
}

pub async fn submit_guess(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Extension(session): Extension<Session>,
    Json(req): Json<SubmitContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_content(&req.content)?;
    let own = state.game.submit_guess(&game_id, &session.user_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(own)))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Extension(session): Extension<Session>,
    Json(req): Json<SubmitContentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_content(&req.content)?;
    let own = state.game.send_message(&game_id, &session.user_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(own)))
}

/// Content is stored and compared verbatim; only blank or oversized input is
/// refused.
fn validate_content(content: &str) -> Result<(), ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::BadRequest("content is too long"));
    }
    Ok(())
}
