pub mod error;
pub mod events;
pub mod games;
pub mod middleware;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};

use emoguess_game::GameService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub game: GameService,
    /// Mark session cookies `Secure`; off only for plain-HTTP development
    pub cookie_secure: bool,
}

/// Every HTTP route. Layers such as tracing and CORS are added by the caller.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/session", post(session::create_session))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/games", post(games::create_game))
        .route("/games/{game_id}", get(games::get_game))
        .route("/games/{game_id}/join", post(games::join_game))
        .route("/games/{game_id}/leaderboard", get(games::get_leaderboard))
        .route("/games/{game_id}/word", get(games::get_word))
        .route("/games/{game_id}/guess", post(games::submit_guess))
        .route("/games/{game_id}/messages", post(games::send_message))
        .route("/games/{game_id}/events", get(events::game_events))
        .layer(from_fn(middleware::require_session))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> &'static str {
    "ok"
}
