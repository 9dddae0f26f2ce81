use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use emoguess_types::api::SessionResponse;

use crate::AppState;
use crate::error::ApiError;

pub const USER_COOKIE: &str = "userid";
pub const NICKNAME_COOKIE: &str = "nickname";

/// Start a session as a fresh user with a generated nickname.
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.game.init_user().await?;

    let jar = jar
        .add(session_cookie(USER_COOKIE, user.id.clone(), state.cookie_secure))
        .add(session_cookie(NICKNAME_COOKIE, user.nickname.clone(), state.cookie_secure));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            user_id: user.id,
            nickname: user.nickname,
        }),
    ))
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}
