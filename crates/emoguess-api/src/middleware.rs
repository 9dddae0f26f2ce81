use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;

use crate::error::ApiError;
use crate::session::USER_COOKIE;

/// Identity of the caller, read from the session cookie.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
}

/// Reject requests without a session cookie; handlers read the `Session`
/// extension. Session ids are opaque and not verified further.
pub async fn require_session(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let jar = CookieJar::from_headers(req.headers());
    let user_id = jar
        .get(USER_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    req.extensions_mut().insert(Session { user_id });
    Ok(next.run(req).await)
}
