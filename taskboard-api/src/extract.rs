/// Session cookie extractor
///
/// Pulls the opaque session token out of the `Cookie` header. The token is
/// never inspected here; a missing cookie simply yields `None` and the guard
/// chain decides whether that is acceptable for the operation.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::convert::Infallible;
use taskboard_shared::session::SessionToken;

use crate::app::AppState;

/// Session token from the request cookie, if any
#[derive(Debug, Clone)]
pub struct SessionCookie(pub Option<SessionToken>);

#[async_trait]
impl FromRequestParts<AppState> for SessionCookie {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, &state.config.session.cookie_name).map(SessionToken::from_raw);
        Ok(SessionCookie(token))
    }
}

/// User-Agent header, recorded on new sessions
#[derive(Debug, Clone)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserAgent {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.chars().take(256).collect());
        Ok(UserAgent(agent))
    }
}

/// Finds `name` across every `Cookie` header
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
