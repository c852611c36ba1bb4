//! HTTP Basic Authentication for the management routes

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::rate_limit::client_ip;
use super::{AppState, ProblemDetails};

pub const BASIC_AUTH_CHALLENGE: &str = "Basic realm=\"MT5 Bridge\", charset=\"UTF-8\"";

/// `user:pass` from an `Authorization: Basic ...` header value
pub fn decode_basic_credentials(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Compares every byte so the time taken does not depend on where a guess goes wrong
pub(crate) fn secure_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic_credentials);

    let auth = &state.config.auth;
    let authorized = credentials.as_ref().is_some_and(|(user, pass)| {
        secure_eq(user, &auth.basic_user) && secure_eq(pass, &auth.basic_pass)
    });
    if authorized {
        return next.run(request).await;
    }

    let ip = client_ip(&request);
    let path = request.uri().path().to_string();
    // Browsers probe without credentials first; only remote failures are interesting
    if ip.is_loopback() || path.ends_with("/health") {
        tracing::debug!(ip = %ip, path = %path, "Basic auth required");
    } else {
        tracing::warn!(ip = %ip, path = %path, supplied = credentials.is_some(), "Basic auth failed");
    }

    ProblemDetails::unauthorized("Valid Basic Auth credentials are required", Some(BASIC_AUTH_CHALLENGE))
        .with_instance(path)
        .into_response()
}
