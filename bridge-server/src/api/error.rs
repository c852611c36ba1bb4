use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

const TYPE_BASE: &str = "https://mt5-bridge.local/errors";

/// RFC 9457 Problem Details body
/// https://www.rfc-editor.org/rfc/rfc9457.html
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI identifying the problem type
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short human-readable summary of the problem type
    pub title: String,

    pub status: u16,

    /// Explanation specific to this occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI reference of the request that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Set on 401 responses of Basic Auth protected routes
    #[serde(skip)]
    pub challenge: Option<&'static str>,

    /// Seconds until a rate-limited client may retry
    #[serde(skip)]
    pub retry_after: Option<u64>,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            challenge: None,
            retry_after: None,
        }
    }

    fn of_kind(kind: &str, status: StatusCode) -> Self {
        Self::new(
            format!("{}/{}", TYPE_BASE, kind),
            status.canonical_reason().unwrap_or("Error"),
            status,
        )
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// 404 Not Found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::of_kind("not-found", StatusCode::NOT_FOUND)
            .with_detail(format!("{} was not found", resource.into()))
    }

    /// 409 Conflict
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::of_kind("conflict", StatusCode::CONFLICT).with_detail(detail)
    }

    /// 400 Bad Request
    pub fn validation_error(detail: impl Into<String>) -> Self {
        Self::of_kind("validation", StatusCode::BAD_REQUEST).with_detail(detail)
    }

    /// 401 Unauthorized. `challenge` becomes the `WWW-Authenticate` header.
    pub fn unauthorized(detail: impl Into<String>, challenge: Option<&'static str>) -> Self {
        let mut problem = Self::of_kind("unauthorized", StatusCode::UNAUTHORIZED).with_detail(detail);
        problem.challenge = challenge;
        problem
    }

    /// 429 Too Many Requests
    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        let mut problem = Self::of_kind("rate-limited", StatusCode::TOO_MANY_REQUESTS)
            .with_detail(format!(
                "Rate limit exceeded, retry in {} seconds",
                retry_after_secs
            ));
        problem.retry_after = Some(retry_after_secs);
        problem
    }

    /// 500 Internal Server Error
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::of_kind("internal", StatusCode::INTERNAL_SERVER_ERROR).with_detail(detail)
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let challenge = self.challenge;
        let retry_after = self.retry_after;

        let mut response = (status, Json(self)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        if let Some(challenge) = challenge {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ProblemDetails>;

/// Log an unexpected failure and turn it into a 500
pub(crate) fn internal(context: &str, e: impl std::fmt::Display) -> ProblemDetails {
    tracing::error!(error = %e, "{}", context);
    ProblemDetails::internal_error(format!("{}: {}", context, e))
}
