use axum::Json;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Shown for malformed identities and identities missing from the guest list
/// alike, so the two cannot be told apart.
pub const GUEST_LIST_MESSAGE: &str =
    "We couldn't find you on our guest list. Please double-check or reach out to us directly.";

#[derive(Debug)]
pub enum AppError {
    NotOnGuestList,
    IncorrectCode,
    Unauthorized,
    BadRequest(String),
    RateLimited {
        message: &'static str,
        retry_after_seconds: u64,
    },
    Internal(String),
    Upstream(reqwest::Error),
    Token(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOnGuestList => write!(f, "{GUEST_LIST_MESSAGE}"),
            Self::IncorrectCode => write!(f, "Incorrect code. Please try again."),
            Self::Unauthorized => write!(f, "Authentication required"),
            Self::BadRequest(msg) => write!(f, "{msg}"),
            Self::RateLimited { message, .. } => write!(f, "{message}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::Upstream(e) => write!(f, "Upstream request failed: {e}"),
            Self::Token(e) => write!(f, "Token error: {e}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotOnGuestList => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::IncorrectCode => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::Internal(_) | Self::Upstream(_) | Self::Token(_) => {
                tracing::error!("{self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. Please try again.".to_string(),
                )
            }
        };

        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), "{message}");
        }

        let body = Json(json!({ "error": message }));
        match self {
            Self::RateLimited {
                retry_after_seconds,
                ..
            } => (status, [(RETRY_AFTER, retry_after_seconds.to_string())], body).into_response(),
            _ => (status, body).into_response(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream(e)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Token(e)
    }
}
