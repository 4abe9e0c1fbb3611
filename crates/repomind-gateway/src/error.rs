use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use repomind_core::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// A failed request, rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(e) if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            Self::Service(e) if e.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
            Self::Service(ServiceError::Clone(_)) => StatusCode::BAD_GATEWAY,
            Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "request failed: {self}");
        } else {
            tracing::warn!(%status, "request rejected: {self}");
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
