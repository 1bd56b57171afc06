//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

/// Error body returned by every API endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    pub code: &'static str,
}

/// Handler error carrying its HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_REQUEST",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "Request failed");
        }
        let body = ErrorBody {
            ok: false,
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<jobstream_worker::Error> for ApiError {
    fn from(err: jobstream_worker::Error) -> Self {
        use jobstream_worker::Error as E;
        let (status, code) = match &err {
            E::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            E::AlreadyRunning(_) => (StatusCode::CONFLICT, "ALREADY_RUNNING"),
            E::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "WORKER_TIMEOUT"),
            E::Worker(_) | E::NoResult(_) | E::Protocol(_) => {
                (StatusCode::BAD_GATEWAY, "WORKER_FAILED")
            }
            E::Spawn(_) | E::Io(_) => (StatusCode::SERVICE_UNAVAILABLE, "WORKER_UNAVAILABLE"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<jobstream_core::Error> for ApiError {
    fn from(err: jobstream_core::Error) -> Self {
        match err {
            jobstream_core::Error::Worker(inner) => inner.into(),
            jobstream_core::Error::InvalidRequest(message) => Self::bad_request(message),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "INTERNAL",
                message: other.to_string(),
            },
        }
    }
}

impl From<jobstream_bus::Error> for ApiError {
    fn from(err: jobstream_bus::Error) -> Self {
        match err {
            jobstream_bus::Error::InvalidChannel(_) => Self::bad_request(err.to_string()),
            jobstream_bus::Error::SubscriberClosed => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "INTERNAL",
                message: err.to_string(),
            },
        }
    }
}
