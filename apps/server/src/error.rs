use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use leadrelay_core::errors::{Error as CoreError, OutboundError, ValidationError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const UPSTREAM_MESSAGE: &str = "The request could not be delivered. Please try again later.";
const UNAVAILABLE_MESSAGE: &str = "This service is temporarily unavailable. Please try again later.";
const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    /// Rejected webhook payload, echoed back for diagnostics.
    #[error("{message}")]
    InvalidPayload { message: String, received: Value },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Too many requests. Please wait a minute before trying again.")]
    RateLimited,
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the caller. Dependency and internal details
    /// stay in the server log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Upstream(_) => UPSTREAM_MESSAGE.to_string(),
            ApiError::Unavailable(_) => UNAVAILABLE_MESSAGE.to_string(),
            ApiError::Internal(_) | ApiError::Anyhow(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Full error chain for server-side diagnostics, when the error is a fault.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            ApiError::Anyhow(err) => Some(format!("{:?}", err)),
            ApiError::Upstream(detail) | ApiError::Unavailable(detail) | ApiError::Internal(detail) => {
                Some(detail.clone())
            }
            _ => None,
        }
    }

    fn log(&self) {
        if let Some(detail) = self.diagnostic() {
            tracing::error!(status = self.status_code().as_u16(), "{}", detail);
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: u16,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    received: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let error = self.public_message();
        let received = match self {
            ApiError::InvalidPayload { received, .. } => Some(received),
            _ => None,
        };
        let body = Json(ErrorBody {
            success: false,
            code: status.as_u16(),
            error,
            received,
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<OutboundError> for ApiError {
    fn from(err: OutboundError) -> Self {
        match err {
            OutboundError::NotConfigured(_) | OutboundError::Unreachable(_) => {
                ApiError::Unavailable(err.to_string())
            }
            OutboundError::Upstream { .. } => ApiError::Upstream(err.to_string()),
            OutboundError::Invalid(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => e.into(),
            CoreError::Outbound(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error shape used by the browser-facing form endpoints: `{ok: false, error}`.
#[derive(Debug)]
pub struct FormError(pub ApiError);

#[derive(Serialize)]
struct FormErrorBody {
    ok: bool,
    error: String,
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        self.0.log();
        let status = self.0.status_code();
        let body = Json(FormErrorBody {
            ok: false,
            error: self.0.public_message(),
        });
        (status, body).into_response()
    }
}

impl From<ApiError> for FormError {
    fn from(err: ApiError) -> Self {
        FormError(err)
    }
}

impl From<ValidationError> for FormError {
    fn from(err: ValidationError) -> Self {
        FormError(err.into())
    }
}

impl From<OutboundError> for FormError {
    fn from(err: OutboundError) -> Self {
        FormError(err.into())
    }
}

pub type FormResult<T> = Result<T, FormError>;
