//! API error handling
//!
//! Every failure leaves the server as `{ "error": { "code", "message" } }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use weather_core::WeatherError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "InvalidParamsError",
            Self::MethodNotFound(_) => "MethodNotFoundError",
            Self::Weather(err) => err.code(),
            Self::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotFound(_) => StatusCode::NOT_FOUND,
            Self::Weather(WeatherError::Config(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Weather(WeatherError::Upstream(_) | WeatherError::Parse(_)) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody { code: self.code().to_string(), message: self.to_string() }
    }
}

/// Error payload, shared by HTTP responses and `weather.error` stream events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(code = self.code(), %status, error = %self, "Request failed");
        (status, Json(ErrorEnvelope { error: self.body() })).into_response()
    }
}
