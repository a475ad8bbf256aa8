//! HTTP API over the retained metrics
//!
//! # API Endpoints
//!
//! - `GET /metrics` - latest record of every instance
//! - `GET /metrics/:instance_id` - latest record of one instance, or its
//!   history with `?timeInterval=<N>mins`
//! - `GET /metrics/export/csv?instance_id=<id>` - latest record as CSV
//! - `GET /healthz` - liveness and open session count
//!
//! Errors are returned as `{"error": "<message>"}`.

use core::error::Error;

use api_types::ErrorResponse;
use poem::error::ResponseError;
use poem::http::StatusCode;
use poem::web::Json;
use poem::IntoResponse;
use poem::Response;

pub mod csv;
pub mod handlers;
pub mod interval;
pub mod server;

/// API errors
#[derive(Debug, derive_more::Display)]
pub enum ApiError {
    #[display("Instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },
    #[display("Invalid time interval format: {value:?}. Use '30mins', '15mins', '5mins', or '1min'.")]
    InvalidInterval { value: String },
    #[display("{name} query parameter is required")]
    MissingParameter { name: String },
    #[display("Server error: {message}")]
    ServerError { message: String },
}

impl Error for ApiError {}

impl ResponseError for ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InstanceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidInterval { .. } | Self::MissingParameter { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::ServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn as_response(&self) -> Response {
        let mut response = Json(ErrorResponse {
            error: self.to_string(),
        })
        .into_response();
        response.set_status(self.status());
        response
    }
}
