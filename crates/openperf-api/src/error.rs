// SPDX-License-Identifier: Apache-2.0

//! Maps internal errors onto the status codes spec.md section 6.3 specifies,
//! and onto the HTTP server's own startup failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use openperf_channel::bus::BusError;
use openperf_model::Error as ModelError;

/// Errors an HTTP handler can surface, mapped to a status code on response
/// (spec.md section 6.3).
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// A registry-level error (spec.md section 7's error taxonomy).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The request never reached the module server, or its reply was lost —
    /// both are bus/codec failures (spec.md section 6.3: "internal codec /
    /// bus failure" → 500).
    #[error("internal bus failure: {0}")]
    Bus(String),

    /// A TVLP-specific error (not-found, invalid profile, …) that does not
    /// fit the generator error taxonomy.
    #[error("{message}")]
    Tvlp {
        status: StatusCode,
        message: String,
    },
}

impl<Req> From<BusError<Req>> for ApiError {
    fn from(err: BusError<Req>) -> Self {
        ApiError::Bus(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Model(err) => model_error_status(err),
            ApiError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Tvlp { status, .. } => *status,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// spec.md section 6.3's status table, applied to spec.md section 7's error
/// taxonomy.
fn model_error_status(err: &ModelError) -> StatusCode {
    match err {
        ModelError::NotFound { .. } => StatusCode::NOT_FOUND,
        ModelError::Exists { .. } | ModelError::InvalidArgument { .. } | ModelError::Busy { .. } => StatusCode::BAD_REQUEST,
        ModelError::BusError { .. } | ModelError::Custom { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    /// Builds a 404 for a TVLP id that does not name any controller.
    #[must_use]
    pub fn tvlp_not_found(id: impl std::fmt::Display) -> Self {
        ApiError::Tvlp { status: StatusCode::NOT_FOUND, message: format!("tvlp \"{id}\" not found") }
    }

    /// Builds a 400 for a profile or start request that failed validation.
    #[must_use]
    pub fn tvlp_invalid(message: impl Into<String>) -> Self {
        ApiError::Tvlp { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}
