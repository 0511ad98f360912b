//! Error types for core lead/ledger operations.
//!
//! Errors are classified by how the request boundary reports them:
//! - Validation / InvalidState / LimitExceeded → 400
//! - AccessDenied → 403
//! - NotFound → 404
//! - Db → 500
//!
//! None of these are fatal to the process; every operation recovers them
//! into a structured [`ApiResponse`].

use thiserror::Error;

use crate::db::DbError;

/// Error taxonomy for ledger, scope, and reporting operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Lead or disbursement entry absent.
    #[error("{0}")]
    NotFound(String),

    /// The acting principal's scope excludes the target resource.
    #[error("{0}")]
    AccessDenied(String),

    /// The lead's status is not eligible for the operation.
    #[error("{0}")]
    InvalidState(String),

    /// The operation would breach the no-over-disbursement invariant.
    #[error("{0}")]
    LimitExceeded(String),

    /// Underlying store failure.
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl CoreError {
    /// HTTP status the request boundary maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Validation(_)
            | CoreError::InvalidState(_)
            | CoreError::LimitExceeded(_) => 400,
            CoreError::AccessDenied(_) => 403,
            CoreError::NotFound(_) => 404,
            CoreError::Db(_) => 500,
        }
    }
}

/// Structured response envelope for every core operation.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload and a human-readable message.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    /// Failed response carrying the error message; pairs with
    /// [`CoreError::http_status`] at the boundary.
    pub fn error(err: &CoreError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(err.to_string()),
        }
    }
}

/// Convert an operation result into `(http_status, envelope)`.
///
/// `created` selects 201 over 200 for successful creates.
pub fn to_response<T>(
    result: Result<T, CoreError>,
    created: bool,
    message: &str,
) -> (u16, ApiResponse<T>) {
    match result {
        Ok(data) => (
            if created { 201 } else { 200 },
            ApiResponse::ok(data, message),
        ),
        Err(err) => (err.http_status(), ApiResponse::error(&err)),
    }
}
