use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::repo::RepoError;
use crate::validation::{FieldIssue, ValidationError};

static EXPOSE_INTERNAL: OnceCell<bool> = OnceCell::new();

/// Called once at start-up; production builds hide internal error detail.
pub fn set_expose_internal_errors(expose: bool) {
    let _ = EXPOSE_INTERNAL.set(expose);
}

fn expose_internal() -> bool {
    *EXPOSE_INTERNAL.get().unwrap_or(&true)
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldIssue>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { message: String, details: Vec<FieldIssue> },
    #[error("not found")] NotFound,
    #[error("conflict: {0}")] Conflict(String),
    #[error("payload too large")] PayloadTooLarge,
    #[error("Too many requests, please try again later.")]
    TooManyRequests { retry_after: u64 },
    #[error("internal error: {0}")] Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest { message: message.into(), details: Vec::new() }
    }
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict(what) => ApiError::Conflict(what),
            RepoError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest { message: e.message, details: e.issues }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        self.render(expose_internal())
    }
}

impl ApiError {
    /// Builds the JSON response; `expose_internal` keeps 500 detail in the body.
    pub fn render(&self, expose_internal: bool) -> HttpResponse {
        let mut body = ApiErrorBody { error: self.to_string(), details: Vec::new(), retry_after: None };
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            ApiError::BadRequest { details, .. } => body.details = details.clone(),
            ApiError::TooManyRequests { retry_after } => {
                body.retry_after = Some(*retry_after);
                builder.insert_header((header::RETRY_AFTER, retry_after.to_string()));
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                if !expose_internal {
                    body.error = "Internal Server Error".into();
                }
            }
            _ => {}
        }
        builder.json(body)
    }
}
