use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use thiserror::Error;

use crate::models::ErrorBody;

/// CRM collections the proxy reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Leads,
    Contacts,
}

impl Resource {
    /// Key under `_embedded` holding the collection, also the path segment.
    pub fn collection_key(self) -> &'static str {
        match self {
            Resource::Leads => "leads",
            Resource::Contacts => "contacts",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Resource::Leads => "/api/v4/leads",
            Resource::Contacts => "/api/v4/contacts",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_key())
    }
}

/// Failures of the token manager and CRM client.
#[derive(Debug, Error)]
pub enum CrmError {
    /// The OAuth refresh call failed (transport error, non-2xx or unreadable body).
    #[error("failed to refresh access token: {0}")]
    AuthRefresh(String),

    /// A fetch failed with something other than 401, or failed again after the retry.
    #[error("failed to fetch {resource}: {reason}")]
    Request { resource: Resource, reason: String },

    /// The CRM answered without the `_embedded` envelope.
    #[error("invalid response from {resource} API")]
    InvalidResponse { resource: Resource },

    #[error("no leads found in the response")]
    NoLeadsFound,

    #[error("no contacts found in the response")]
    NoContactsFound,
}

impl CrmError {
    /// The "envelope present, collection missing" error for a resource.
    pub fn not_found(resource: Resource) -> Self {
        match resource {
            Resource::Leads => CrmError::NoLeadsFound,
            Resource::Contacts => CrmError::NoContactsFound,
        }
    }
}

/// Application-specific error types surfaced over HTTP.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (rejected upstream call or invalid input).
    BadRequest(String),
    /// Internal server error.
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::InternalError(msg) => {
                msg
            }
        }
    }
}

impl IntoResponse for AppError {
    /// Maps each variant to its status code and a `{statusCode, message}` body.
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
            AppError::BadRequest(msg) => tracing::warn!("Bad request: {}", msg),
            AppError::NotFound(msg) => tracing::info!("Not found: {}", msg),
        }

        let body = Json(ErrorBody {
            status_code: status.as_u16(),
            message: self.message().to_string(),
        });

        (status, body).into_response()
    }
}

impl From<CrmError> for AppError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::AuthRefresh(_) => {
                AppError::BadRequest("Failed to refresh access token".to_string())
            }
            CrmError::Request { resource, .. } => {
                AppError::BadRequest(format!("Failed to fetch {}", resource))
            }
            CrmError::InvalidResponse { resource } => {
                AppError::InternalError(format!("Invalid response from {} API", resource))
            }
            CrmError::NoLeadsFound => {
                AppError::NotFound("No leads found in the response".to_string())
            }
            CrmError::NoContactsFound => {
                AppError::NotFound("No contacts found in the response".to_string())
            }
        }
    }
}
