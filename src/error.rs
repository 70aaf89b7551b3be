//! Error types for every layer of the price ledger.
//!
//! The leaf errors ([`ValidationError`], [`SourceError`],
//! [`PersistenceError`], [`RegistryError`]) describe a single failing
//! collaborator. [`ServiceError`] is the central error type returned by the
//! service layer; each variant maps to a specific HTTP status code and
//! structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON envelope returned for every failed request:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "store not found: acme",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// The failure itself.
    pub error: ErrorBody,
}

/// Code, message and optional detail of a failed request.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// `Display` text of the error.
    pub message: String,
    /// Extra context, omitted when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A raw product record could not be turned into a snapshot.
///
/// Only the offending record is skipped; the run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is absent, null or blank.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A field that must be numeric could not be parsed as a number.
    #[error("field `{field}` is not numeric: {value}")]
    NotNumeric {
        /// Field name.
        field: &'static str,
        /// Offending raw value.
        value: String,
    },

    /// A price field parsed to a negative amount.
    #[error("field `{0}` is negative")]
    NegativePrice(&'static str),
}

/// Failure of a feed or scraper collaborator. Aborts the run for one store.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport-level HTTP failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload could not be parsed.
    #[error("malformed payload: {0}")]
    Parse(String),

    /// A configured CSS selector is invalid.
    #[error("invalid selector {0}")]
    Selector(String),

    /// The source cannot serve this kind of store.
    #[error("source does not support store `{0}`")]
    Unsupported(String),
}

/// Failure of a single persistence operation.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Database driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed at startup.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Decode(String),

    /// Backend-specific failure that is not a driver error.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The store registry file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Registry file could not be read.
    #[error("cannot read store registry: {0}")]
    Io(#[from] std::io::Error),

    /// Registry file is not valid JSON of the expected shape.
    #[error("invalid store registry: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two stores share a name.
    #[error("duplicate store name `{0}` in registry")]
    DuplicateStore(String),
}

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    /// Environment variable name.
    pub key: &'static str,
    /// Rejected raw value.
    pub value: String,
}

/// Service-level error with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
///
/// Source failures never surface here: they are reported per store inside
/// the run summary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Store with the given name is not in the registry.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    /// The request could not be accepted as given.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A reconciliation run is already in progress.
    #[error("a reconciliation run is already in progress")]
    RunInProgress,

    /// The price store rejected a read or write.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl ServiceError {
    /// Stable numeric code reported in [`ErrorBody::code`].
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::StoreNotFound(_) => 2001,
            Self::RunInProgress => 2002,
            Self::Persistence(_) => 3001,
        }
    }

    /// HTTP status the error is answered with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreNotFound(_) => StatusCode::NOT_FOUND,
            Self::RunInProgress => StatusCode::CONFLICT,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_ranges() {
        assert_eq!(ServiceError::InvalidRequest("x".into()).error_code(), 1001);
        assert_eq!(ServiceError::StoreNotFound("acme".into()).error_code(), 2001);
        assert_eq!(ServiceError::RunInProgress.error_code(), 2002);
        assert_eq!(
            ServiceError::Persistence(PersistenceError::Unavailable("down".into())).error_code(),
            3001
        );
    }

    #[test]
    fn run_in_progress_is_conflict() {
        let response = ServiceError::RunInProgress.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_messages_name_the_field() {
        let err = ValidationError::NotNumeric {
            field: "listPrice",
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "field `listPrice` is not numeric: abc");
        assert_eq!(
            ValidationError::MissingField("sku").to_string(),
            "missing required field `sku`"
        );
    }
}
