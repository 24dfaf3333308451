//! HTTP error envelope
//!
//! Every failed handler responds with
//!
//! ```json
//! {"error": {"Error": "...", "Code": 404, "Message": "...", "Detailed": "...", "FieldName": "..."}}
//! ```
//!
//! `Error` carries the technical text, `Message` the localized one.
//! `Detailed` and `FieldName` come from the database driver's detail line
//! when one is available; `Fields` holds per-field validation messages.

use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::i18n::status_for_code;
use crate::repository::{RepositoryError, RepositoryErrorKind};

/// Category of handler error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request body could not be decoded
    BindError,
    /// Record does not exist
    NotFound,
    /// Unique, foreign key or check constraint rejected the write
    ConstraintError,
    /// Payload failed validation
    ValidationError,
    /// Any other rejected request
    BadRequest,
    /// Caller may not perform the operation
    AccessDenied,
}

impl ErrorKind {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::BindError | Self::ConstraintError | Self::ValidationError | Self::BadRequest => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindError => write!(f, "bind_error"),
            Self::NotFound => write!(f, "not_found"),
            Self::ConstraintError => write!(f, "constraint_error"),
            Self::ValidationError => write!(f, "validation_error"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::AccessDenied => write!(f, "access_denied"),
        }
    }
}

impl From<RepositoryErrorKind> for ErrorKind {
    fn from(kind: RepositoryErrorKind) -> Self {
        match kind {
            RepositoryErrorKind::NotFound => Self::NotFound,
            RepositoryErrorKind::AlreadyExists | RepositoryErrorKind::ConstraintViolation => {
                Self::ConstraintError
            }
            RepositoryErrorKind::ValidationFailed | RepositoryErrorKind::SerializationError => {
                Self::ValidationError
            }
            RepositoryErrorKind::ConnectionFailed
            | RepositoryErrorKind::Timeout
            | RepositoryErrorKind::DatabaseError
            | RepositoryErrorKind::Other => Self::BadRequest,
        }
    }
}

/// Error returned by the CRUD handlers
///
/// ```rust
/// use crudkit::handlers::{AppError, ErrorKind};
///
/// let err = AppError::new(ErrorKind::NotFound, "no rows", "Record not found");
/// assert_eq!(err.status().as_u16(), 404);
///
/// let err = AppError::bad_request("boom", "Oops")
///     .with_detail("Key (phone_number)=(0555) already exists.");
/// assert_eq!(err.field_name.as_deref(), Some("PhoneNumber"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppError {
    #[serde(skip)]
    pub kind: ErrorKind,
    /// Technical description
    pub error: String,
    /// HTTP status
    #[serde(serialize_with = "serialize_status")]
    pub code: StatusCode,
    /// Localized, user-facing description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

impl AppError {
    pub fn new(kind: ErrorKind, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            code: kind.status_code(),
            message: message.into(),
            detailed: None,
            field_name: None,
            fields: None,
        }
    }

    /// Malformed request body
    pub fn bind(error: impl fmt::Display) -> Self {
        Self::new(ErrorKind::BindError, error.to_string(), "Bind error")
    }

    pub fn bad_request(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, error, message)
    }

    pub fn access_denied(error: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, error, "Access denied")
    }

    /// Error named by a message code, with the status that code maps to
    pub fn localized(code: &str, message: impl Into<String>) -> Self {
        let status = status_for_code(code);
        let kind = if status == StatusCode::NOT_FOUND {
            ErrorKind::NotFound
        } else {
            ErrorKind::BadRequest
        };
        Self::new(kind, code, message).with_status(status)
    }

    /// Wrap a repository failure under a localized message
    ///
    /// The status is left to the caller's message code; the driver detail,
    /// when present, fills `Detailed` and `FieldName`.
    pub fn from_repository(err: &RepositoryError, message: impl Into<String>) -> Self {
        let mut app = Self::new(ErrorKind::from(err.kind), err.to_string(), message)
            .with_status(StatusCode::BAD_REQUEST);
        if let Some(detail) = &err.detail {
            app = app.with_detail(detail.clone());
        }
        app
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.code = status;
        self
    }

    /// Attach the driver detail and the field name parsed from it
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        self.field_name = field_name_from_detail(&detail);
        self.detailed = Some(detail);
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.code.as_u16(), self.error)
    }
}

impl std::error::Error for AppError {}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        let message = err.message.clone();
        let status = ErrorKind::from(err.kind).status_code();
        Self::from_repository(&err, message).with_status(status)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a AppError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.code.is_server_error() {
            tracing::error!(
                kind = %self.kind,
                status = self.code.as_u16(),
                detail = ?self.detailed,
                "Request failed: {}", self.error
            );
        } else {
            tracing::warn!(
                kind = %self.kind,
                status = self.code.as_u16(),
                detail = ?self.detailed,
                "Request rejected: {}", self.error
            );
        }

        (self.code, Json(ErrorBody { error: &self })).into_response()
    }
}

/// Column named in a driver detail line, in PascalCase
///
/// Takes the text between the first `(` and the first `)`:
/// `Key (id_role)=(3) already exists.` yields `IdRole`.
pub fn field_name_from_detail(detail: &str) -> Option<String> {
    let start = detail.find('(')?;
    let end = detail.find(')')?;
    let inner = detail.get(start + 1..end)?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.split('_').map(capitalize).collect())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;
    use serde_json::json;

    #[test]
    fn test_error_kind_status_codes() {
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        for kind in [
            ErrorKind::BindError,
            ErrorKind::ConstraintError,
            ErrorKind::ValidationError,
            ErrorKind::BadRequest,
        ] {
            assert_eq!(kind.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_envelope_shape() {
        let err = AppError::localized("exception:could-not-fetch-records", "No things");
        assert_eq!(
            serde_json::to_value(ErrorBody { error: &err }).unwrap(),
            json!({"error": {
                "Error": "exception:could-not-fetch-records",
                "Code": 404,
                "Message": "No things",
            }})
        );
    }

    #[test]
    fn test_optional_fields_serialize_when_set() {
        let mut fields = BTreeMap::new();
        fields.insert("Name".to_string(), "required".to_string());
        let err = AppError::bad_request("boom", "Oops")
            .with_detail("Key (code)=(x) already exists.")
            .with_fields(fields);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["Detailed"], "Key (code)=(x) already exists.");
        assert_eq!(value["FieldName"], "Code");
        assert_eq!(value["Fields"]["Name"], "required");
        assert_eq!(value["Code"], 400);
    }

    #[test]
    fn test_field_name_from_detail() {
        assert_eq!(
            field_name_from_detail("Key (id_role)=(3) already exists.").as_deref(),
            Some("IdRole")
        );
        assert_eq!(
            field_name_from_detail("Key (phone_number)=(0555) already exists.").as_deref(),
            Some("PhoneNumber")
        );
        assert_eq!(field_name_from_detail("no parentheses"), None);
        assert_eq!(field_name_from_detail("empty () here"), None);
        assert_eq!(field_name_from_detail(") before ("), None);
    }

    #[test]
    fn test_from_repository_error() {
        let repo = RepositoryError::new(
            RepositoryOperation::Create,
            RepositoryErrorKind::ConstraintViolation,
            "duplicate key value violates unique constraint",
        )
        .with_detail("Key (code)=(a) already exists.");

        let err = AppError::from_repository(&repo, "Could not create things");
        assert_eq!(err.kind, ErrorKind::ConstraintError);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Could not create things");
        assert_eq!(err.field_name.as_deref(), Some("Code"));
        assert!(err.error.contains("duplicate key"));

        let err = AppError::from(RepositoryError::not_found("things", 7));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.detailed.is_none());
    }

    #[tokio::test]
    async fn test_into_response() {
        let response = AppError::bind("expected value at line 1").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["Message"], "Bind error");
        assert_eq!(value["error"]["Error"], "expected value at line 1");
    }
}
