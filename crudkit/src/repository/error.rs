//! Repository error types
//!
//! Structured errors for data-access operations. Every store failure is
//! classified into a [`RepositoryErrorKind`] so that callers can map it to a
//! user-facing error without inspecting driver internals. The driver's
//! diagnostic `detail` and violated `constraint` are retained when PostgreSQL
//! provides them.
//!
//! # Example
//!
//! ```rust
//! use crudkit::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("things", 42);
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert_eq!(error.entity_id.as_deref(), Some("42"));
//! ```

use std::fmt;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Paginated listing of active rows
    FindAll,
    /// Paginated listing of soft-deleted rows
    FindAllDeleted,
    /// Loading a single active row
    FindOne,
    /// Loading a single soft-deleted row
    FindOneDeleted,
    /// Inserting a row
    Create,
    /// Updating a row
    Update,
    /// Soft or hard deleting a row
    Delete,
    /// Clearing the deletion marker
    Recover,
    /// Insert-or-update on a named constraint
    Upsert,
    /// Caller-supplied predicate or SQL
    Raw,
    /// Transaction begin/commit/rollback
    Transaction,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FindAll => write!(f, "find_all"),
            Self::FindAllDeleted => write!(f, "find_all_deleted"),
            Self::FindOne => write!(f, "find_one"),
            Self::FindOneDeleted => write!(f, "find_one_deleted"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Recover => write!(f, "recover"),
            Self::Upsert => write!(f, "create_or_update"),
            Self::Raw => write!(f, "raw"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// No row matched
    NotFound,
    /// Unique constraint violation
    AlreadyExists,
    /// Foreign key, not-null or check constraint violation
    ConstraintViolation,
    /// Rejected before reaching the store
    ValidationFailed,
    /// Failed to reach the store
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Any other store-reported error
    DatabaseError,
    /// Row or payload could not be (de)serialized
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use crudkit::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::not_found("things", 7).with_operation(RepositoryOperation::Delete);
/// assert_eq!(
///     error.to_string(),
///     "Repository not_found error during delete: Record not found [things: 7]"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Technical error message (never shown to clients verbatim)
    pub message: String,
    /// Table of the record involved
    pub entity_type: Option<String>,
    /// Identity of the record involved
    pub entity_id: Option<String>,
    /// Driver diagnostic detail, e.g. `Key (user_name)=(bob) already exists.`
    pub detail: Option<String>,
    /// Name of the violated constraint
    pub constraint: Option<String>,
}

/// Result alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            detail: None,
            constraint: None,
        }
    }

    /// Create a "not found" error with record context
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl ToString) -> Self {
        Self::new(
            RepositoryOperation::FindOne,
            RepositoryErrorKind::NotFound,
            "Record not found",
        )
        .with_entity(entity_type, entity_id.to_string())
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Classify a sqlx error raised during `operation`
    pub fn from_sqlx(operation: RepositoryOperation, err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match err {
            sqlx::Error::RowNotFound => {
                Self::new(operation, RepositoryErrorKind::NotFound, "Record not found")
            }
            sqlx::Error::PoolTimedOut => {
                Self::new(operation, RepositoryErrorKind::Timeout, err.to_string())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                Self::new(operation, RepositoryErrorKind::ConnectionFailed, err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::new(operation, RepositoryErrorKind::SerializationError, err.to_string())
            }
            sqlx::Error::Database(ref db_err) => {
                let kind = match db_err.kind() {
                    ErrorKind::UniqueViolation => RepositoryErrorKind::AlreadyExists,
                    ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => RepositoryErrorKind::ConstraintViolation,
                    _ => RepositoryErrorKind::DatabaseError,
                };
                let detail = db_err
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.detail())
                    .map(str::to_string);
                let constraint = db_err.constraint().map(str::to_string);

                let mut error = Self::new(operation, kind, db_err.message());
                error.detail = detail;
                error.constraint = constraint;
                error
            }
            other => Self::new(operation, RepositoryErrorKind::DatabaseError, other.to_string()),
        }
    }

    /// Add record context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Attach the driver's diagnostic detail
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Whether a row was missing
    pub fn is_not_found(&self) -> bool {
        self.kind == RepositoryErrorKind::NotFound
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(ref entity_type), Some(ref entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::FindAll), "find_all");
        assert_eq!(
            format!("{}", RepositoryOperation::FindAllDeleted),
            "find_all_deleted"
        );
        assert_eq!(format!("{}", RepositoryOperation::Recover), "recover");
        assert_eq!(format!("{}", RepositoryOperation::Upsert), "create_or_update");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(format!("{}", RepositoryErrorKind::NotFound), "not_found");
        assert_eq!(
            format!("{}", RepositoryErrorKind::AlreadyExists),
            "already_exists"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::ConstraintViolation),
            "constraint_violation"
        );
        assert_eq!(format!("{}", RepositoryErrorKind::Other), "other");
    }

    #[test]
    fn test_not_found_convenience() {
        let error = RepositoryError::not_found("things", 12);
        assert_eq!(error.operation, RepositoryOperation::FindOne);
        assert!(error.is_not_found());
        assert_eq!(error.entity_type.as_deref(), Some("things"));
        assert_eq!(error.entity_id.as_deref(), Some("12"));
        assert!(!error.is_retriable());
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error = RepositoryError::from_sqlx(RepositoryOperation::Update, sqlx::Error::RowNotFound);
        assert_eq!(error.kind, RepositoryErrorKind::NotFound);
        assert_eq!(error.operation, RepositoryOperation::Update);
    }

    #[test]
    fn test_from_sqlx_pool_timeout_is_retriable() {
        let error =
            RepositoryError::from_sqlx(RepositoryOperation::FindAll, sqlx::Error::PoolTimedOut);
        assert_eq!(error.kind, RepositoryErrorKind::Timeout);
        assert!(error.is_retriable());
    }

    #[test]
    fn test_display_with_entity() {
        let error = RepositoryError::validation_failed(RepositoryOperation::Upsert, "bad column")
            .with_entity("permissions", "0");
        assert_eq!(
            error.to_string(),
            "Repository validation_failed error during create_or_update: bad column [permissions: 0]"
        );
    }

    #[test]
    fn test_with_detail() {
        let error = RepositoryError::new(
            RepositoryOperation::Create,
            RepositoryErrorKind::AlreadyExists,
            "duplicate key value violates unique constraint",
        )
        .with_detail("Key (user_name)=(bob) already exists.");
        assert_eq!(
            error.detail.as_deref(),
            Some("Key (user_name)=(bob) already exists.")
        );
    }
}
