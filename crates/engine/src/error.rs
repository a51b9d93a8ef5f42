use uuid::Uuid;
use vellum_core::error::CoreError;

/// PostgreSQL SQLSTATE for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Engine-level error type.
///
/// Wraps [`CoreError`] for domain errors and sqlx failures for storage
/// errors. [`EngineError::code`] yields the stable code a transport adapter
/// maps onto its own status space.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level error from `vellum_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience type alias for engine return values.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Stable error code for transport mapping.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Core(core) => match core {
                CoreError::NotFound { .. } => "NOT_FOUND",
                CoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
                CoreError::FailedPrecondition(_) => "FAILED_PRECONDITION",
                CoreError::AlreadyExists(_) => "ALREADY_EXISTS",
                CoreError::NotChanged => "NO_CHANGE",
                CoreError::Internal(_) => "INTERNAL",
            },
            EngineError::Database(err) => classify_sqlx_error(err),
        }
    }
}

/// Classify a sqlx error into a stable code.
///
/// `RowNotFound` maps to NOT_FOUND and unique violations to ALREADY_EXISTS;
/// everything else is INTERNAL.
fn classify_sqlx_error(err: &sqlx::Error) -> &'static str {
    match err {
        sqlx::Error::RowNotFound => "NOT_FOUND",
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            "ALREADY_EXISTS"
        }
        _ => "INTERNAL",
    }
}

/// Whether a sqlx error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

/// Parse a UUID request field, failing with `INVALID_ARGUMENT`.
pub(crate) fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, EngineError> {
    Uuid::parse_str(raw).map_err(|_| {
        EngineError::Core(CoreError::InvalidArgument(format!(
            "{field} is not a valid UUID: {raw:?}"
        )))
    })
}
