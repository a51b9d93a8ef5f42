#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("document is not changed")]
    NotChanged,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build a `NotFound` for the given entity kind and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}
