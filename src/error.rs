//! Domain error types for ARA.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

/// Business rules that reject an operation before any write happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusinessError {
    /// A project (legacy source or migration destination) was not given
    #[error("a project is required")]
    ProjectRequired,

    /// The given project lacks data required by the operation (e.g. its id)
    #[error("the project is incomplete")]
    IncompleteProject,
}

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A business rule was violated by the caller's input
    #[error("Business rule violated: {0}")]
    Business(#[from] BusinessError),

    /// Store operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Resource would duplicate an existing one
    #[error("{0} already exists")]
    NotUnique(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot file could not be read or written
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl AppError {
    /// True for errors caused by the caller's input (as opposed to missing data).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::Business(_) | AppError::InvalidInput(_) | AppError::NotUnique(_)
        )
    }

    /// True when the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Snapshot(format!("JSON parsing error: {}", err))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Snapshot(format!("I/O error: {}", err))
    }
}
