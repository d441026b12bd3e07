use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("candidate '{0}' not found")]
    NotFound(String),

    #[error("candidate '{0}' already exists")]
    AlreadyExists(String),

    #[error("malformed record '{id}': {reason}")]
    Malformed { id: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("{0}")]
    Validation(String),

    #[error("candidate id '{0}' already exists")]
    DuplicateId(String),

    #[error("candidate '{name}' already exists in category '{category}' (id '{existing_id}')")]
    DuplicateEntry {
        name: String,
        category: String,
        existing_id: String,
    },

    #[error("candidate '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CandidateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CandidateError::NotFound(id),
            StoreError::AlreadyExists(id) => CandidateError::DuplicateId(id),
            other => CandidateError::Store(other),
        }
    }
}
