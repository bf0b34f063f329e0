use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimplicityError {
    #[error("invalid key")]
    InvalidKey,

    #[error("key not found")]
    KeyNotFound,

    #[error("key already exists")]
    KeyAlreadyExists,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown format: {0}")]
    UnknownFormat(String),

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("input and output formats are the same")]
    IdenticalFormats,

    #[error("output format cannot be source")]
    SourceOutput,

    #[error("nothing to upload")]
    EmptyUpload,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transcode error: {0}")]
    Transcode(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl SimplicityError {
    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            SimplicityError::Storage(_)
                | SimplicityError::Transcode(_)
                | SimplicityError::InternalError(_)
        )
    }
}

pub type SimplicityResult<T> = Result<T, SimplicityError>;
