//! Error type for the chunker.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("splitting error: {0}")]
    SplittingError(String),

    #[error(transparent)]
    Core(#[from] rag_core::PipelineError),
}

impl From<Error> for rag_core::PipelineError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidConfiguration(msg) => rag_core::PipelineError::InvalidArgument(msg),
            Error::SplittingError(msg) => rag_core::PipelineError::Internal(msg),
            Error::Core(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
