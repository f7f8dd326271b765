use rag_core::PipelineError;

/// Errors local to the intent classifier, converting into the cross-cutting
/// [`PipelineError`] at every call boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid pattern library: {0}")]
    InvalidLibrary(String),

    #[error("confidence {0:.2} below rejection threshold")]
    Rejected(f32),

    #[error(transparent)]
    Core(#[from] PipelineError),
}

impl From<Error> for PipelineError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidLibrary(msg) => PipelineError::Internal(msg),
            Error::Rejected(confidence) => {
                PipelineError::InvalidArgument(format!("please rephrase your query (confidence {confidence:.2})"))
            }
            Error::Core(inner) => inner,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_converts_to_invalid_argument() {
        let err: PipelineError = Error::Rejected(0.2).into();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn invalid_library_converts_to_internal() {
        let err: PipelineError = Error::InvalidLibrary("bad regex".to_string()).into();
        assert!(matches!(err, PipelineError::Internal(_)));
    }
}
