use error_types::ServiceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("cursor must carry at least one id")]
    Empty,

    #[error("cannot encode negative id {0}")]
    NegativeId(i64),

    #[error("malformed page token")]
    Malformed,

    /// Token decodes, but not to a value this codec would have produced
    #[error("page token was not issued by this service")]
    Mismatch,

    #[error("page token value out of range")]
    OutOfRange,

    #[error("cursor key rejected: {0}")]
    Key(String),
}

/// A cursor that fails to decode is the caller's fault; a bad key is ours
impl From<CursorError> for ServiceError {
    fn from(err: CursorError) -> Self {
        match err {
            CursorError::Key(msg) => ServiceError::internal(msg),
            other => ServiceError::invalid_argument(format!("invalid page token: {}", other)),
        }
    }
}
