//! Shared error taxonomy for the channel and subscriber services
//!
//! Every public operation returns [`ServiceResult`]. Errors are classified by
//! [`ErrorKind`]; wrapping an error with the failing operation's name keeps its
//! kind, so callers can always recover the original classification.

use thiserror::Error;
use tonic::{Code, Status};

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Internal,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An error annotated with the operation that produced it
    #[error("{op}: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: Box<ServiceError>,
    },
}

impl ServiceError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classification of this error, looking through operation wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(e) if is_unique_violation(e) => ErrorKind::InvalidArgument,
            Self::Database(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            Self::Internal(_) | Self::Database(_) => ErrorKind::Internal,
            Self::Operation { source, .. } => source.kind(),
        }
    }

    /// Wrap with the operation name. Wrapping twice with the same name is a no-op.
    pub fn with_op(self, op: &'static str) -> Self {
        match self {
            Self::Operation { op: existing, .. } if existing == op => self,
            other => Self::Operation {
                op,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, without operation wrappers
    pub fn root(&self) -> &ServiceError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Shorthand for `map_err(|e| e.with_op(op))`
pub trait OpContext<T> {
    fn op(self, op: &'static str) -> ServiceResult<T>;
}

impl<T, E> OpContext<T> for Result<T, E>
where
    E: Into<ServiceError>,
{
    fn op(self, op: &'static str) -> ServiceResult<T> {
        self.map_err(|e| e.into().with_op(op))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

impl From<ErrorKind> for Code {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArgument => Code::InvalidArgument,
            ErrorKind::Unauthenticated => Code::Unauthenticated,
            ErrorKind::PermissionDenied => Code::PermissionDenied,
            ErrorKind::NotFound => Code::NotFound,
            ErrorKind::Internal => Code::Internal,
        }
    }
}

/// Convert ServiceError to tonic::Status for gRPC responses
impl From<ServiceError> for Status {
    fn from(err: ServiceError) -> Self {
        let code = Code::from(err.kind());
        if code == Code::Internal {
            tracing::error!(error = %err, "Internal error returned to caller");
        }
        Status::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_keeps_kind() {
        let err = ServiceError::not_found("account u1").with_op("GetSubscriber");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "GetSubscriber: Not found: account u1");
    }

    #[test]
    fn test_with_op_nesting() {
        let err = ServiceError::internal("boom")
            .with_op("IncrementSubscribers")
            .with_op("Subscribe")
            .with_op("Subscribe");
        assert_eq!(
            err.to_string(),
            "Subscribe: IncrementSubscribers: Internal error: boom"
        );
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(matches!(err.root(), ServiceError::Internal(_)));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::invalid_argument("x"), Code::InvalidArgument),
            (ServiceError::Unauthenticated("x".into()), Code::Unauthenticated),
            (ServiceError::permission_denied("x"), Code::PermissionDenied),
            (ServiceError::not_found("x"), Code::NotFound),
            (ServiceError::internal("x"), Code::Internal),
            (ServiceError::Database(sqlx::Error::PoolTimedOut), Code::Internal),
            (ServiceError::Database(sqlx::Error::RowNotFound), Code::NotFound),
        ];

        for (err, code) in cases {
            let status: Status = err.with_op("Op").into();
            assert_eq!(status.code(), code);
            assert!(status.message().starts_with("Op: "));
        }
    }

    #[test]
    fn test_op_context_trait() {
        let res: Result<(), ServiceError> = Err(ServiceError::permission_denied("not owner"));
        let err = res.op("DeleteChannel").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.to_string().starts_with("DeleteChannel"));
    }
}
