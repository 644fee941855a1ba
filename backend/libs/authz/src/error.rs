use error_types::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingCredentials,

    #[error("invalid authorization: {0}")]
    InvalidToken(String),

    #[error("caller {caller} is not permitted to perform this action")]
    Forbidden { caller: String },

    #[error("failed to issue token: {0}")]
    Issue(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => {
                ServiceError::Unauthenticated(err.to_string())
            }
            AuthError::Forbidden { .. } => ServiceError::PermissionDenied(err.to_string()),
            AuthError::Issue(_) => ServiceError::Internal(err.to_string()),
        }
    }
}
