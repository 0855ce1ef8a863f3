use crate::store::{error_chain_fmt, StoreError};

/// The four outcomes a caller has to tell apart. Transport layers map these onto their own
/// representation.
#[derive(thiserror::Error)]
pub enum SubscriptionError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Something went wrong while storing subscription data.")]
    Internal(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Conflict,
    Internal,
}

impl SubscriptionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubscriptionError::NotFound(_) => ErrorKind::NotFound,
            SubscriptionError::Invalid(_) => ErrorKind::Invalid,
            SubscriptionError::Conflict(_) => ErrorKind::Conflict,
            SubscriptionError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for SubscriptionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(message) => SubscriptionError::Conflict(message),
            err => SubscriptionError::Internal(err),
        }
    }
}

impl std::fmt::Debug for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
