use confstore_store::StoreError;

/// Errors returned through a [`StoreHandle`](crate::StoreHandle).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The service task has stopped.
    #[error("store service is not running")]
    Closed,
}

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
