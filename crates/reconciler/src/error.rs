//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// Every variant except `RecordNotFound` on fetch is returned to the
/// dispatcher unchanged, which owns retry and backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Record does not exist in the store.
    #[error("record '{key}' not found")]
    RecordNotFound { key: String },

    /// Record store operation failed.
    #[error("record store operation '{operation}' failed: {reason}")]
    StoreFailed { operation: String, reason: String },

    /// Record cannot be mapped onto the reconciler's data model.
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// Provider session or configuration could not be established.
    #[error("provider configuration error: {reason}")]
    ProviderConfig { reason: String },

    /// Provider create call failed. No instance was created.
    #[error("provisioning failed: {reason}")]
    ProvisioningFailed { reason: String },

    /// Provider answered a single-instance create with no instance id.
    #[error("provider returned no instance id for a single-instance request")]
    EmptyProvisioningResponse,

    /// Status write failed after the instance was created.
    #[error("failed to persist status for '{key}': {reason}")]
    StatusPersistence { key: String, reason: String },

    /// Status write lost an optimistic-concurrency race.
    #[error("status update for '{key}' conflicted with a concurrent write: {reason}")]
    StatusConflict { key: String, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a record not found error.
    pub fn record_not_found(key: impl Into<String>) -> Self {
        Self::RecordNotFound { key: key.into() }
    }

    /// Create a store failed error.
    pub fn store_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid record error.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Create a provider configuration error.
    pub fn provider_config(reason: impl Into<String>) -> Self {
        Self::ProviderConfig {
            reason: reason.into(),
        }
    }

    /// Create a provisioning failed error.
    pub fn provisioning_failed(reason: impl Into<String>) -> Self {
        Self::ProvisioningFailed {
            reason: reason.into(),
        }
    }

    /// Create a status persistence error.
    pub fn status_persistence(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StatusPersistence {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a status conflict error.
    pub fn status_conflict(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StatusConflict {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this error means the record is gone.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}
