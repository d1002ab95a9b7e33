//! Error types for effect operations

use thiserror::Error;

use super::OwnerId;
use crate::storage::StorageError;

/// Errors returned by [`EffectStackManager`](super::EffectStackManager).
///
/// Every variant is raised before any state changes.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("target value must be a finite number, got {0}")]
    InvalidValue(f64),

    #[error("effect duration must be greater than zero")]
    InvalidDuration,

    #[error("owner {0} is not connected")]
    OwnerOffline(OwnerId),

    #[error("execution context for owner {0} dropped the request")]
    ContextClosed(OwnerId),

    #[error("failed to load effects for owner {owner}")]
    Load {
        owner: OwnerId,
        #[source]
        source: StorageError,
    },
}
