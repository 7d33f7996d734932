//! Errors returned by [`CharacterService`](crate::service::CharacterService).

use crate::dice::DiceError;
use crate::store::StoreError;
use crate::validation::ValidationFailed;

/// A service operation failed.
///
/// By the time the caller sees one of these, an `ERROR_OCCURRED` event
/// describing it has already been published.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The prospective character state broke one or more rules.
    #[error(transparent)]
    ValidationFailed(#[from] ValidationFailed),

    /// The store reported an error. Wrapped unchanged.
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),

    /// A roll could not be built.
    #[error("invalid roll: {0}")]
    InvalidRoll(#[from] DiceError),
}

impl ServiceError {
    /// The underlying store error, if that is what failed.
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::StoreFailure(err) => Some(err),
            Self::ValidationFailed(_) | Self::InvalidRoll(_) => None,
        }
    }

    /// The validation failure, if that is what failed.
    pub const fn validation(&self) -> Option<&ValidationFailed> {
        match self {
            Self::ValidationFailed(err) => Some(err),
            Self::StoreFailure(_) | Self::InvalidRoll(_) => None,
        }
    }
}
