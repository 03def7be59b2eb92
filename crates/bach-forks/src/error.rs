//! Fork table errors

use crate::{Fork, Param};
use thiserror::Error;

/// Fork lookup and table construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForkError {
    /// Parameter has no definition at or before the fork
    #[error("{param} is not active at {fork}")]
    FeatureNotActive {
        /// Fork that was queried
        fork: Fork,
        /// Parameter that was queried
        param: Param,
    },

    /// Fork name not recognized
    #[error("unknown fork: {0}")]
    UnknownFork(String),

    /// Validity range ends at or before it starts
    #[error("empty fork range: {from} until {until}")]
    EmptyRange {
        /// Inclusive start
        from: Fork,
        /// Exclusive end
        until: Fork,
    },
}

/// Result type for fork operations
pub type ForkResult<T> = Result<T, ForkError>;
