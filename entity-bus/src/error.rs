use thiserror::Error;

use crate::hub::SubscriptionToken;

/// Errors raised at the source-system boundary
#[derive(Error, Debug)]
pub enum BusError {
    /// Token was never issued or has already been released
    #[error("Subscription {0} not found")]
    SubscriptionNotFound(SubscriptionToken),

    /// The source system refused or failed a service call
    #[error("Service call {call} rejected: {reason}")]
    CallRejected { call: String, reason: String },

    /// Internal lock poisoned
    #[error("Internal lock poisoned")]
    LockPoisoned,
}

/// Result type for entity bus operations
pub type Result<T> = std::result::Result<T, BusError>;
