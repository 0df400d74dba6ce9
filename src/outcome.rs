//! Settlement outcome records.
//!
//! [`SettledOutcome`] is the status-tagged record that
//! [`all_settled`](crate::combinator::all_settled) fulfills with: one entry
//! per input, in input order, each tagged as fulfilled (with the value) or
//! rejected (with the reason).
//!
//! Records serialize with a `status` tag so snapshots read the way the
//! settlement is described:
//!
//! ```json
//! { "status": "fulfilled", "value": 1 }
//! { "status": "rejected", "reason": { "Error": "boom" } }
//! ```

use crate::error::Rejection;
use serde::{Deserialize, Serialize};

/// The recorded outcome of one settled promise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SettledOutcome<T, E> {
    /// The promise fulfilled with a value.
    Fulfilled {
        /// The fulfillment value.
        value: T,
    },
    /// The promise rejected with a reason.
    Rejected {
        /// The rejection reason.
        reason: Rejection<E>,
    },
}

impl<T, E> SettledOutcome<T, E> {
    /// Wraps a fulfillment value.
    #[must_use]
    pub const fn fulfilled(value: T) -> Self {
        Self::Fulfilled { value }
    }

    /// Wraps a rejection reason.
    #[must_use]
    pub const fn rejected(reason: Rejection<E>) -> Self {
        Self::Rejected { reason }
    }

    /// Returns true if this records a fulfillment.
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    /// Returns true if this records a rejection.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns the fulfillment value, if any.
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled { value } => Some(value),
            Self::Rejected { .. } => None,
        }
    }

    /// Returns the rejection reason, if any.
    pub const fn reason(&self) -> Option<&Rejection<E>> {
        match self {
            Self::Fulfilled { .. } => None,
            Self::Rejected { reason } => Some(reason),
        }
    }

    /// Converts the record into a standard `Result`.
    pub fn into_result(self) -> Result<T, Rejection<E>> {
        match self {
            Self::Fulfilled { value } => Ok(value),
            Self::Rejected { reason } => Err(reason),
        }
    }
}
