//! Error types and the rejection-reason model.
//!
//! A promise never fails by raising: every failure is captured at the
//! boundary where it occurs and becomes a [`Rejection`] of the nearest
//! enclosing promise. The reason type carries application reasons alongside
//! the two failure classes the engine itself can produce:
//!
//! - `Error(E)`: application-level reason, supplied through a
//!   [`Settler`](crate::promise::Settler) or returned by a handler
//! - `Cycle`: a promise was asked to adopt itself
//! - `Panicked(PanicPayload)`: a caught unwind from an initializer, a
//!   chained handler, or a foreign thenable
//!
//! Nothing is retried automatically; retry, if desired, is the caller's
//! responsibility by constructing a new promise.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Payload from a caught panic.
///
/// This wraps the panic value for safe transport across scheduling turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicPayload {
    message: String,
}

impl PanicPayload {
    /// Creates a new panic payload with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Extracts a payload from the value returned by `catch_unwind`.
    ///
    /// Panic values are almost always `&str` or `String`; anything else is
    /// reported as an unknown panic.
    #[must_use]
    pub fn from_unwind(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self { message }
    }

    /// Returns the panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

/// The reason a promise was rejected.
///
/// Application reasons and engine-generated failures flow through the same
/// channel so that observers see a single, uniform reason type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection<E> {
    /// Application-level rejection reason.
    Error(E),
    /// The promise was resolved with itself (circular resolution).
    Cycle,
    /// A callback the engine invoked panicked; the unwind was caught.
    Panicked(PanicPayload),
}

impl<E> Rejection<E> {
    /// Returns true if this is an application-level reason.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns true if this is a circular-resolution rejection.
    #[must_use]
    pub const fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle)
    }

    /// Returns true if this rejection came from a caught panic.
    #[must_use]
    pub const fn is_panicked(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Returns the application reason, if that is what this is.
    pub fn into_error(self) -> Option<E> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the application reason, leaving engine-generated reasons intact.
    pub fn map_error<F, G: FnOnce(E) -> F>(self, f: G) -> Rejection<F> {
        match self {
            Self::Error(e) => Rejection::Error(f(e)),
            Self::Cycle => Rejection::Cycle,
            Self::Panicked(p) => Rejection::Panicked(p),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Rejection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Cycle => write!(f, "promise resolved with itself"),
            Self::Panicked(p) => write!(f, "{p}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Rejection<E> {}

/// Aggregate of every input's rejection reason, produced by
/// [`any`](crate::combinator::any) when no input fulfills.
///
/// Reasons are held in input order, regardless of the order in which the
/// inputs settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateError<E> {
    reasons: Vec<Rejection<E>>,
}

impl<E> AggregateError<E> {
    /// Creates an aggregate from reasons in input order.
    #[must_use]
    pub fn new(reasons: Vec<Rejection<E>>) -> Self {
        Self { reasons }
    }

    /// Returns the reasons in input order.
    #[must_use]
    pub fn reasons(&self) -> &[Rejection<E>] {
        &self.reasons
    }

    /// Consumes the aggregate, yielding the reasons in input order.
    #[must_use]
    pub fn into_reasons(self) -> Vec<Rejection<E>> {
        self.reasons
    }

    /// Returns the number of collected reasons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// Returns true if there are no reasons (every-input-rejected over an
    /// empty input sequence).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all promises were rejected ({} reasons)",
            self.reasons.len()
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for AggregateError<E> {}
