//! Error and result types for dispatcher setup and request routing.

use thiserror::Error;

use crate::message::{RoutingKey, STATUS_INTERNAL_ERROR, STATUS_NOT_FOUND};

/// Errors raised while configuring or driving a [`Dispatcher`](crate::Dispatcher).
///
/// `DuplicateRoute` only occurs while routes are being registered and should
/// abort startup. `RouteNotFound` is a per-call outcome and never reaches a
/// handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DispatchError {
    /// A handler for this key was already registered.
    #[error("route {0} was already registered")]
    DuplicateRoute(RoutingKey),
    /// No handler is registered for this key.
    #[error("route {0} not found")]
    RouteNotFound(RoutingKey),
}

impl DispatchError {
    /// Status code reported to remote callers for this error.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::RouteNotFound(_) => STATUS_NOT_FOUND,
            Self::DuplicateRoute(_) => STATUS_INTERNAL_ERROR,
        }
    }
}

/// Result type used by the dispatcher API.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DispatchError::RouteNotFound(RoutingKey::new("a", "b")), STATUS_NOT_FOUND)]
    #[case(DispatchError::DuplicateRoute(RoutingKey::new("a", "b")), STATUS_INTERNAL_ERROR)]
    fn errors_map_to_named_statuses(#[case] err: DispatchError, #[case] expected: i32) {
        assert_eq!(err.status_code(), expected);
    }
}
