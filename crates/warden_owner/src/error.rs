//! Error types for the scope owner.

use warden_container::api::BoxError;

/// Ways a host can call into an owner out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UsageOrder {
    /// `bind_container` was called on an owner that already has a container.
    #[error("a container is already bound to this owner")]
    AlreadyBound,

    /// `bind_container` was called after a scope had been created.
    #[error("a scope has already been created")]
    ScopeAlreadyCreated,

    /// An accessor was re-entered on the same thread while the owner was
    /// still creating its scope or resolving its service.
    #[error("re-entrant access while the scope or service is being created")]
    ReentrantAccess,

    /// The owner was released while a scope or service was being created
    /// for the same call.
    #[error("the owner was released while the scope or service was being created")]
    ReleasedDuringAccess,
}

/// Errors returned by [`ScopeOwner`](crate::owner::ScopeOwner).
///
/// Every error propagates to the caller unchanged; the owner neither logs
/// nor suppresses them.
#[derive(Debug, thiserror::Error)]
pub enum OwnerError {
    /// A service was accessed before a container was bound.
    #[error("services cannot be accessed before the component is initialized")]
    NotInitialized,

    /// The host violated the initialize-before-use contract.
    #[error("usage order violated: {0}")]
    UsageOrder(UsageOrder),

    /// The container failed to create a scope. The owner has no scope
    /// afterwards.
    #[error("failed to create a resolution scope")]
    ScopeCreation(#[source] BoxError),

    /// The scope failed to resolve the service. Failures are never memoized.
    #[error("failed to resolve service {service}")]
    Resolution {
        /// The requested service type.
        service: &'static str,
        /// The resolution context's error.
        #[source]
        source: BoxError,
    },

    /// The owner was released and its reuse policy forbids another segment.
    #[error("the owner has been released")]
    AlreadyReleased,

    /// The scope reported failures while being released. The owner's state
    /// was cleared regardless.
    #[error("the resolution scope reported failures while being released")]
    ScopeRelease(#[source] BoxError),
}

impl OwnerError {
    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Scope creation and resolution failures are not memoized, so a later
    /// call tries again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ScopeCreation(_) | Self::Resolution { .. })
    }
}

impl From<UsageOrder> for OwnerError {
    fn from(order: UsageOrder) -> Self {
        Self::UsageOrder(order)
    }
}
