//! Interfaces between a scope owner and the resolution container it uses.
//!
//! A scope owner never talks to a concrete container. It is generic over
//! three small traits, each covering one step of the lifecycle:
//!
//! | Trait | Step | Failure |
//! |-------|------|---------|
//! | [`ScopeFactory`] | create a scope | [`ScopeFactory::Error`] |
//! | [`ResolutionScope`] | expose a context, release once | [`ResolutionScope::ReleaseError`] |
//! | [`ResolutionContext`] | resolve a typed service | [`ResolutionContext::Error`] |
//!
//! [`Container`](crate::container::Container) implements all three, but tests
//! and hosts can supply their own implementations.
//!
//! # Release Is Consuming
//!
//! [`ResolutionScope::release`] takes the scope by value. A scope handle can
//! therefore be released at most once, and the compiler rejects any use of the
//! handle afterwards.
//!
//! ```compile_fail
//! use warden_container::api::ResolutionScope;
//! use warden_container::container::Container;
//!
//! let container = Container::new();
//! let scope = container.create_scope().unwrap();
//! ResolutionScope::release(scope).unwrap();
//! ResolutionScope::release(scope).unwrap(); // use of moved value
//! ```

use std::sync::Arc;

/// Boxed error used wherever a collaborator's concrete error type is erased.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Creates resolution scopes.
///
/// This is the only capability a scope owner needs from a container. The
/// container is shared, read-only state from the owner's point of view.
pub trait ScopeFactory: Send + Sync + 'static {
    /// The scope handle produced by this factory.
    type Scope: ResolutionScope;

    /// The error returned when a scope cannot be created.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Creates a new, empty resolution scope.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the factory cannot create scopes (for
    /// example, because it has been shut down).
    fn create_scope(&self) -> Result<Self::Scope, Self::Error>;
}

/// A releasable resolution scope.
///
/// Every service resolved through a scope's [`context`](Self::context) is
/// owned by that scope and released with it.
pub trait ResolutionScope: Send + 'static {
    /// The resolution context exposed by this scope.
    type Context: ResolutionContext;

    /// The error returned when releasing the scope reports failures.
    type ReleaseError: core::error::Error + Send + Sync + 'static;

    /// Returns a handle for resolving services from this scope.
    ///
    /// Handles returned by repeated calls refer to the same scope.
    fn context(&self) -> Self::Context;

    /// Releases the scope and, transitively, every service resolved from it.
    ///
    /// # Errors
    ///
    /// Returns [`Self::ReleaseError`] if one or more services failed to
    /// release. The scope is considered released either way.
    fn release(self) -> Result<(), Self::ReleaseError>;
}

/// Resolves typed services from a scope.
pub trait ResolutionContext: Clone + Send + Sync + 'static {
    /// The error returned when a service cannot be resolved.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Resolves a service of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if `T` is not registered or its construction
    /// fails.
    fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Self::Error>;
}

/// A service that holds something requiring explicit release.
///
/// Services registered through
/// [`Container::add_releasable`](crate::container::Container::add_releasable)
/// are tracked by the scope (or container) that created them and released
/// when it is released, in reverse creation order.
///
/// # Example
///
/// ```
/// use core::sync::atomic::{AtomicBool, Ordering};
/// use warden_container::api::{BoxError, Release};
///
/// struct Connection { open: AtomicBool }
///
/// impl Release for Connection {
///     fn release(&self) -> Result<(), BoxError> {
///         self.open.store(false, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
pub trait Release: Send + Sync + 'static {
    /// Releases whatever this service holds.
    ///
    /// Called at most once per instance by the owning scope or container.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown failed. The failure is reported to the
    /// caller of the scope's release, and the remaining services are still
    /// released.
    fn release(&self) -> Result<(), BoxError>;
}
