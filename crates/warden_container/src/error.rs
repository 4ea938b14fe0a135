//! Error types for the resolution container.

use crate::api::BoxError;

/// Error creating a scope.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The container has been shut down and no longer creates scopes.
    #[error("container has been shut down")]
    ShutDown,
}

/// Error resolving a service.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No registration exists for the requested type.
    #[error("service not registered: {0}")]
    NotRegistered(&'static str),

    /// The registered factory failed to construct the service.
    #[error("failed to construct service {service}")]
    Construction {
        /// The service type name.
        service: &'static str,
        /// The factory's error.
        #[source]
        source: BoxError,
    },

    /// The service (transitively) depends on itself.
    #[error("dependency cycle detected while resolving {service}: {path}")]
    Cycle {
        /// The service type that was requested twice.
        service: &'static str,
        /// The resolution path, outermost first.
        path: String,
    },

    /// A scoped service was requested from a provider with no scope, such
    /// as the provider handed to a singleton factory.
    #[error("scoped service {0} cannot be resolved from the root provider")]
    ScopedFromRoot(&'static str),

    /// The scope this provider belongs to has been released.
    #[error("scope {0} has been released")]
    ScopeReleased(u64),

    /// The container has been shut down.
    #[error("container has been shut down")]
    ShutDown,
}

/// A single service that failed to release.
#[derive(Debug, thiserror::Error)]
#[error("failed to release service {service}")]
pub struct ReleaseFailure {
    /// The service type name.
    pub service: &'static str,
    /// The error returned by [`Release::release`](crate::api::Release::release).
    #[source]
    pub source: BoxError,
}

/// Every release failure reported while releasing a scope or container.
///
/// Release continues past individual failures, so this collects all of them.
#[derive(Debug, thiserror::Error)]
#[error("{} service(s) failed to release: {}", .failures.len(), service_names(.failures))]
pub struct ReleaseErrors {
    /// The individual failures, in release order.
    pub failures: Vec<ReleaseFailure>,
}

impl ReleaseErrors {
    /// Returns the names of the services that failed to release.
    #[must_use]
    pub fn services(&self) -> Vec<&'static str> {
        self.failures.iter().map(|failure| failure.service).collect()
    }
}

fn service_names(failures: &[ReleaseFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.service)
        .collect::<Vec<_>>()
        .join(", ")
}
