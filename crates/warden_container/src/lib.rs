//! The resolution container layer for Warden (Layer 1).
//!
//! `warden_container` provides the collaborator side of scoped ownership:
//!
//! - [`api`] - Interfaces a scope owner consumes ([`ScopeFactory`](api::ScopeFactory),
//!   [`ResolutionScope`](api::ResolutionScope), [`ResolutionContext`](api::ResolutionContext))
//!   and the [`Release`](api::Release) capability for services that need explicit teardown
//! - [`service`] - Service identity and lifetimes
//! - [`container`] - A thread-safe [`Container`](container::Container) with singleton,
//!   scoped, and transient registrations and cascading scope release
//! - [`error`] - Error types for scope creation, resolution, and release
//!
//! # Architecture
//!
//! - **Layer 1** (`warden_container`): resolution container and interfaces (this crate)
//! - **Layer 2** (`warden_owner`): the scope owner
//! - **Layer 3** (`warden_host`): component lifecycle host and tracing setup
//!
//! # Example
//!
//! ```
//! use warden_container::container::Container;
//!
//! struct Repository { name: String }
//!
//! let container = Container::new();
//! container.add_scoped(|_| Repository { name: "orders".into() });
//!
//! let scope = container.create_scope().unwrap();
//! let first = scope.provider().resolve::<Repository>().unwrap();
//! let second = scope.provider().resolve::<Repository>().unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first, &second));
//! assert_eq!(first.name, "orders");
//!
//! scope.release().unwrap();
//! ```

/// Interfaces consumed by scope owners.
pub mod api;

/// The concrete resolution container.
pub mod container;

/// Error types.
pub mod error;

/// Service identity and lifetimes.
pub mod service;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::api::*;
    pub use crate::container::*;
    pub use crate::error::*;
    pub use crate::service::*;
}
