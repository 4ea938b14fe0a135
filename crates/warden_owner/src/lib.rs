//! Scoped service ownership for Warden (Layer 2).
//!
//! `warden_owner` ties one resolution scope, and one service resolved from it,
//! to the lifetime of a single UI component instance:
//!
//! - [`owner`] - [`ScopeOwner`](owner::ScopeOwner): lazy scope creation,
//!   a memoized service, and exactly-once release per lifecycle segment
//! - [`cache`] - [`ResourceCache`](cache::ResourceCache), the memoization slot
//! - [`error`] - [`OwnerError`](error::OwnerError) and [`UsageOrder`](error::UsageOrder)
//!
//! The owner talks to its container only through the interfaces in
//! [`warden_container::api`], so any [`ScopeFactory`](warden_container::api::ScopeFactory)
//! can back it.
//!
//! # Example
//!
//! ```
//! use warden_container::container::Container;
//! use warden_owner::prelude::*;
//!
//! struct Repository { table: &'static str }
//!
//! let container = Container::new();
//! container.add_scoped(|_| Repository { table: "orders" });
//!
//! let owner = ScopeOwner::<Container, Repository>::new();
//! assert!(matches!(owner.service(), Err(OwnerError::NotInitialized)));
//!
//! owner.bind_container(container).unwrap();
//! assert_eq!(owner.service().unwrap().table, "orders");
//!
//! owner.release().unwrap();
//! assert!(owner.is_released());
//! ```

/// The memoization slot.
pub mod cache;

/// Error types.
pub mod error;

/// The scope owner.
pub mod owner;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::cache::*;
    pub use crate::error::*;
    pub use crate::owner::*;
}
