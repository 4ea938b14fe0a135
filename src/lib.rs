//! Scoped service ownership for UI components.
//!
//! A component that owns a [`ScopeOwner`](warden_owner::owner::ScopeOwner)
//! gets its own resolution scope, created on first use, and one memoized
//! service resolved from it. Tearing the component down releases the scope
//! exactly once.
//!
//! ```
//! use warden::prelude::*;
//!
//! struct Cart { items: usize }
//!
//! let container = Container::new();
//! container.add_scoped(|_| Cart { items: 0 });
//!
//! let owner = ScopeOwner::<Container, Cart>::new();
//! owner.bind_container(container).unwrap();
//! assert_eq!(owner.service().unwrap().items, 0);
//! owner.release().unwrap();
//! ```

pub use warden_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use warden_internal::prelude::*;
}
