//! Component lifecycle hosting for Warden (Layer 3).
//!
//! `warden_host` is a minimal host for components that own scoped services:
//!
//! - [`component`] - The [`Component`](component::Component) lifecycle trait and
//!   [`OwningComponent`](component::OwningComponent), which renders from a
//!   service held by a [`ScopeOwner`](warden_owner::owner::ScopeOwner)
//! - [`host`] - [`Host`](host::Host): keyed mount, render, unmount, and
//!   reconciliation
//! - [`tracing_setup`] - [`TracingConfig`](tracing_setup::TracingConfig) for
//!   installing a subscriber
//!
//! # Example
//!
//! ```
//! use warden_container::container::Container;
//! use warden_host::prelude::*;
//!
//! struct Clock { now: &'static str }
//!
//! let container = Container::new();
//! container.add_scoped(|_| Clock { now: "12:00" });
//!
//! let mut host = Host::new(container);
//! host.replace(["header"], |_| OwningComponent::new(|clock: &Clock| clock.now.to_string()))
//!     .unwrap();
//!
//! assert_eq!(host.render_all().unwrap(), vec!["12:00"]);
//! host.shutdown().unwrap();
//! ```

/// Mountable components.
pub mod component;

/// The component host.
pub mod host;

/// Tracing subscriber setup.
pub mod tracing_setup;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::component::*;
    pub use crate::host::*;
    pub use crate::tracing_setup::*;
}
