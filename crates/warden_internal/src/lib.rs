//! # Warden Internal Library
//!
//! Re-exports the core Warden crates for convenience.

/// Layer 1: Resolution container and scope interfaces.
pub use warden_container;

/// Layer 2: Scoped service ownership.
pub use warden_owner;

/// Layer 3: Component lifecycle host.
pub use warden_host;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use warden_container::prelude::*;
    pub use warden_host::prelude::*;
    pub use warden_owner::prelude::*;
}
