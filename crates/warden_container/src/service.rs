//! Service identity, lifetimes, and registrations.
//!
//! A service is any `Send + Sync + 'static` type. Services are keyed by
//! [`ServiceId`] and stored type-erased as [`BoxedService`]; the container
//! downcasts them back to `Arc<T>` on resolution.
//!
//! # Lifetimes
//!
//! | Lifetime | Instances | Constructed with | Released by |
//! |----------|-----------|------------------|-------------|
//! | [`Lifetime::Singleton`] | one per container | root provider | container shutdown |
//! | [`Lifetime::Scoped`] | one per scope | scope provider | scope release |
//! | [`Lifetime::Transient`] | one per resolve | requesting provider | requesting scope (or container) |

use crate::api::{BoxError, Release};
use crate::container::ServiceProvider;
use core::any::{Any, TypeId};
use std::sync::Arc;

/// Type-erased, shared service instance.
pub type BoxedService = Arc<dyn Any + Send + Sync>;

/// Factory that constructs a type-erased service.
pub(crate) type Factory =
    Box<dyn Fn(&ServiceProvider) -> Result<BoxedService, BoxError> + Send + Sync>;

/// Recovers the [`Release`] view of a type-erased service.
pub(crate) type Releaser = fn(&BoxedService) -> Option<Arc<dyn Release>>;

/// Unique identifier for a service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(TypeId);

impl ServiceId {
    /// Creates a `ServiceId` for the given type.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self(TypeId::of::<T>())
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.0
    }
}

/// How long a resolved service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance for the whole container.
    Singleton,
    /// One instance per scope.
    Scoped,
    /// A new instance on every resolve.
    Transient,
}

/// A registered service: its lifetime, factory, and release hook.
pub(crate) struct Registration {
    pub(crate) id: ServiceId,
    pub(crate) type_name: &'static str,
    pub(crate) lifetime: Lifetime,
    factory: Factory,
    releaser: Option<Releaser>,
}

impl Registration {
    /// Creates a registration for a service that needs no release.
    pub(crate) fn new<T, F, E>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            id: ServiceId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            lifetime,
            factory: Box::new(move |provider: &ServiceProvider| {
                factory(provider)
                    .map(|service| Arc::new(service) as BoxedService)
                    .map_err(Into::into)
            }),
            releaser: None,
        }
    }

    /// Creates a registration whose instances are released with their owner.
    pub(crate) fn releasable<T, F, E>(lifetime: Lifetime, factory: F) -> Self
    where
        T: Release,
        F: Fn(&ServiceProvider) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            releaser: Some(release_view::<T>),
            ..Self::new(lifetime, factory)
        }
    }

    /// Creates a singleton registration around an existing instance.
    pub(crate) fn instance<T: Send + Sync + 'static>(service: Arc<T>) -> Self {
        Self {
            id: ServiceId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            lifetime: Lifetime::Singleton,
            factory: Box::new(move |_: &ServiceProvider| Ok(Arc::clone(&service) as BoxedService)),
            releaser: None,
        }
    }

    /// Runs the factory.
    pub(crate) fn construct(&self, provider: &ServiceProvider) -> Result<BoxedService, BoxError> {
        (self.factory)(provider)
    }

    /// Returns the [`Release`] view of an instance, if this registration
    /// tracks releases.
    pub(crate) fn release_view(&self, service: &BoxedService) -> Option<Arc<dyn Release>> {
        self.releaser.and_then(|view| view(service))
    }
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("type_name", &self.type_name)
            .field("lifetime", &self.lifetime)
            .field("releasable", &self.releaser.is_some())
            .finish()
    }
}

fn release_view<T: Release>(service: &BoxedService) -> Option<Arc<dyn Release>> {
    Arc::clone(service)
        .downcast::<T>()
        .ok()
        .map(|service| service as Arc<dyn Release>)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    struct Handle;

    impl Release for Handle {
        fn release(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn service_id_type_id_method() {
        let id = ServiceId::of::<Counter>();
        assert_eq!(id.type_id(), TypeId::of::<Counter>());
        assert_ne!(id, ServiceId::of::<Handle>());
    }

    #[test]
    fn plain_registration_has_no_release_view() {
        let registration =
            Registration::new(Lifetime::Scoped, |_| Ok::<_, BoxError>(Counter));
        let service: BoxedService = Arc::new(Counter);

        assert_eq!(registration.id, ServiceId::of::<Counter>());
        assert!(registration.release_view(&service).is_none());
    }

    #[test]
    fn releasable_registration_recovers_release_view() {
        let registration =
            Registration::releasable(Lifetime::Transient, |_| Ok::<_, BoxError>(Handle));
        let service: BoxedService = Arc::new(Handle);

        assert_eq!(registration.lifetime, Lifetime::Transient);
        assert!(registration.release_view(&service).is_some());
    }
}
