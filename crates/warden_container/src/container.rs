//! The resolution container.
//!
//! [`Container`] is a registry of service factories. It hands out
//! [`ContainerScope`]s, and every service resolved through a scope's
//! [`ServiceProvider`] is owned by that scope.
//!
//! # Ownership Model
//!
//! ```text
//! Container (registrations, singletons)
//!    │
//!    ├── root ServiceProvider        (singletons, transients)
//!    │
//!    └── ContainerScope #1           (scoped instances, releasables)
//!           │
//!           └── ServiceProvider      (cheap handle, cloneable)
//! ```
//!
//! Releasing a scope releases every [`Release`] service it created, newest
//! first. Shutting the container down does the same for singletons.
//!
//! # Thread Safety
//!
//! Each instance cache is a `ReentrantMutex<RefCell<..>>`. Threads racing to
//! construct the same scoped or singleton service serialize on the mutex and
//! the loser observes the winner's instance. The mutex is re-entrant so a
//! factory can resolve its own dependencies through the provider it is
//! handed; the `RefCell` is never borrowed across a factory call.

use crate::api::{BoxError, Release, ResolutionContext, ResolutionScope, ScopeFactory};
use crate::error::{ContainerError, ReleaseErrors, ReleaseFailure, ResolveError};
use crate::service::{BoxedService, Lifetime, Registration, ServiceId};
use core::cell::RefCell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use hashbrown::HashMap;
use parking_lot::{ReentrantMutex, RwLock};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Instance storage
// ─────────────────────────────────────────────────────────────────────────────

/// A releasable instance and the name it was registered under.
type Tracked = (&'static str, Arc<dyn Release>);

/// Instances owned by one scope, or by the container for singletons.
#[derive(Default)]
struct Instances {
    /// Memoized scoped or singleton instances.
    cached: HashMap<ServiceId, BoxedService>,
    /// Instances to release, in creation order.
    releasables: Vec<Tracked>,
}

impl Instances {
    fn track(&mut self, registration: &Registration, service: &BoxedService) {
        if let Some(release) = registration.release_view(service) {
            self.releasables.push((registration.type_name, release));
        }
    }

    fn drain(&mut self) -> Vec<Tracked> {
        self.cached.clear();
        core::mem::take(&mut self.releasables)
    }
}

type InstanceCell = ReentrantMutex<RefCell<Instances>>;

fn new_cell() -> InstanceCell {
    ReentrantMutex::new(RefCell::new(Instances::default()))
}

/// Releases tracked instances newest first, continuing past failures.
fn release_all(releasables: Vec<Tracked>) -> Result<(), ReleaseErrors> {
    let failures: Vec<ReleaseFailure> = releasables
        .into_iter()
        .rev()
        .filter_map(|(service, release)| {
            let source = release.release().err()?;
            tracing::warn!(service, error = %source, "service release failed");
            Some(ReleaseFailure { service, source })
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ReleaseErrors { failures })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Container
// ─────────────────────────────────────────────────────────────────────────────

struct ContainerInner {
    registry: RwLock<HashMap<ServiceId, Arc<Registration>>>,
    singletons: InstanceCell,
    next_scope_id: AtomicU64,
    shut_down: AtomicBool,
}

impl ContainerInner {
    fn registration(&self, id: ServiceId) -> Option<Arc<Registration>> {
        self.registry.read().get(&id).cloned()
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

/// A thread-safe registry of service factories that creates resolution scopes.
///
/// `Container` is a cheap, cloneable handle; clones share registrations,
/// singletons, and shutdown state. Services may be registered at any time,
/// including after scopes have been created. A registration only affects
/// instances that have not been constructed yet.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use warden_container::container::Container;
/// use warden_container::error::ResolveError;
/// use warden_container::service::Lifetime;
///
/// struct Config { url: String }
/// struct Repository { config: Arc<Config> }
///
/// let container = Container::new();
/// container
///     .add_singleton(|_| Config { url: "db://local".into() })
///     .try_add(Lifetime::Scoped, |provider| {
///         Ok::<_, ResolveError>(Repository { config: provider.resolve::<Config>()? })
///     });
///
/// let scope = container.create_scope().unwrap();
/// let repository = scope.provider().resolve::<Repository>().unwrap();
/// assert_eq!(repository.config.url, "db://local");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Container {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("registrations", &self.inner.registry.read().len())
            .field("shut_down", &self.inner.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(HashMap::new()),
                singletons: new_cell(),
                next_scope_id: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a singleton service built by an infallible factory.
    ///
    /// The factory receives the root provider, so it cannot depend on scoped
    /// services.
    pub fn add_singleton<T, F>(&self, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> T + Send + Sync + 'static,
    {
        self.try_add(Lifetime::Singleton, move |provider| {
            Ok::<_, Infallible>(factory(provider))
        })
    }

    /// Registers a scoped service built by an infallible factory.
    pub fn add_scoped<T, F>(&self, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> T + Send + Sync + 'static,
    {
        self.try_add(Lifetime::Scoped, move |provider| {
            Ok::<_, Infallible>(factory(provider))
        })
    }

    /// Registers a transient service built by an infallible factory.
    pub fn add_transient<T, F>(&self, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> T + Send + Sync + 'static,
    {
        self.try_add(Lifetime::Transient, move |provider| {
            Ok::<_, Infallible>(factory(provider))
        })
    }

    /// Registers a service built by a fallible factory.
    ///
    /// A factory error surfaces from
    /// [`ServiceProvider::resolve`] as [`ResolveError::Construction`] and
    /// is never cached, so a later resolve runs the factory again.
    pub fn try_add<T, F, E>(&self, lifetime: Lifetime, factory: F) -> &Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.register(Registration::new(lifetime, factory))
    }

    /// Registers a service that must be released with whatever owns it.
    ///
    /// Scoped and transient instances resolved through a scope are released
    /// when that scope is released. Singletons, and transients resolved from
    /// the root provider, are released by [`shutdown`](Self::shutdown).
    pub fn add_releasable<T, F, E>(&self, lifetime: Lifetime, factory: F) -> &Self
    where
        T: Release,
        F: Fn(&ServiceProvider) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.register(Registration::releasable(lifetime, factory))
    }

    /// Registers an existing instance as a singleton.
    ///
    /// The container does not release instances it did not construct.
    pub fn insert_singleton<T: Send + Sync + 'static>(&self, service: T) -> &Self {
        self.register(Registration::instance(Arc::new(service)))
    }

    /// Removes the registration for `T`.
    ///
    /// Returns `true` if a registration existed. Instances already
    /// constructed stay with their owners.
    pub fn remove<T: 'static>(&self) -> bool {
        self.inner
            .registry
            .write()
            .remove(&ServiceId::of::<T>())
            .is_some()
    }

    /// Returns `true` if `T` is registered.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.inner
            .registry
            .read()
            .contains_key(&ServiceId::of::<T>())
    }

    /// Returns the lifetime `T` is registered with, if any.
    #[must_use]
    pub fn lifetime_of<T: 'static>(&self) -> Option<Lifetime> {
        self.inner
            .registration(ServiceId::of::<T>())
            .map(|registration| registration.lifetime)
    }

    fn register(&self, registration: Registration) -> &Self {
        let service = registration.type_name;
        let lifetime = registration.lifetime;
        let replaced = self
            .inner
            .registry
            .write()
            .insert(registration.id, Arc::new(registration))
            .is_some();

        tracing::debug!(service, ?lifetime, replaced, "service registered");
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scopes
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a new resolution scope.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn create_scope(&self) -> Result<ContainerScope, ContainerError> {
        if self.inner.is_shut_down() {
            return Err(ContainerError::ShutDown);
        }

        let id = self.inner.next_scope_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(scope = id, "scope created");

        Ok(ContainerScope {
            inner: Arc::new(ScopeInner {
                id,
                instances: new_cell(),
                released: AtomicBool::new(false),
            }),
            container: Arc::clone(&self.inner),
        })
    }

    /// Returns the root provider.
    ///
    /// The root provider resolves singletons and transients. Transient
    /// releasables resolved here are owned by the container.
    #[must_use]
    pub fn provider(&self) -> ServiceProvider {
        ServiceProvider {
            container: Arc::clone(&self.inner),
            scope: None,
            path: Vec::new(),
        }
    }

    /// Shuts the container down, releasing singletons newest first.
    ///
    /// After shutdown no scopes can be created and every provider fails to
    /// resolve. Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseErrors`] listing every singleton that failed to release.
    pub fn shutdown(&self) -> Result<(), ReleaseErrors> {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let releasables = self.inner.singletons.lock().borrow_mut().drain();
        tracing::debug!(releasables = releasables.len(), "container shut down");
        release_all(releasables)
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope
// ─────────────────────────────────────────────────────────────────────────────

struct ScopeInner {
    id: u64,
    instances: InstanceCell,
    released: AtomicBool,
}

impl ScopeInner {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn release(&self) -> Result<(), ReleaseErrors> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.release_instances()
    }

    fn release_instances(&self) -> Result<(), ReleaseErrors> {
        let releasables = self.instances.lock().borrow_mut().drain();
        tracing::debug!(
            scope = self.id,
            releasables = releasables.len(),
            "scope released"
        );
        release_all(releasables)
    }
}

/// A resolution scope created by [`Container::create_scope`].
///
/// The scope owns every scoped instance resolved through it, plus every
/// releasable transient. [`release`](Self::release) consumes the handle;
/// dropping an unreleased scope releases it and logs any failure.
pub struct ContainerScope {
    inner: Arc<ScopeInner>,
    container: Arc<ContainerInner>,
}

impl core::fmt::Debug for ContainerScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContainerScope")
            .field("id", &self.inner.id)
            .field("released", &self.inner.is_released())
            .finish_non_exhaustive()
    }
}

impl ContainerScope {
    /// Returns this scope's identifier, unique within its container.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns a provider that resolves services into this scope.
    #[must_use]
    pub fn provider(&self) -> ServiceProvider {
        ServiceProvider {
            container: Arc::clone(&self.container),
            scope: Some(Arc::clone(&self.inner)),
            path: Vec::new(),
        }
    }

    /// Releases the scope and every releasable service it created.
    ///
    /// Services are released newest first. Providers obtained from this
    /// scope fail with [`ResolveError::ScopeReleased`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseErrors`] if any service failed to release. Every
    /// other service is still released.
    pub fn release(self) -> Result<(), ReleaseErrors> {
        self.inner.release()
    }
}

impl Drop for ContainerScope {
    fn drop(&mut self) {
        if let Err(err) = self.inner.release() {
            tracing::warn!(scope = self.inner.id, error = %err, "scope dropped with release failures");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceProvider
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves services, either from a scope or from the container root.
///
/// Providers are cheap to clone; clones of a scope's provider all resolve
/// into the same scope. Factories receive a provider that also carries the
/// current resolution path, which is how dependency cycles are detected.
#[derive(Clone)]
pub struct ServiceProvider {
    container: Arc<ContainerInner>,
    scope: Option<Arc<ScopeInner>>,
    /// Services under construction on this resolution path, outermost first.
    path: Vec<(ServiceId, &'static str)>,
}

impl core::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("scope", &self.scope_id())
            .field("depth", &self.path.len())
            .finish_non_exhaustive()
    }
}

impl ServiceProvider {
    /// Resolves a service of type `T`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotRegistered`] if `T` has no registration
    /// - [`ResolveError::Construction`] if the factory failed
    /// - [`ResolveError::Cycle`] if `T` depends on itself
    /// - [`ResolveError::ScopedFromRoot`] if `T` is scoped and this is a root provider
    /// - [`ResolveError::ScopeReleased`] if this provider's scope was released
    /// - [`ResolveError::ShutDown`] if the container was shut down
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        let service = self.resolve_erased(ServiceId::of::<T>(), core::any::type_name::<T>())?;
        Ok(service
            .downcast::<T>()
            .expect("service type mismatch (this is a bug)"))
    }

    /// Returns the identifier of this provider's scope, or `None` for the root.
    #[must_use]
    pub fn scope_id(&self) -> Option<u64> {
        self.scope.as_ref().map(|scope| scope.id)
    }

    /// Returns `true` if both providers resolve into the same scope.
    #[must_use]
    pub fn same_scope(&self, other: &ServiceProvider) -> bool {
        match (&self.scope, &other.scope) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => Arc::ptr_eq(&self.container, &other.container),
            _ => false,
        }
    }

    fn resolve_erased(
        &self,
        id: ServiceId,
        type_name: &'static str,
    ) -> Result<BoxedService, ResolveError> {
        if self.container.is_shut_down() {
            return Err(ResolveError::ShutDown);
        }
        if let Some(scope) = &self.scope
            && scope.is_released()
        {
            return Err(ResolveError::ScopeReleased(scope.id));
        }
        if self.path.iter().any(|(seen, _)| *seen == id) {
            return Err(ResolveError::Cycle {
                service: type_name,
                path: self.describe_path(type_name),
            });
        }

        let registration = self
            .container
            .registration(id)
            .ok_or(ResolveError::NotRegistered(type_name))?;

        match registration.lifetime {
            Lifetime::Singleton => {
                let provider = self.descend(None, &registration);
                let service = cached(&self.container.singletons, &registration, &provider)?;
                self.settle(None)?;
                Ok(service)
            }
            Lifetime::Scoped => {
                let Some(scope) = &self.scope else {
                    return Err(ResolveError::ScopedFromRoot(type_name));
                };
                let provider = self.descend(Some(Arc::clone(scope)), &registration);
                let service = cached(&scope.instances, &registration, &provider)?;
                self.settle(Some(scope))?;
                Ok(service)
            }
            Lifetime::Transient => {
                let provider = self.descend(self.scope.clone(), &registration);
                let service = construct(&registration, &provider)?;
                let owner = self
                    .scope
                    .as_ref()
                    .map_or(&self.container.singletons, |scope| &scope.instances);
                owner.lock().borrow_mut().track(&registration, &service);
                self.settle(self.scope.as_ref())?;
                Ok(service)
            }
        }
    }

    /// Releases instances tracked by an owner that was released while their
    /// factory ran.
    ///
    /// `owner` is the scope the instance was tracked in, or `None` for the
    /// container. The check runs after tracking, so an instance is either
    /// drained by the owner's own release or released here.
    fn settle(&self, owner: Option<&Arc<ScopeInner>>) -> Result<(), ResolveError> {
        match owner {
            Some(scope) if scope.is_released() => {
                if let Err(err) = scope.release_instances() {
                    tracing::warn!(scope = scope.id, error = %err, "late instance release failed");
                }
                Err(ResolveError::ScopeReleased(scope.id))
            }
            None if self.container.is_shut_down() => {
                let releasables = self.container.singletons.lock().borrow_mut().drain();
                if let Err(err) = release_all(releasables) {
                    tracing::warn!(error = %err, "late singleton release failed");
                }
                Err(ResolveError::ShutDown)
            }
            _ => Ok(()),
        }
    }

    /// Returns the provider handed to a factory one level down the path.
    fn descend(&self, scope: Option<Arc<ScopeInner>>, registration: &Registration) -> Self {
        let mut path = self.path.clone();
        path.push((registration.id, registration.type_name));
        Self {
            container: Arc::clone(&self.container),
            scope,
            path,
        }
    }

    fn describe_path(&self, last: &'static str) -> String {
        self.path
            .iter()
            .map(|(_, name)| *name)
            .chain(core::iter::once(last))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

fn construct(
    registration: &Registration,
    provider: &ServiceProvider,
) -> Result<BoxedService, ResolveError> {
    tracing::trace!(
        service = registration.type_name,
        lifetime = ?registration.lifetime,
        scope = ?provider.scope_id(),
        "constructing service"
    );
    registration
        .construct(provider)
        .map_err(|source| ResolveError::Construction {
            service: registration.type_name,
            source,
        })
}

/// Returns the memoized instance, constructing it on first use.
fn cached(
    cell: &InstanceCell,
    registration: &Registration,
    provider: &ServiceProvider,
) -> Result<BoxedService, ResolveError> {
    let guard = cell.lock();
    if let Some(service) = guard.borrow().cached.get(&registration.id) {
        return Ok(Arc::clone(service));
    }

    let service = construct(registration, provider)?;

    let mut instances = guard.borrow_mut();
    instances.track(registration, &service);
    Ok(Arc::clone(
        instances
            .cached
            .entry(registration.id)
            .or_insert(service),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Interface implementations
// ─────────────────────────────────────────────────────────────────────────────

impl ScopeFactory for Container {
    type Scope = ContainerScope;
    type Error = ContainerError;

    fn create_scope(&self) -> Result<ContainerScope, ContainerError> {
        Container::create_scope(self)
    }
}

impl ResolutionScope for ContainerScope {
    type Context = ServiceProvider;
    type ReleaseError = ReleaseErrors;

    fn context(&self) -> ServiceProvider {
        self.provider()
    }

    fn release(self) -> Result<(), ReleaseErrors> {
        ContainerScope::release(self)
    }
}

impl ResolutionContext for ServiceProvider {
    type Error = ResolveError;

    fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        ServiceProvider::resolve(self)
    }
}
