//! The scope owner.
//!
//! A [`ScopeOwner`] binds one resolution scope, and one service resolved from
//! it, to the lifetime of a single component instance.
//!
//! # Lifecycle
//!
//! ```text
//!            bind_container           first access            release
//! Unbound ─────────────────▶ Live ──────────────────▶ Live ───────────▶ Released
//!                             (no scope)          (scope, service)        │
//!                               ▲                                          │
//!                               └──── next access (ReusePolicy::Reenter) ──┘
//! ```
//!
//! - The scope is created on first access and at most once per segment.
//! - The service is resolved on first [`service`](ScopeOwner::service) call
//!   and memoized; failures are never memoized.
//! - [`release`](ScopeOwner::release) clears the owner's state, releases the
//!   scope exactly once, then runs the [`OnRelease`] hook.
//!
//! # Thread Safety
//!
//! All state sits behind one `ReentrantMutex`. A thread that loses a race on
//! first access blocks until the winner finishes and then observes the
//! winner's scope and service. A call that re-enters the owner on the same
//! thread while it is still creating the scope or resolving the service
//! fails with [`UsageOrder::ReentrantAccess`] instead of creating a second one.

use crate::cache::{Completion, ResourceCache};
use crate::error::{OwnerError, UsageOrder};
use core::any::type_name;
use core::cell::RefCell;
use core::marker::PhantomData;
use parking_lot::ReentrantMutex;
use std::sync::{Arc, OnceLock};
use warden_container::api::{ResolutionContext, ResolutionScope, ScopeFactory};

/// The resolution context type exposed by a factory's scopes.
pub type ContextOf<F> = <<F as ScopeFactory>::Scope as ResolutionScope>::Context;

// ─────────────────────────────────────────────────────────────────────────────
// Policy and hooks
// ─────────────────────────────────────────────────────────────────────────────

/// What an owner does when it is accessed after [`release`](ScopeOwner::release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReusePolicy {
    /// Start a new lifecycle segment: the next access creates a fresh scope
    /// and resolves a fresh service.
    #[default]
    Reenter,
    /// Fail every access after release with [`OwnerError::AlreadyReleased`].
    Forbid,
}

/// Component-specific cleanup that runs when an owner is released.
///
/// The hook runs after the scope has been released and receives no access to
/// the scope or the service. Any `Fn() + Send + Sync` closure is a hook.
///
/// # Example
///
/// ```
/// use core::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use warden_container::container::Container;
/// use warden_owner::owner::ScopeOwner;
///
/// struct Repository;
///
/// let cleaned = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&cleaned);
/// let owner = ScopeOwner::<Container, Repository>::builder()
///     .on_release(move || flag.store(true, Ordering::SeqCst))
///     .container(Container::new())
///     .build();
///
/// owner.release().unwrap();
/// assert!(cleaned.load(Ordering::SeqCst));
/// ```
pub trait OnRelease: Send + Sync + 'static {
    /// Runs the cleanup.
    fn on_release(&self);
}

impl<H: Fn() + Send + Sync + 'static> OnRelease for H {
    fn on_release(&self) {
        self();
    }
}

/// The teardown capability a host composes into its components.
///
/// A host tears a component down by calling [`release`](Self::release)
/// exactly once; implementations must tolerate repeated calls.
pub trait Releasable {
    /// The error surfaced from teardown.
    type Error;

    /// Releases everything this value owns.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if a collaborator reported a failure while
    /// releasing. The value is considered released either way.
    fn release(&self) -> Result<(), Self::Error>;
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    /// No container bound yet.
    Unbound,
    /// Bound, and not released since the segment began.
    Live,
    /// Released; the next access either starts a segment or fails.
    Released,
}

enum ScopeSlot<S> {
    Absent,
    /// `create_scope` is running for this owner.
    Creating,
    Present(S),
}

struct OwnerState<S, T> {
    segment: Segment,
    scope: ScopeSlot<S>,
    cache: ResourceCache<T>,
}

/// Undoes a claim on `OwnerState` if the collaborator call unwinds.
struct Rollback<'a, S, T, U: FnOnce(&mut OwnerState<S, T>)> {
    state: &'a RefCell<OwnerState<S, T>>,
    undo: Option<U>,
}

impl<'a, S, T, U: FnOnce(&mut OwnerState<S, T>)> Rollback<'a, S, T, U> {
    fn new(state: &'a RefCell<OwnerState<S, T>>, undo: U) -> Self {
        Self {
            state,
            undo: Some(undo),
        }
    }

    fn disarm(mut self) {
        self.undo = None;
    }
}

impl<S, T, U: FnOnce(&mut OwnerState<S, T>)> Drop for Rollback<'_, S, T, U> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take()
            && let Ok(mut state) = self.state.try_borrow_mut()
        {
            undo(&mut *state);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScopeOwner
// ─────────────────────────────────────────────────────────────────────────────

/// Owns a lazily created resolution scope and one memoized service of type `T`.
///
/// `F` is the container (any [`ScopeFactory`]); it is bound once and never
/// replaced. The owner is usually held by a component and torn down by the
/// host through [`release`](Self::release) or the [`Releasable`] trait.
/// Dropping a live owner releases it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use warden_container::container::Container;
/// use warden_owner::owner::ScopeOwner;
///
/// struct Repository { table: &'static str }
///
/// let container = Container::new();
/// container.add_scoped(|_| Repository { table: "orders" });
///
/// let owner = ScopeOwner::<Container, Repository>::new();
/// owner.bind_container(container).unwrap();
///
/// let first = owner.service().unwrap();
/// let second = owner.service().unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(first.table, "orders");
///
/// owner.release().unwrap();
/// assert!(!owner.has_scope());
/// ```
pub struct ScopeOwner<F: ScopeFactory, T: Send + Sync + 'static> {
    container: OnceLock<F>,
    state: ReentrantMutex<RefCell<OwnerState<F::Scope, T>>>,
    policy: ReusePolicy,
    on_release: Option<Box<dyn OnRelease>>,
}

impl<F: ScopeFactory, T: Send + Sync + 'static> Default for ScopeOwner<F, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ScopeFactory, T: Send + Sync + 'static> core::fmt::Debug for ScopeOwner<F, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopeOwner")
            .field("service", &type_name::<T>())
            .field("bound", &self.is_bound())
            .field("scope", &self.has_scope())
            .field("resolved", &self.has_service())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<F: ScopeFactory, T: Send + Sync + 'static> ScopeOwner<F, T> {
    /// Creates an unbound owner with the default [`ReusePolicy`] and no hook.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder for configuring the owner.
    #[must_use]
    pub fn builder() -> OwnerBuilder<F, T> {
        OwnerBuilder::new()
    }

    /// Binds the container scopes are created from.
    ///
    /// Must be called once, before the first access.
    ///
    /// # Errors
    ///
    /// - [`UsageOrder::ScopeAlreadyCreated`] if a scope exists
    /// - [`UsageOrder::AlreadyBound`] if a container is already bound
    pub fn bind_container(&self, container: F) -> Result<(), OwnerError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        if !matches!(state.scope, ScopeSlot::Absent) {
            return Err(UsageOrder::ScopeAlreadyCreated.into());
        }
        self.container
            .set(container)
            .map_err(|_| UsageOrder::AlreadyBound)?;

        state.segment = Segment::Live;
        tracing::trace!(service = type_name::<T>(), "container bound");
        Ok(())
    }

    /// Returns the resolution context of this owner's scope, creating the
    /// scope on first use.
    ///
    /// Every call within a lifecycle segment returns a context of the same
    /// scope.
    ///
    /// # Errors
    ///
    /// - [`OwnerError::NotInitialized`] if no container is bound
    /// - [`OwnerError::AlreadyReleased`] after release under [`ReusePolicy::Forbid`]
    /// - [`OwnerError::ScopeCreation`] if the container failed to create a scope
    /// - [`UsageOrder::ReentrantAccess`] if called from inside scope creation
    pub fn scoped_services(&self) -> Result<ContextOf<F>, OwnerError> {
        let guard = self.state.lock();
        self.scope_context(&guard)
    }

    /// Returns the memoized service, resolving it on first use.
    ///
    /// Once resolved, every call in the segment returns the same instance.
    /// A failed resolution leaves nothing behind, so the next call retries.
    ///
    /// # Errors
    ///
    /// Everything [`scoped_services`](Self::scoped_services) returns, plus:
    ///
    /// - [`OwnerError::Resolution`] if the scope could not produce `T`
    /// - [`UsageOrder::ReentrantAccess`] if called from inside `T`'s resolution
    /// - [`UsageOrder::ReleasedDuringAccess`] if the owner was released while
    ///   `T` was being resolved
    pub fn service(&self) -> Result<Arc<T>, OwnerError> {
        let guard = self.state.lock();
        let context = self.scope_context(&guard)?;

        let claim = {
            let mut state = guard.borrow_mut();
            if let Some(service) = state.cache.get() {
                return Ok(service);
            }
            state.cache.begin().ok_or(UsageOrder::ReentrantAccess)?
        };

        let rollback = Rollback::new(&*guard, move |state: &mut OwnerState<F::Scope, T>| {
            state.cache.cancel(claim);
        });
        let resolved = context.resolve::<T>();
        rollback.disarm();

        let completion = guard.borrow_mut().cache.complete(claim, resolved);
        match completion {
            Completion::Stored(service) => {
                tracing::trace!(service = type_name::<T>(), "service resolved");
                Ok(service)
            }
            Completion::Failed(err) => Err(OwnerError::Resolution {
                service: type_name::<T>(),
                source: Box::new(err),
            }),
            Completion::Stale(_) => Err(UsageOrder::ReleasedDuringAccess.into()),
        }
    }

    /// Releases the scope, forgets the service, and runs the release hook.
    ///
    /// The owner's state is cleared before the scope is released, so it never
    /// holds a service whose scope is gone. Calling this again without an
    /// intervening access is a no-op, as is calling it on an unbound owner.
    ///
    /// A bound owner that never created a scope is still released: there is
    /// no scope to release, but the owner moves to the released state (so
    /// [`ReusePolicy::Forbid`] rejects later access) and the hook runs. Only
    /// the scope release itself is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OwnerError::ScopeRelease`] if the scope reported failures.
    /// The owner is released regardless and the hook has already run.
    pub fn release(&self) -> Result<(), OwnerError> {
        let scope = {
            let guard = self.state.lock();
            let mut state = guard.borrow_mut();
            if state.segment != Segment::Live {
                return Ok(());
            }

            state.segment = Segment::Released;
            state.cache.clear();
            match core::mem::replace(&mut state.scope, ScopeSlot::Absent) {
                ScopeSlot::Present(scope) => Some(scope),
                ScopeSlot::Absent | ScopeSlot::Creating => None,
            }
        };

        let released = match scope {
            Some(scope) => {
                tracing::trace!(service = type_name::<T>(), "releasing scope");
                scope
                    .release()
                    .map_err(|err| OwnerError::ScopeRelease(Box::new(err)))
            }
            None => Ok(()),
        };

        if let Some(hook) = &self.on_release {
            hook.on_release();
        }
        released
    }

    /// Returns `true` if a container is bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.container.get().is_some()
    }

    /// Returns the bound container, if any.
    #[must_use]
    pub fn container(&self) -> Option<&F> {
        self.container.get()
    }

    /// Returns `true` if the owner currently holds a scope.
    #[must_use]
    pub fn has_scope(&self) -> bool {
        matches!(self.state.lock().borrow().scope, ScopeSlot::Present(_))
    }

    /// Returns `true` if the owner currently holds a resolved service.
    #[must_use]
    pub fn has_service(&self) -> bool {
        self.state.lock().borrow().cache.is_populated()
    }

    /// Returns `true` if the owner has been released and not accessed since.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.lock().borrow().segment == Segment::Released
    }

    /// Returns the owner's reuse policy.
    #[must_use]
    pub fn reuse_policy(&self) -> ReusePolicy {
        self.policy
    }

    fn scope_context(
        &self,
        state: &RefCell<OwnerState<F::Scope, T>>,
    ) -> Result<ContextOf<F>, OwnerError> {
        let container = self.container.get().ok_or(OwnerError::NotInitialized)?;

        {
            let mut current = state.borrow_mut();
            self.enter_segment(&mut current)?;
            if let ScopeSlot::Present(scope) = &current.scope {
                return Ok(scope.context());
            }
            if matches!(current.scope, ScopeSlot::Creating) {
                return Err(UsageOrder::ReentrantAccess.into());
            }
            current.scope = ScopeSlot::Creating;
        }

        let rollback = Rollback::new(state, |current: &mut OwnerState<F::Scope, T>| {
            if matches!(current.scope, ScopeSlot::Creating) {
                current.scope = ScopeSlot::Absent;
            }
        });
        let created = container.create_scope();
        rollback.disarm();

        let mut current = state.borrow_mut();
        if !matches!(current.scope, ScopeSlot::Creating) {
            // Released on this thread while the container was creating the scope.
            drop(current);
            if let Ok(scope) = created
                && let Err(err) = scope.release()
            {
                tracing::warn!(service = type_name::<T>(), error = %err, "orphaned scope release failed");
            }
            return Err(UsageOrder::ReleasedDuringAccess.into());
        }

        match created {
            Ok(scope) => {
                let context = scope.context();
                current.scope = ScopeSlot::Present(scope);
                tracing::trace!(service = type_name::<T>(), "scope created");
                Ok(context)
            }
            Err(err) => {
                current.scope = ScopeSlot::Absent;
                Err(OwnerError::ScopeCreation(Box::new(err)))
            }
        }
    }

    fn enter_segment(&self, state: &mut OwnerState<F::Scope, T>) -> Result<(), OwnerError> {
        match (state.segment, self.policy) {
            (Segment::Released, ReusePolicy::Forbid) => Err(OwnerError::AlreadyReleased),
            (Segment::Released, ReusePolicy::Reenter) => {
                state.segment = Segment::Live;
                tracing::trace!(service = type_name::<T>(), "lifecycle segment started");
                Ok(())
            }
            (Segment::Unbound | Segment::Live, _) => Ok(()),
        }
    }
}

impl<F: ScopeFactory, T: Send + Sync + 'static> Releasable for ScopeOwner<F, T> {
    type Error = OwnerError;

    fn release(&self) -> Result<(), OwnerError> {
        ScopeOwner::release(self)
    }
}

impl<F: ScopeFactory, T: Send + Sync + 'static> Drop for ScopeOwner<F, T> {
    fn drop(&mut self) {
        if let Err(err) = ScopeOwner::release(self) {
            tracing::warn!(service = type_name::<T>(), error = %err, "scope owner dropped with release failures");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OwnerBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`ScopeOwner`].
///
/// # Example
///
/// ```
/// use warden_container::container::Container;
/// use warden_owner::owner::{ReusePolicy, ScopeOwner};
///
/// struct Repository;
///
/// let owner = ScopeOwner::<Container, Repository>::builder()
///     .reuse_policy(ReusePolicy::Forbid)
///     .on_release(|| {})
///     .build();
///
/// assert!(!owner.is_bound());
/// assert_eq!(owner.reuse_policy(), ReusePolicy::Forbid);
/// ```
pub struct OwnerBuilder<F: ScopeFactory, T> {
    policy: ReusePolicy,
    on_release: Option<Box<dyn OnRelease>>,
    container: Option<F>,
    _marker: PhantomData<fn() -> T>,
}

impl<F: ScopeFactory, T: Send + Sync + 'static> Default for OwnerBuilder<F, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ScopeFactory, T: Send + Sync + 'static> OwnerBuilder<F, T> {
    /// Creates a builder with the default policy, no hook, and no container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: ReusePolicy::default(),
            on_release: None,
            container: None,
            _marker: PhantomData,
        }
    }

    /// Sets the reuse policy.
    #[must_use]
    pub fn reuse_policy(mut self, policy: ReusePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the release hook.
    #[must_use]
    pub fn on_release(mut self, hook: impl OnRelease) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Binds the container up front, as [`ScopeOwner::bind_container`] would.
    #[must_use]
    pub fn container(mut self, container: F) -> Self {
        self.container = Some(container);
        self
    }

    /// Builds the owner.
    #[must_use]
    pub fn build(self) -> ScopeOwner<F, T> {
        let segment = if self.container.is_some() {
            Segment::Live
        } else {
            Segment::Unbound
        };

        ScopeOwner {
            container: self.container.map_or_else(OnceLock::new, OnceLock::from),
            state: ReentrantMutex::new(RefCell::new(OwnerState {
                segment,
                scope: ScopeSlot::Absent,
                cache: ResourceCache::new(),
            })),
            policy: self.policy,
            on_release: self.on_release,
        }
    }
}
