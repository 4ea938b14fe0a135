//! The memoization slot behind [`ScopeOwner::service`](crate::owner::ScopeOwner::service).
//!
//! [`ResourceCache`] holds at most one resolved service and enforces three
//! rules:
//!
//! 1. **Populate once.** Only an empty cache can be claimed, and only the
//!    holder of the claim can populate it.
//! 2. **Never memoize failure.** Completing a claim with an error returns the
//!    cache to empty, so the next access retries.
//! 3. **Clear on release.** [`clear`](ResourceCache::clear) empties the cache
//!    and advances its epoch. A claim taken before the clear is stale, and
//!    completing it stores nothing.
//!
//! The cache does no locking of its own; the owner serializes access to it.
//!
//! ```
//! use std::sync::Arc;
//! use warden_owner::cache::{Completion, ResourceCache};
//!
//! let mut cache = ResourceCache::<String>::new();
//! let claim = cache.begin().unwrap();
//! let outcome = cache.complete::<()>(claim, Ok(Arc::new("db".to_string())));
//! assert!(matches!(outcome, Completion::Stored(_)));
//! assert_eq!(cache.get().as_deref().map(String::as_str), Some("db"));
//! ```

use std::sync::Arc;

/// Proof that the caller moved the cache from empty to resolving.
///
/// Returned by [`ResourceCache::begin`]; consumed by
/// [`ResourceCache::complete`] or [`ResourceCache::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a claim must be completed or cancelled"]
pub struct Claim {
    epoch: u64,
}

/// The result of completing a claim.
#[derive(Debug)]
pub enum Completion<T, E> {
    /// The service was memoized.
    Stored(Arc<T>),
    /// Resolution failed; the cache is empty again.
    Failed(E),
    /// The cache was cleared while the claim was outstanding. The result was
    /// not stored and is handed back.
    Stale(Result<Arc<T>, E>),
}

#[derive(Debug)]
enum Slot<T> {
    Empty,
    Resolving(u64),
    Ready(Arc<T>),
}

/// A single memoized service.
#[derive(Debug)]
pub struct ResourceCache<T> {
    slot: Slot<T>,
    epoch: u64,
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Slot::Empty,
            epoch: 0,
        }
    }

    /// Returns the memoized service, if any.
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        match &self.slot {
            Slot::Ready(service) => Some(Arc::clone(service)),
            Slot::Empty | Slot::Resolving(_) => None,
        }
    }

    /// Returns `true` if a service is memoized.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        matches!(self.slot, Slot::Ready(_))
    }

    /// Returns `true` if a claim is outstanding.
    #[must_use]
    pub fn is_resolving(&self) -> bool {
        matches!(self.slot, Slot::Resolving(_))
    }

    /// Returns the number of times the cache has been cleared.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Claims the empty → resolving transition.
    ///
    /// Returns `None` if the cache is already populated or a claim is
    /// outstanding.
    pub fn begin(&mut self) -> Option<Claim> {
        match self.slot {
            Slot::Empty => {
                self.slot = Slot::Resolving(self.epoch);
                Some(Claim { epoch: self.epoch })
            }
            Slot::Resolving(_) | Slot::Ready(_) => None,
        }
    }

    /// Completes a claim with the resolution result.
    pub fn complete<E>(&mut self, claim: Claim, result: Result<Arc<T>, E>) -> Completion<T, E> {
        if !self.holds(claim) {
            return Completion::Stale(result);
        }

        match result {
            Ok(service) => {
                self.slot = Slot::Ready(Arc::clone(&service));
                Completion::Stored(service)
            }
            Err(err) => {
                self.slot = Slot::Empty;
                Completion::Failed(err)
            }
        }
    }

    /// Abandons a claim without a result, returning the cache to empty.
    ///
    /// Does nothing if the claim is stale.
    pub fn cancel(&mut self, claim: Claim) {
        if self.holds(claim) {
            self.slot = Slot::Empty;
        }
    }

    /// Empties the cache and invalidates any outstanding claim.
    ///
    /// Returns the memoized service, if there was one.
    pub fn clear(&mut self) -> Option<Arc<T>> {
        self.epoch += 1;
        match core::mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Ready(service) => Some(service),
            Slot::Empty | Slot::Resolving(_) => None,
        }
    }

    fn holds(&self, claim: Claim) -> bool {
        matches!(self.slot, Slot::Resolving(epoch) if epoch == claim.epoch && epoch == self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cache_is_empty() {
        let cache = ResourceCache::<i32>::new();
        assert!(cache.get().is_none());
        assert!(!cache.is_populated());
        assert!(!cache.is_resolving());
        assert_eq!(cache.epoch(), 0);
    }

    #[test]
    fn success_is_memoized() {
        let mut cache = ResourceCache::new();
        let claim = cache.begin().unwrap();
        assert!(cache.is_resolving());

        let stored = match cache.complete::<()>(claim, Ok(Arc::new(5))) {
            Completion::Stored(service) => service,
            other => panic!("unexpected completion: {other:?}"),
        };

        assert!(Arc::ptr_eq(&stored, &cache.get().unwrap()));
        assert!(cache.begin().is_none());
    }

    #[test]
    fn failure_is_not_memoized() {
        let mut cache = ResourceCache::<i32>::new();
        let claim = cache.begin().unwrap();

        let outcome = cache.complete(claim, Err("unregistered"));
        assert!(matches!(outcome, Completion::Failed("unregistered")));
        assert!(cache.get().is_none());

        // The next access can claim again.
        assert!(cache.begin().is_some());
    }

    #[test]
    fn second_claim_is_refused_while_resolving() {
        let mut cache = ResourceCache::<i32>::new();
        let _claim = cache.begin().unwrap();
        assert!(cache.begin().is_none());
    }

    #[test]
    fn clear_returns_service_and_advances_epoch() {
        let mut cache = ResourceCache::new();
        let claim = cache.begin().unwrap();
        let _ = cache.complete::<()>(claim, Ok(Arc::new("svc")));

        let cleared = cache.clear();
        assert_eq!(cleared.as_deref(), Some(&"svc"));
        assert!(cache.get().is_none());
        assert_eq!(cache.epoch(), 1);
        assert!(cache.clear().is_none());
        assert_eq!(cache.epoch(), 2);
    }

    #[test]
    fn completion_after_clear_is_stale() {
        let mut cache = ResourceCache::new();
        let claim = cache.begin().unwrap();
        cache.clear();

        let outcome = cache.complete::<()>(claim, Ok(Arc::new(1)));
        assert!(matches!(outcome, Completion::Stale(Ok(_))));
        assert!(!cache.is_populated());
    }

    #[test]
    fn stale_claim_does_not_disturb_new_claim() {
        let mut cache = ResourceCache::new();
        let old = cache.begin().unwrap();
        cache.clear();
        let new = cache.begin().unwrap();

        cache.cancel(old);
        assert!(cache.is_resolving());

        let outcome = cache.complete::<()>(new, Ok(Arc::new(2)));
        assert!(matches!(outcome, Completion::Stored(_)));
    }

    #[test]
    fn cancel_returns_to_empty() {
        let mut cache = ResourceCache::<i32>::new();
        let claim = cache.begin().unwrap();
        cache.cancel(claim);

        assert!(!cache.is_resolving());
        assert!(cache.begin().is_some());
    }
}
