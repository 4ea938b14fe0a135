//! Shared test utilities for `warden_owner` integration tests.
//!
//! Provides a scripted container whose scopes count every call the owner
//! makes, so tests can assert how often scopes are created, services are
//! resolved, and scopes are released. Import via `mod test_utils;`.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities; not all items used in every test binary"
)]

use core::any::Any;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use warden_container::api::{ResolutionContext, ResolutionScope, ScopeFactory};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub &'static str);

/// Builds the resolved service for a given scope id.
pub type Provide = Arc<dyn Fn(usize) -> Arc<dyn Any + Send + Sync> + Send + Sync>;

/// Runs inside `create_scope`, after the scope has been counted.
pub type OnCreate = Arc<dyn Fn() + Send + Sync>;

/// Counters and switches shared by a factory and every scope it creates.
#[derive(Default)]
pub struct Ledger {
    pub scopes_created: AtomicUsize,
    pub scopes_released: AtomicUsize,
    pub resolves: AtomicUsize,
    pub fail_creation: AtomicBool,
    pub fail_release: AtomicBool,
    pub registered: AtomicBool,
    pub events: Mutex<Vec<String>>,
    provide: Mutex<Option<Provide>>,
    on_create: Mutex<Option<OnCreate>>,
}

impl Ledger {
    pub fn created(&self) -> usize {
        self.scopes_created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.scopes_released.load(Ordering::SeqCst)
    }

    pub fn resolved(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

/// A widget service that remembers which scope produced it.
#[derive(Debug)]
pub struct Widget {
    pub scope: usize,
    pub serial: usize,
}

/// A scripted [`ScopeFactory`].
#[derive(Clone)]
pub struct MockFactory {
    pub ledger: Arc<Ledger>,
}

impl MockFactory {
    /// A factory whose scopes resolve [`Widget`]s.
    pub fn widgets() -> Self {
        let serial = Arc::new(AtomicUsize::new(0));
        Self::providing(move |scope| -> Arc<dyn Any + Send + Sync> {
            Arc::new(Widget {
                scope,
                serial: serial.fetch_add(1, Ordering::SeqCst),
            })
        })
    }

    /// A factory whose scopes resolve whatever `provide` returns.
    pub fn providing(
        provide: impl Fn(usize) -> Arc<dyn Any + Send + Sync> + Send + Sync + 'static,
    ) -> Self {
        let ledger = Ledger::default();
        ledger.registered.store(true, Ordering::SeqCst);
        *ledger.provide.lock() = Some(Arc::new(provide));
        Self {
            ledger: Arc::new(ledger),
        }
    }

    /// Runs `hook` every time a scope is created, before it is handed out.
    pub fn on_create(self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        *self.ledger.on_create.lock() = Some(Arc::new(hook));
        self
    }

    /// A factory with nothing registered.
    pub fn unregistered() -> Self {
        let factory = Self::widgets();
        factory.ledger.registered.store(false, Ordering::SeqCst);
        factory
    }
}

impl ScopeFactory for MockFactory {
    type Scope = MockScope;
    type Error = MockError;

    fn create_scope(&self) -> Result<MockScope, MockError> {
        if self.ledger.fail_creation.load(Ordering::SeqCst) {
            return Err(MockError("container unavailable"));
        }
        let id = self.ledger.scopes_created.fetch_add(1, Ordering::SeqCst) + 1;
        self.ledger.record(format!("create {id}"));
        let hook = self.ledger.on_create.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(MockScope {
            id,
            ledger: Arc::clone(&self.ledger),
        })
    }
}

pub struct MockScope {
    pub id: usize,
    ledger: Arc<Ledger>,
}

impl ResolutionScope for MockScope {
    type Context = MockContext;
    type ReleaseError = MockError;

    fn context(&self) -> MockContext {
        MockContext {
            scope: self.id,
            ledger: Arc::clone(&self.ledger),
        }
    }

    fn release(self) -> Result<(), MockError> {
        self.ledger.scopes_released.fetch_add(1, Ordering::SeqCst);
        self.ledger.record(format!("release {}", self.id));
        if self.ledger.fail_release.load(Ordering::SeqCst) {
            return Err(MockError("scope already torn down"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MockContext {
    pub scope: usize,
    ledger: Arc<Ledger>,
}

impl ResolutionContext for MockContext {
    type Error = MockError;

    fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, MockError> {
        self.ledger.resolves.fetch_add(1, Ordering::SeqCst);
        if !self.ledger.registered.load(Ordering::SeqCst) {
            return Err(MockError("service not registered"));
        }
        let provide = self
            .ledger
            .provide
            .lock()
            .clone()
            .ok_or(MockError("no provider"))?;
        provide(self.scope)
            .downcast::<T>()
            .map_err(|_| MockError("service type mismatch"))
    }
}
