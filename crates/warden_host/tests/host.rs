//! Host lifecycle tests: mounting, reconciliation, and teardown of owning
//! components against a real container.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use warden_container::prelude::*;
use warden_host::prelude::*;
use warden_owner::prelude::*;

// ─────────────────────────────────────────────────────────────────────────
// Test Services
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counts {
    created: AtomicUsize,
    released: AtomicUsize,
}

/// A releasable service that reports how many instances exist.
struct Tracked {
    counts: Arc<Counts>,
}

impl Tracked {
    fn message(&self) -> String {
        format!(
            "Created: {} - Disposed: {}",
            self.counts.created.load(Ordering::SeqCst),
            self.counts.released.load(Ordering::SeqCst)
        )
    }
}

impl Release for Tracked {
    fn release(&self) -> Result<(), BoxError> {
        self.counts.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn tracked_container(lifetime: Lifetime) -> (Container, Arc<Counts>) {
    let counts = Arc::new(Counts::default());
    let container = Container::new();
    let shared = Arc::clone(&counts);
    container.add_releasable(lifetime, move |_| {
        shared.created.fetch_add(1, Ordering::SeqCst);
        Ok::<_, BoxError>(Tracked {
            counts: Arc::clone(&shared),
        })
    });
    (container, counts)
}

fn tracked_component(_: &str) -> OwningComponent<Tracked> {
    OwningComponent::new(Tracked::message)
}

// ─────────────────────────────────────────────────────────────────────────
// Reconciliation
// ─────────────────────────────────────────────────────────────────────────

/// A component that moves to a new position is released before its
/// replacement renders.
#[test]
fn moving_a_component_releases_the_old_scope_first() {
    let (container, counts) = tracked_container(Lifetime::Transient);
    let mut host = Host::new(container);

    host.replace(["first"], tracked_component).unwrap();
    assert_eq!(host.render_all().unwrap(), vec!["Created: 1 - Disposed: 0"]);

    host.replace(["second"], tracked_component).unwrap();
    assert_eq!(host.render_all().unwrap(), vec!["Created: 2 - Disposed: 1"]);

    host.shutdown().unwrap();
    assert_eq!(counts.released.load(Ordering::SeqCst), 2);
}

#[test]
fn kept_components_keep_their_service() {
    let (container, counts) = tracked_container(Lifetime::Scoped);
    let mut host = Host::new(container);

    host.replace(["a", "b"], tracked_component).unwrap();
    host.render_all().unwrap();
    host.replace(["b", "c"], tracked_component).unwrap();
    host.render_all().unwrap();
    host.render_all().unwrap();

    // a, b, c each created once; only a released so far.
    assert_eq!(counts.created.load(Ordering::SeqCst), 3);
    assert_eq!(counts.released.load(Ordering::SeqCst), 1);
    assert_eq!(host.keys().collect::<Vec<_>>(), vec!["b", "c"]);
}

#[test]
fn rendering_twice_resolves_once() {
    let (container, counts) = tracked_container(Lifetime::Transient);
    let mut host = Host::new(container);
    host.mount("only", tracked_component("only")).unwrap();

    host.render("only").unwrap();
    assert_eq!(host.render("only").unwrap(), "Created: 1 - Disposed: 0");
    assert_eq!(counts.created.load(Ordering::SeqCst), 1);
}

// ─────────────────────────────────────────────────────────────────────────
// Failures
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn render_failure_is_retried_after_registration() {
    struct Banner;

    let container = Container::new();
    let mut host = Host::new(container.clone());
    host.mount("banner", OwningComponent::new(|_: &Banner| "banner".to_string()))
        .unwrap();

    let err = host.render("banner").unwrap_err();
    let HostError::Component { key, source } = &err else {
        panic!("expected a component error, got {err:?}");
    };
    assert_eq!(key, "banner");
    assert!(matches!(source, OwnerError::Resolution { .. }));

    container.add_scoped(|_| Banner);
    assert_eq!(host.render("banner").unwrap(), "banner");
}

#[test]
fn component_that_fails_to_attach_is_not_mounted() {
    struct Banner;

    let other = Container::new();
    let prebound = OwningComponent::with_owner(
        ScopeOwner::builder().container(other).build(),
        |_: &Banner| String::new(),
    );

    let mut host = Host::new(Container::new());
    let err = host.mount("banner", prebound).unwrap_err();

    assert!(matches!(
        err,
        HostError::Component {
            source: OwnerError::UsageOrder(UsageOrder::AlreadyBound),
            ..
        }
    ));
    assert!(!host.contains("banner"));
    assert!(host.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────
// Teardown
// ─────────────────────────────────────────────────────────────────────────

fn logging_component(key: &str, log: &Arc<Mutex<Vec<String>>>) -> OwningComponent<Tracked> {
    let log = Arc::clone(log);
    let key = key.to_string();
    let owner = ScopeOwner::builder()
        .on_release(move || log.lock().push(key.clone()))
        .build();
    OwningComponent::with_owner(owner, Tracked::message)
}

#[test]
fn shutdown_unmounts_in_reverse_order_and_shuts_the_container_down() {
    let (container, _) = tracked_container(Lifetime::Scoped);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut host = Host::new(container.clone());

    for key in ["header", "body", "footer"] {
        host.mount(key, logging_component(key, &log)).unwrap();
    }
    host.render_all().unwrap();
    host.shutdown().unwrap();

    assert_eq!(*log.lock(), vec!["footer", "body", "header"]);
    assert!(host.is_empty());
    assert!(container.is_shut_down());
}

#[test]
fn dropping_the_host_detaches_components() {
    let (container, counts) = tracked_container(Lifetime::Scoped);
    {
        let mut host = Host::new(container.clone());
        host.mount("a", tracked_component("a")).unwrap();
        host.mount("b", tracked_component("b")).unwrap();
        host.render_all().unwrap();
    }

    assert_eq!(counts.released.load(Ordering::SeqCst), 2);
    // The container itself stays usable.
    assert!(!container.is_shut_down());
}

#[test]
fn forbid_policy_host_rejects_render_after_detach() {
    let (container, _) = tracked_container(Lifetime::Scoped);
    let host = Host::new(container.clone()).with_reuse_policy(ReusePolicy::Forbid);

    let component = host.owning_component(Tracked::message);
    component.attach(&container).unwrap();
    component.render().unwrap();
    component.detach().unwrap();

    assert!(matches!(
        component.render(),
        Err(OwnerError::AlreadyReleased)
    ));
}
