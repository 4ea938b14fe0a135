//! The component lifecycle host.
//!
//! [`Host`] mounts keyed [`Component`]s against one [`Container`] and drives
//! their lifecycle:
//!
//! 1. **Mount** - [`attach`](Component::attach) once, then store
//! 2. **Render** - [`render`](Component::render) any number of times
//! 3. **Unmount** - [`detach`](Component::detach) exactly once
//!
//! [`replace`](Host::replace) reconciles the mounted set against a new list
//! of keys: components whose key disappears are unmounted before new ones are
//! mounted, so a component that moves to a new key is torn down and created
//! again.
//!
//! Teardown on [`shutdown`](Host::shutdown) runs in reverse mount order.

use hashbrown::{HashMap, HashSet};
use warden_container::container::Container;
use warden_container::error::ReleaseErrors;
use warden_owner::error::OwnerError;
use warden_owner::owner::ReusePolicy;

use crate::component::{Component, OwningComponent};

/// Errors returned by [`Host`].
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A component is already mounted under this key.
    #[error("a component is already mounted at {0:?}")]
    DuplicateKey(String),

    /// No component is mounted under this key.
    #[error("no component is mounted at {0:?}")]
    UnknownKey(String),

    /// A component failed to attach, render, or detach.
    #[error("component {key:?} failed")]
    Component {
        /// The component's key.
        key: String,
        /// The component's error.
        #[source]
        source: OwnerError,
    },

    /// The container reported failures while shutting down.
    #[error("container shutdown reported failures")]
    Container(#[source] ReleaseErrors),
}

/// Mounts components against a shared container.
///
/// # Example
///
/// ```
/// use warden_container::container::Container;
/// use warden_host::host::Host;
///
/// struct Counter { start: u32 }
///
/// let container = Container::new();
/// container.add_scoped(|_| Counter { start: 10 });
///
/// let mut host = Host::new(container);
/// let component = host.owning_component(|counter: &Counter| counter.start.to_string());
/// host.mount("counter", component).unwrap();
///
/// assert_eq!(host.render("counter").unwrap(), "10");
/// host.shutdown().unwrap();
/// ```
pub struct Host {
    container: Container,
    policy: ReusePolicy,
    components: HashMap<String, Box<dyn Component>>,
    /// Keys in mount order.
    order: Vec<String>,
}

impl core::fmt::Debug for Host {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Host")
            .field("container", &self.container)
            .field("policy", &self.policy)
            .field("mounted", &self.order)
            .finish()
    }
}

impl Host {
    /// Creates a host with nothing mounted.
    #[must_use]
    pub fn new(container: Container) -> Self {
        Self {
            container,
            policy: ReusePolicy::default(),
            components: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Sets the reuse policy applied by [`owning_component`](Self::owning_component).
    #[must_use]
    pub fn with_reuse_policy(mut self, policy: ReusePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the host's container.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Creates an [`OwningComponent`] configured with the host's reuse policy.
    pub fn owning_component<T: Send + Sync + 'static>(
        &self,
        render: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> OwningComponent<T> {
        OwningComponent::with_policy(self.policy, render)
    }

    /// Returns the number of mounted components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if a component is mounted under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.components.contains_key(key)
    }

    /// Returns the mounted keys in mount order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Attaches `component` and mounts it under `key`.
    ///
    /// # Errors
    ///
    /// - [`HostError::DuplicateKey`] if `key` is taken
    /// - [`HostError::Component`] if the component failed to attach; it is
    ///   not mounted
    pub fn mount(
        &mut self,
        key: impl Into<String>,
        component: impl Component + 'static,
    ) -> Result<(), HostError> {
        self.mount_boxed(key.into(), Box::new(component))
    }

    /// Renders the component mounted under `key`.
    ///
    /// # Errors
    ///
    /// - [`HostError::UnknownKey`] if nothing is mounted under `key`
    /// - [`HostError::Component`] if rendering failed
    pub fn render(&self, key: &str) -> Result<String, HostError> {
        let component = self
            .components
            .get(key)
            .ok_or_else(|| HostError::UnknownKey(key.to_owned()))?;
        component.render().map_err(|source| HostError::Component {
            key: key.to_owned(),
            source,
        })
    }

    /// Renders every mounted component in mount order.
    ///
    /// # Errors
    ///
    /// Returns the first component failure.
    pub fn render_all(&self) -> Result<Vec<String>, HostError> {
        self.order.iter().map(|key| self.render(key)).collect()
    }

    /// Detaches and removes the component mounted under `key`.
    ///
    /// # Errors
    ///
    /// - [`HostError::UnknownKey`] if nothing is mounted under `key`
    /// - [`HostError::Component`] if detaching reported failures; the
    ///   component is removed regardless
    pub fn unmount(&mut self, key: &str) -> Result<(), HostError> {
        let component = self
            .components
            .remove(key)
            .ok_or_else(|| HostError::UnknownKey(key.to_owned()))?;
        self.order.retain(|mounted| mounted != key);

        tracing::debug!(key, "unmounting component");
        component.detach().map_err(|source| HostError::Component {
            key: key.to_owned(),
            source,
        })
    }

    /// Reconciles the mounted components against `keys`.
    ///
    /// Components whose key is absent from `keys` are unmounted first, in
    /// reverse mount order. Keys not yet mounted are then mounted in the
    /// given order using `make`. Afterwards the mount order matches `keys`.
    ///
    /// # Errors
    ///
    /// - [`HostError::DuplicateKey`] if `keys` repeats a key; nothing changes
    /// - otherwise the first unmount or mount failure, after every step has
    ///   been attempted
    pub fn replace<I, K, F, C>(&mut self, keys: I, mut make: F) -> Result<(), HostError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: FnMut(&str) -> C,
        C: Component + 'static,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let mut wanted = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !wanted.insert(key.as_str()) {
                return Err(HostError::DuplicateKey(key.clone()));
            }
        }

        let mut first_error = None;

        let stale: Vec<String> = self
            .order
            .iter()
            .rev()
            .filter(|key| !wanted.contains(key.as_str()))
            .cloned()
            .collect();
        drop(wanted);
        for key in stale {
            if let Err(err) = self.unmount(&key) {
                first_error.get_or_insert(err);
            }
        }

        for key in &keys {
            if self.components.contains_key(key) {
                continue;
            }
            if let Err(err) = self.mount_boxed(key.clone(), Box::new(make(key.as_str()))) {
                first_error.get_or_insert(err);
            }
        }

        self.order = keys
            .into_iter()
            .filter(|key| self.components.contains_key(key))
            .collect();

        first_error.map_or(Ok(()), Err)
    }

    /// Unmounts everything in reverse mount order, then shuts the container
    /// down.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Every component is unmounted and the
    /// container is shut down regardless.
    pub fn shutdown(&mut self) -> Result<(), HostError> {
        let mut first_error = self.unmount_all();

        if let Err(errors) = self.container.shutdown() {
            first_error.get_or_insert(HostError::Container(errors));
        }
        tracing::debug!("host shut down");

        first_error.map_or(Ok(()), Err)
    }

    fn mount_boxed(&mut self, key: String, component: Box<dyn Component>) -> Result<(), HostError> {
        if self.components.contains_key(&key) {
            return Err(HostError::DuplicateKey(key));
        }
        if let Err(source) = component.attach(&self.container) {
            return Err(HostError::Component { key, source });
        }

        tracing::debug!(key = %key, "component mounted");
        self.order.push(key.clone());
        self.components.insert(key, component);
        Ok(())
    }

    fn unmount_all(&mut self) -> Option<HostError> {
        let mut first_error = None;
        while let Some(key) = self.order.last().cloned() {
            if let Err(err) = self.unmount(&key) {
                first_error.get_or_insert(err);
            }
        }
        first_error
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        if let Some(err) = self.unmount_all() {
            tracing::warn!(error = %err, "host dropped with component teardown failures");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Title;

    fn host() -> Host {
        let container = Container::new();
        container.add_scoped(|_| Title);
        Host::new(container)
    }

    #[test]
    fn duplicate_mount_is_rejected() {
        let mut host = host();
        let first = host.owning_component(|_: &Title| "a".to_string());
        let second = host.owning_component(|_: &Title| "b".to_string());

        host.mount("title", first).unwrap();
        let err = host.mount("title", second).unwrap_err();
        assert!(matches!(err, HostError::DuplicateKey(key) if key == "title"));
        assert_eq!(host.len(), 1);
    }

    #[test]
    fn unknown_keys_are_reported() {
        let mut host = host();
        assert!(matches!(host.render("missing"), Err(HostError::UnknownKey(_))));
        assert!(matches!(host.unmount("missing"), Err(HostError::UnknownKey(_))));
    }

    #[test]
    fn replace_rejects_duplicate_keys_without_changes() {
        let mut host = host();
        host.mount("a", host.owning_component(|_: &Title| "a".to_string()))
            .unwrap();

        let err = host
            .replace(["b", "b"], |_| OwningComponent::new(|_: &Title| String::new()))
            .unwrap_err();
        assert!(matches!(err, HostError::DuplicateKey(_)));
        assert_eq!(host.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn replace_orders_keys_as_given() {
        let mut host = host();
        host.replace(["a", "b"], |key| {
            let key = key.to_string();
            OwningComponent::new(move |_: &Title| key.clone())
        })
        .unwrap();
        host.replace(["c", "b", "a"], |key| {
            let key = key.to_string();
            OwningComponent::new(move |_: &Title| key.clone())
        })
        .unwrap();

        assert_eq!(host.keys().collect::<Vec<_>>(), vec!["c", "b", "a"]);
        assert_eq!(host.render_all().unwrap(), vec!["c", "b", "a"]);
    }
}
