//! Components a [`Host`](crate::host::Host) can mount.

use warden_container::container::Container;
use warden_owner::error::OwnerError;
use warden_owner::owner::{Releasable, ReusePolicy, ScopeOwner};

/// A mountable unit with an attach/render/detach lifecycle.
///
/// The host calls [`attach`](Self::attach) once when mounting,
/// [`render`](Self::render) any number of times while mounted, and
/// [`detach`](Self::detach) exactly once when unmounting.
pub trait Component: Send + Sync {
    /// Connects the component to the host's container.
    ///
    /// # Errors
    ///
    /// Returns an error if the component cannot be attached.
    fn attach(&self, container: &Container) -> Result<(), OwnerError>;

    /// Produces the component's output.
    ///
    /// # Errors
    ///
    /// Returns an error if the component's services are unavailable.
    fn render(&self) -> Result<String, OwnerError>;

    /// Tears the component down.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown reported failures. The component is
    /// detached regardless.
    fn detach(&self) -> Result<(), OwnerError>;
}

type RenderFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// A component that owns a scope and renders from one scoped service.
///
/// The service is resolved on first render and kept until the component is
/// detached, at which point the scope, and every releasable service created
/// through it, is released.
///
/// # Example
///
/// ```
/// use warden_container::container::Container;
/// use warden_host::component::{Component, OwningComponent};
///
/// struct Greeter { name: &'static str }
///
/// let container = Container::new();
/// container.add_scoped(|_| Greeter { name: "world" });
///
/// let component = OwningComponent::new(|greeter: &Greeter| format!("hello {}", greeter.name));
/// component.attach(&container).unwrap();
/// assert_eq!(component.render().unwrap(), "hello world");
/// component.detach().unwrap();
/// ```
pub struct OwningComponent<T: Send + Sync + 'static> {
    owner: ScopeOwner<Container, T>,
    render: RenderFn<T>,
}

impl<T: Send + Sync + 'static> OwningComponent<T> {
    /// Creates a component with a default owner.
    pub fn new(render: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self::with_owner(ScopeOwner::new(), render)
    }

    /// Creates a component whose owner uses `policy` after release.
    pub fn with_policy(
        policy: ReusePolicy,
        render: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        Self::with_owner(ScopeOwner::builder().reuse_policy(policy).build(), render)
    }

    /// Creates a component around a preconfigured owner.
    pub fn with_owner(
        owner: ScopeOwner<Container, T>,
        render: impl Fn(&T) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            owner,
            render: Box::new(render),
        }
    }

    /// Returns the component's scope owner.
    pub fn owner(&self) -> &ScopeOwner<Container, T> {
        &self.owner
    }
}

impl<T: Send + Sync + 'static> core::fmt::Debug for OwningComponent<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OwningComponent")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Component for OwningComponent<T> {
    fn attach(&self, container: &Container) -> Result<(), OwnerError> {
        self.owner.bind_container(container.clone())
    }

    fn render(&self) -> Result<String, OwnerError> {
        let service = self.owner.service()?;
        Ok((self.render)(&service))
    }

    fn detach(&self) -> Result<(), OwnerError> {
        Releasable::release(&self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Label(&'static str);

    #[test]
    fn render_before_attach_fails() {
        let component = OwningComponent::new(|label: &Label| label.0.to_string());
        assert!(matches!(
            component.render(),
            Err(OwnerError::NotInitialized)
        ));
    }

    #[test]
    fn render_uses_the_memoized_service() {
        let container = Container::new();
        container.add_scoped(|_| Label("title"));

        let component = OwningComponent::new(|label: &Label| label.0.to_uppercase());
        component.attach(&container).unwrap();

        assert_eq!(component.render().unwrap(), "TITLE");
        assert_eq!(component.render().unwrap(), "TITLE");
        assert!(component.owner().has_service());

        component.detach().unwrap();
        assert!(!component.owner().has_scope());
    }

    #[test]
    fn policy_is_applied_to_the_owner() {
        let container = Container::new();
        container.add_scoped(|_| Label("once"));

        let component =
            OwningComponent::with_policy(ReusePolicy::Forbid, |label: &Label| label.0.into());
        component.attach(&container).unwrap();
        component.render().unwrap();
        component.detach().unwrap();

        assert!(matches!(
            component.render(),
            Err(OwnerError::AlreadyReleased)
        ));
    }
}
