use crate::container::condition::Condition;
use crate::container::error::ContainerResult;
use crate::container::registration::{Registration, RegistrationBuilder};

/// Write side of the container.
pub trait Registry {
    /// Adds `registration` when every condition matches; a name collision is an error.
    fn register_with(
        &self,
        registration: Registration,
        conditions: &[Condition],
    ) -> ContainerResult<()>;

    /// Conjunction of `conditions` in this registry's context; empty is `true`.
    fn conditions_match(&self, conditions: &[Condition]) -> ContainerResult<bool>;
}

/// Conveniences available on every [`Registry`], trait objects included.
pub trait RegistryExt: Registry {
    fn register(&self, registration: Registration) -> ContainerResult<()> {
        self.register_with(registration, &[])
    }

    /// Builds the registration with `build` and registers it.
    fn register_using<F>(&self, build: F, conditions: &[Condition]) -> ContainerResult<()>
    where
        F: FnOnce(&mut RegistrationBuilder),
    {
        self.register_with(Registration::of(build)?, conditions)
    }

    /// Applies the registrar produced by `supplier`.
    ///
    /// The conditions are evaluated first; when they do not match, `supplier` is never called.
    fn register_from<S, R>(&self, supplier: S, conditions: &[Condition]) -> ContainerResult<()>
    where
        S: FnOnce() -> R,
        R: Registrar,
    {
        if !self.conditions_match(conditions)? {
            return Ok(());
        }
        supplier().apply(self.as_dyn())
    }

    #[doc(hidden)]
    fn as_dyn(&self) -> &dyn Registry;
}

impl<T: Registry> RegistryExt for T {
    fn as_dyn(&self) -> &dyn Registry {
        self
    }
}

impl RegistryExt for dyn Registry + '_ {
    fn as_dyn(&self) -> &dyn Registry {
        self
    }
}

/// Applies a batch of registrations to a registry.
pub trait Registrar {
    fn apply(&self, registry: &dyn Registry) -> ContainerResult<()>;
}

impl<F> Registrar for F
where
    F: Fn(&dyn Registry) -> ContainerResult<()>,
{
    fn apply(&self, registry: &dyn Registry) -> ContainerResult<()> {
        self(registry)
    }
}

impl Registrar for Vec<Box<dyn Registrar>> {
    fn apply(&self, registry: &dyn Registry) -> ContainerResult<()> {
        self.iter().try_for_each(|registrar| registrar.apply(registry))
    }
}
