#![doc = include_str!("README.md")]
mod condition;
#[allow(clippy::module_inception)]
mod container;
mod environment;
mod error;
mod holder;
mod logger;
mod registration;
mod registry;
mod selection;
mod selector;
mod types;

#[doc(inline)]
pub use condition::{Condition, ConditionContext, ConditionOutcome};

#[doc(inline)]
pub use container::Container;

#[doc(inline)]
pub use environment::Environment;

#[doc(inline)]
pub use error::{ContainerError, ContainerResult};

// Used in other modules
#[doc(inline)]
pub use logger::LOGGER;

#[doc(inline)]
pub use registration::{via, via_type, Registration, RegistrationBuilder};

#[doc(inline)]
pub use registry::{Registrar, Registry, RegistryExt};

#[doc(inline)]
pub use selection::Selection;

#[doc(inline)]
pub use selector::Selector;

#[doc(inline)]
pub use types::{DynBean, InstanceSupplier, Origin, TypeToken, SINGLETON};
