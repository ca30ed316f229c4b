use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::container::container::Container;
use crate::container::error::ContainerResult;

/// Type-erased bean instance as stored by a holder.
pub type DynBean = Arc<dyn Any + Send + Sync>;

/// Scope tag given to registrations that do not set one.
pub const SINGLETON: &str = "singleton";

/// Erased factory: builds the concrete bean, resolving dependencies through the container.
pub type InstanceSupplier = Arc<dyn Fn(&Container) -> ContainerResult<DynBean> + Send + Sync>;

/// Views an erased bean as `Arc<I>` for one declared type; the output box holds an `Arc<I>`.
pub(crate) type Upcast = Arc<dyn Fn(&DynBean) -> Option<Box<dyn Any>> + Send + Sync>;

/// Runtime descriptor of a declared type, usable for trait objects as well as concrete types.
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Canonical name; doubles as the default registration name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Opaque provenance marker attached to registrations and conditions.
///
/// The container stores and forwards it; interpreting it is up to diagnostics tooling.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    description: Arc<str>,
}

impl Origin {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Arc::from(description.into()),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl From<&str> for Origin {
    fn from(value: &str) -> Self {
        Origin::new(value)
    }
}

impl From<String> for Origin {
    fn from(value: String) -> Self {
        Origin::new(value)
    }
}
