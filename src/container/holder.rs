use std::cell::RefCell;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::container::container::{Container, ContainerInner};
use crate::container::error::{ContainerError, ContainerResult};
use crate::container::logger::LOGGER;
use crate::container::registration::Registration;
use crate::container::types::{DynBean, TypeToken};

thread_local! {
    // Holders whose supplier is running on this thread, outermost first.
    static IN_CREATION: RefCell<Vec<(usize, Arc<str>)>> = const { RefCell::new(Vec::new()) };
}

/// Per-registration cell that instantiates its bean at most once.
///
/// The first caller runs the supplier while concurrent callers of the same holder block on
/// the cell; other holders are unaffected. A failed supplier leaves the cell empty, so a
/// later access runs it again.
pub(crate) struct BeanHolder {
    registration: Registration,
    container: Weak<ContainerInner>,
    instance: OnceCell<DynBean>,
}

impl BeanHolder {
    pub(crate) fn new(registration: Registration, container: Weak<ContainerInner>) -> Self {
        Self {
            registration,
            container,
            instance: OnceCell::new(),
        }
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn name(&self) -> &str {
        self.registration.name()
    }

    pub fn is_instantiated(&self) -> bool {
        self.instance.get().is_some()
    }

    /// The shared bean, instantiating it on first use.
    pub fn instance(&self) -> ContainerResult<DynBean> {
        if let Some(bean) = self.instance.get() {
            return Ok(Arc::clone(bean));
        }

        let _guard = CreationGuard::enter(self)?;
        self.instance
            .get_or_try_init(|| self.create())
            .map(Arc::clone)
    }

    /// The bean viewed as `Arc<T>`.
    pub fn resolve<T: ?Sized + 'static>(&self) -> ContainerResult<Arc<T>> {
        let bean = self.instance()?;
        self.registration
            .view::<T>(&bean)
            .ok_or_else(|| ContainerError::TypeMismatch {
                name: self.name().to_owned(),
                expected: TypeToken::of::<T>().name().to_owned(),
            })
    }

    fn create(&self) -> ContainerResult<DynBean> {
        let container = match self.container.upgrade() {
            Some(inner) => Container { inner },
            None => {
                return Err(ContainerError::ContainerDropped {
                    name: self.name().to_owned(),
                });
            }
        };

        let bean = (self.registration.instance_supplier())(&container).map_err(|err| match err {
            ContainerError::CircularDependency { .. } => err,
            other => ContainerError::InstantiationFailed {
                name: self.name().to_owned(),
                reason: other.to_string(),
            },
        })?;

        LOGGER.debug(format!(
            "Instantiated bean {} ({})",
            self.name(),
            self.registration.declared_type()
        ));
        Ok(bean)
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }
}

struct CreationGuard;

impl CreationGuard {
    fn enter(holder: &BeanHolder) -> ContainerResult<Self> {
        let key = holder.key();
        IN_CREATION.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|(entry, _)| *entry == key) {
                let mut path: Vec<String> = stack[start..]
                    .iter()
                    .map(|(_, name)| name.to_string())
                    .collect();
                path.push(holder.name().to_owned());
                return Err(ContainerError::CircularDependency { path });
            }
            stack.push((key, Arc::from(holder.name())));
            Ok(CreationGuard)
        })
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        IN_CREATION.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
