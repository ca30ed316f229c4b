use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::{IndexMap, IndexSet};
use serde_json::json;

use crate::container::condition::{first_mismatch, Condition, ConditionContext};
use crate::container::environment::Environment;
use crate::container::error::{ContainerError, ContainerResult};
use crate::container::holder::BeanHolder;
use crate::container::logger::LOGGER;
use crate::container::registration::Registration;
use crate::container::registry::Registry;
use crate::container::selection::Selection;
use crate::container::selector::Selector;
use crate::container::types::TypeToken;

/// Registry plus the read side: selection and lazy instantiation.
///
/// Cloning yields another handle to the same store. Holders keep only a weak reference
/// back, so dropping the last handle tears the container down.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    environment: Environment,
    store: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    holders: IndexMap<Arc<str>, Arc<BeanHolder>>,
    aliases: HashMap<Arc<str>, Arc<str>>,
    by_type: HashMap<TypeToken, Vec<usize>>,
}

impl Store {
    fn is_taken(&self, identifier: &str) -> bool {
        self.holders.contains_key(identifier) || self.aliases.contains_key(identifier)
    }

    fn holder(&self, identifier: &str) -> Option<&Arc<BeanHolder>> {
        match self.aliases.get(identifier) {
            Some(name) => self.holders.get(name),
            None => self.holders.get(identifier),
        }
    }

    /// Holders that may match, in registration order; all of them when `types` is empty.
    fn candidates(&self, types: &IndexSet<TypeToken>) -> Vec<Arc<BeanHolder>> {
        if types.is_empty() {
            return self.holders.values().cloned().collect();
        }

        let indexes: BTreeSet<usize> = types
            .iter()
            .filter_map(|token| self.by_type.get(token))
            .flatten()
            .copied()
            .collect();
        indexes
            .into_iter()
            .filter_map(|index| self.holders.get_index(index))
            .map(|(_, holder)| Arc::clone(holder))
            .collect()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_environment(Environment::default())
    }

    pub fn with_environment(environment: Environment) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                environment,
                store: RwLock::new(Store::default()),
            }),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    /// Snapshot of the registrations matching `selector`; nothing is instantiated here.
    pub fn select<T: ?Sized + 'static>(&self, selector: &Selector<T>) -> Selection<Arc<T>> {
        let candidates = self.read_store().candidates(selector.types());

        let mut selection = Selection::new(selector.describe());
        for holder in candidates {
            if !selector.test(holder.registration()) {
                continue;
            }
            let name: Arc<str> = Arc::from(holder.name());
            selection.push(name, move || holder.resolve::<T>());
        }
        selection
    }

    /// Shorthand for selecting the single provider of `T`.
    pub fn get<T: ?Sized + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.select(&Selector::<T>::for_type()).get()
    }

    /// Shorthand for selecting the provider of `T` known as `name`.
    pub fn get_named<T: ?Sized + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.select(&Selector::<T>::named(name)).get()
    }

    pub fn contains_name(&self, identifier: &str) -> bool {
        self.read_store().is_taken(identifier)
    }

    /// Looks a registration up by name or alias.
    pub fn registration(&self, identifier: &str) -> Option<Registration> {
        self.read_store()
            .holder(identifier)
            .map(|holder| holder.registration().clone())
    }

    pub fn is_instantiated(&self, identifier: &str) -> bool {
        self.read_store()
            .holder(identifier)
            .is_some_and(|holder| holder.is_instantiated())
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read_store()
            .holders
            .keys()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_store().holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_store().holders.is_empty()
    }

    /// Instantiates every registered bean in registration order, stopping at the first error.
    pub fn preinstantiate(&self) -> ContainerResult<()> {
        let holders: Vec<Arc<BeanHolder>> = self.read_store().holders.values().cloned().collect();
        for holder in holders {
            holder.instance()?;
        }
        Ok(())
    }

    fn read_store(&self) -> RwLockReadGuard<'_, Store> {
        self.inner
            .store
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, Store> {
        self.inner
            .store
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Registry for Container {
    fn register_with(
        &self,
        registration: Registration,
        conditions: &[Condition],
    ) -> ContainerResult<()> {
        let context = ConditionContext::new(self);
        if let Some(outcome) = first_mismatch(conditions, &context)? {
            LOGGER.debug(format!(
                "Skipped bean {}: {}",
                registration.name(),
                outcome.message().unwrap_or("condition did not match")
            ));
            return Ok(());
        }

        let name: Arc<str> = Arc::from(registration.name());
        let fields = json!({
            "scope": registration.scope(),
            "type": registration.declared_type().name(),
            "aliases": registration.aliases().iter().collect::<Vec<_>>(),
        });
        let mut store = self.write_store();
        if let Some(taken) = registration.identifiers().find(|id| store.is_taken(id)) {
            return Err(ContainerError::RegistrationConflict {
                name: taken.to_owned(),
            });
        }

        let index = store.holders.len();
        for token in registration.provided_types() {
            store.by_type.entry(token).or_default().push(index);
        }
        for alias in registration.aliases() {
            if alias.as_str() != name.as_ref() {
                store.aliases.insert(Arc::from(alias.as_str()), Arc::clone(&name));
            }
        }
        let holder = BeanHolder::new(registration, Arc::downgrade(&self.inner));
        store.holders.insert(Arc::clone(&name), Arc::new(holder));
        drop(store);

        LOGGER.debug_with(format!("Registered bean {name}"), fields);
        Ok(())
    }

    fn conditions_match(&self, conditions: &[Condition]) -> ContainerResult<bool> {
        let context = ConditionContext::new(self);
        Ok(first_mismatch(conditions, &context)?.is_none())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("environment", &self.inner.environment)
            .field("beans", &self.names())
            .finish()
    }
}
