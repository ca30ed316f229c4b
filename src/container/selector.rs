use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::container::registration::Registration;
use crate::container::types::TypeToken;

type Predicate = Arc<dyn Fn(&Registration) -> bool + Send + Sync>;

/// Predicate over registrations that yields beans viewable as `Arc<T>`.
///
/// Every selector only accepts registrations that can provide `T`, so a match can always
/// be delivered as the requested type. `types()` is a hint the container uses to narrow
/// the scan; `test()` stays authoritative.
pub struct Selector<T: ?Sized + 'static> {
    predicate: Predicate,
    types: IndexSet<TypeToken>,
    description: Arc<str>,
    _target: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + 'static> Selector<T> {
    /// Matches registrations whose declared or provided types include `T`.
    pub fn for_type() -> Self {
        let token = TypeToken::of::<T>();
        Self {
            predicate: Arc::new(move |registration: &Registration| {
                registration.can_provide(&token)
            }),
            types: IndexSet::from([token]),
            description: Arc::from(format!("type {token}")),
            _target: PhantomData,
        }
    }

    /// Matches the registration known as `name`, either by name or alias.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("type {} named {name}", TypeToken::of::<T>());
        Self::for_type()
            .and(move |registration| registration.is_known_as(&name))
            .described_as(description)
    }

    /// Matches providers of `T` accepted by `predicate`.
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&Registration) -> bool + Send + Sync + 'static,
    {
        let description = format!("type {} matching a predicate", TypeToken::of::<T>());
        Self::for_type().and(predicate).described_as(description)
    }

    pub fn and<F>(self, predicate: F) -> Self
    where
        F: Fn(&Registration) -> bool + Send + Sync + 'static,
    {
        let inner = self.predicate;
        Self {
            predicate: Arc::new(move |registration: &Registration| {
                inner(registration) && predicate(registration)
            }),
            types: self.types,
            description: self.description,
            _target: PhantomData,
        }
    }

    pub fn or(self, other: Selector<T>) -> Self {
        let left = self.predicate;
        let right = other.predicate;
        let mut types = self.types;
        types.extend(other.types);
        Self {
            predicate: Arc::new(move |registration: &Registration| {
                left(registration) || right(registration)
            }),
            types,
            description: Arc::from(format!("{} or {}", self.description, other.description)),
            _target: PhantomData,
        }
    }

    pub fn described_as(mut self, description: impl Into<String>) -> Self {
        self.description = Arc::from(description.into());
        self
    }

    pub fn test(&self, registration: &Registration) -> bool {
        (self.predicate)(registration)
    }

    pub fn types(&self) -> &IndexSet<TypeToken> {
        &self.types
    }

    pub fn describe(&self) -> &str {
        &self.description
    }
}

impl<T: ?Sized + 'static> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            types: self.types.clone(),
            description: Arc::clone(&self.description),
            _target: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("description", &self.description)
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}
