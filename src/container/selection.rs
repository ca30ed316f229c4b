use std::fmt;
use std::sync::Arc;

use crate::container::error::{ContainerError, ContainerResult};

type Resolver<T> = Arc<dyn Fn() -> ContainerResult<T> + Send + Sync>;

struct Candidate<T> {
    name: Arc<str>,
    resolve: Resolver<T>,
}

impl<T> Clone for Candidate<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            resolve: Arc::clone(&self.resolve),
        }
    }
}

/// Lazy result of a container query.
///
/// The candidates are fixed when the selection is created; nothing is instantiated until
/// one of the terminal methods (`get`, `get_optional`, `get_all`) runs. Cardinality can be
/// inspected up front without touching any factory.
pub struct Selection<T> {
    requested: Arc<str>,
    candidates: Vec<Candidate<T>>,
}

impl<T: 'static> Selection<T> {
    pub(crate) fn new(requested: impl Into<String>) -> Self {
        Self {
            requested: Arc::from(requested.into()),
            candidates: Vec::new(),
        }
    }

    pub(crate) fn push<F>(&mut self, name: Arc<str>, resolve: F)
    where
        F: Fn() -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.candidates.push(Candidate {
            name,
            resolve: Arc::new(resolve),
        });
    }

    /// The one matching bean; zero or several matches are errors.
    pub fn get(&self) -> ContainerResult<T> {
        match self.candidates.as_slice() {
            [] => Err(ContainerError::NoSuchBean {
                requested: self.requested.to_string(),
            }),
            [single] => (single.resolve)(),
            _ => Err(self.ambiguous()),
        }
    }

    /// Like [`Selection::get`], but an empty selection yields `None`.
    pub fn get_optional(&self) -> ContainerResult<Option<T>> {
        match self.candidates.as_slice() {
            [] => Ok(None),
            [single] => (single.resolve)().map(Some),
            _ => Err(self.ambiguous()),
        }
    }

    /// Resolves every candidate in registration order, stopping at the first failure.
    pub fn get_all(&self) -> ContainerResult<Vec<T>> {
        self.candidates
            .iter()
            .map(|candidate| (candidate.resolve)())
            .collect()
    }

    pub fn map<U, F>(self, f: F) -> Selection<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.remap(move |value| Ok(f(value)))
    }

    /// Fallible variant of [`Selection::map`]; an `Err` from `f` surfaces at the terminal call.
    pub fn try_map<U, F>(self, f: F) -> Selection<U>
    where
        U: 'static,
        F: Fn(T) -> ContainerResult<U> + Send + Sync + 'static,
    {
        self.remap(f)
    }

    fn remap<U, F>(self, f: F) -> Selection<U>
    where
        U: 'static,
        F: Fn(T) -> ContainerResult<U> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let candidates = self
            .candidates
            .into_iter()
            .map(|candidate| {
                let inner = candidate.resolve;
                let f = Arc::clone(&f);
                Candidate {
                    name: candidate.name,
                    resolve: Arc::new(move || inner().and_then(|value| f(value))) as Resolver<U>,
                }
            })
            .collect();
        Selection {
            requested: self.requested,
            candidates,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|candidate| candidate.name.as_ref())
    }

    pub fn requested(&self) -> &str {
        &self.requested
    }

    fn ambiguous(&self) -> ContainerError {
        ContainerError::NoUniqueBean {
            requested: self.requested.to_string(),
            candidates: self.names().map(str::to_owned).collect(),
        }
    }
}

impl<T> Clone for Selection<T> {
    fn clone(&self) -> Self {
        Self {
            requested: Arc::clone(&self.requested),
            candidates: self.candidates.clone(),
        }
    }
}

impl<T> fmt::Debug for Selection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("requested", &self.requested)
            .field(
                "candidates",
                &self
                    .candidates
                    .iter()
                    .map(|candidate| candidate.name.as_ref())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
