//! Lookup of named collaborators (endpoints, dictionaries) at execution time.

use std::any::{type_name, Any};
use std::fmt;
use indexmap::IndexMap;

use crate::error::{CourierError, Result};
use crate::runtime::TestContext;

/// Object-safe registry of named values.
pub trait ReferenceResolver: Send + Sync {
    fn lookup(&self, name: &str) -> Option<&(dyn Any + Send + Sync)>;

    /// All bound names in registration order.
    fn names(&self) -> Vec<String>;
}

/// Typed access on top of [`ReferenceResolver`].
pub trait ReferenceResolverExt {
    /// Resolve `name` as a `T`.
    ///
    /// # Errors
    /// Returns `ReferenceNotFound` when the name is unbound or bound to another type.
    fn resolve<T: Clone + 'static>(&self, name: &str) -> Result<T>;

    /// Every bound value of type `T`, keyed by name.
    fn resolve_all<T: Clone + 'static>(&self) -> IndexMap<String, T>;

    fn is_resolvable(&self, name: &str) -> bool;
}

impl<R: ReferenceResolver + ?Sized> ReferenceResolverExt for R {
    fn resolve<T: Clone + 'static>(&self, name: &str) -> Result<T> {
        self.lookup(name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| CourierError::ReferenceNotFound {
                name: name.to_string(),
                type_name: type_name::<T>(),
            })
    }

    fn resolve_all<T: Clone + 'static>(&self) -> IndexMap<String, T> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let value = self.lookup(&name)?.downcast_ref::<T>()?.clone();
                Some((name, value))
            })
            .collect()
    }

    fn is_resolvable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// Map-backed resolver.
#[derive(Default)]
pub struct SimpleReferenceResolver {
    entries: IndexMap<String, Box<dyn Any + Send + Sync>>,
}

impl SimpleReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name`, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Any + Send + Sync) {
        self.entries.insert(name.into(), Box::new(value));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Any + Send + Sync) -> Self {
        self.bind(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReferenceResolver for SimpleReferenceResolver {
    fn lookup(&self, name: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.entries.get(name).map(|value| value.as_ref())
    }

    fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

impl fmt::Debug for SimpleReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleReferenceResolver")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A collaborator given either directly or by name.
#[derive(Clone)]
pub enum Reference<T> {
    Direct(T),
    Named(String),
}

impl<T: Clone + 'static> Reference<T> {
    pub fn named(name: impl Into<String>) -> Self {
        Reference::Named(name.into())
    }

    /// Produce the referenced value, consulting the context's resolver for names.
    pub fn resolve(&self, context: &TestContext) -> Result<T> {
        match self {
            Reference::Direct(value) => Ok(value.clone()),
            Reference::Named(name) => context.reference_resolver().resolve::<T>(name),
        }
    }
}

impl<T> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Direct(_) => f.write_str("Direct(..)"),
            Reference::Named(name) => write!(f, "Named({})", name),
        }
    }
}
