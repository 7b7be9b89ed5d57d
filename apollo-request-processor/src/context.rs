use std::any::Any;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// The context value handed to the execution engine.
///
/// Values are stored and retrieved by their type. The context is cheap to clone and
/// every clone shares the same entries.
///
/// Any type that is `Clone`, `Send`, `Sync` and `'static` can be stored. Values are
/// cloned when retrieved. For types that are expensive to clone, wrap them
/// in an `Arc` before storing them.
#[derive(Clone, Default)]
pub struct Context {
    entries: Arc<DashMap<TypeId, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value from the context by type.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    /// Inserts a value into the context.
    /// If a value of the same type already exists, it will be overwritten.
    pub fn insert<T: Clone + Send + Sync + 'static>(&self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Removes a value from the context, returning it if it was present.
    pub fn remove<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|(_, value)| value.downcast_ref::<T>().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("entries", &self.entries.len())
            .finish()
    }
}
