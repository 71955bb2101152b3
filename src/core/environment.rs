use std::collections::HashMap;
use std::iter::FromIterator;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Value;
#[cfg(test)]
use super::{RefKind, Result, ToyError};

/// A lexical scope: a mutable name to value mapping plus an optional
/// enclosing scope.
///
/// Frames only ever point outward, never at their children, so every chain
/// is finite and ends at the root frame. Frames are shared (`Arc`) between
/// the closures and async tasks that capture them, and writes through any
/// handle are visible to all of them.
///
/// ```notrust
///     +----------------+        +----------------+
///     | call frame     |        | root           |
///     | =              |        | =              |
///     | values: {...}  |        | values: {...}  |
///     | enclosing: ----+------->| enclosing: None|
///     +----------------+        +----------------+
/// ```
#[derive(Debug, Default)]
pub struct Frame {
    values: RwLock<HashMap<String, Value>>,
    enclosing: Option<Arc<Frame>>,
}

impl Frame {
    /// Creates a parentless frame.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Frame::default())
    }

    /// Creates an empty frame enclosed by `parent`.
    #[must_use]
    pub fn child(parent: &Arc<Frame>) -> Arc<Self> {
        Arc::new(Frame {
            values: RwLock::new(HashMap::new()),
            enclosing: Some(Arc::clone(parent)),
        })
    }

    /// Binds `name` to `value` in this frame, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.write().insert(name.into(), value);
    }

    /// Returns the value of `name` in the first frame it's found in, walking
    /// outward from `self`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.walker().find_map(|frame| frame.read().get(name).cloned())
    }

    /// Like `lookup`, but a miss is an `UndefinedReference` error.
    #[cfg(test)]
    pub(crate) fn get(&self, name: &str) -> Result<Value> {
        self.lookup(name)
            .ok_or_else(|| ToyError::UndefinedReference(name.to_owned(), RefKind::Declared))
    }

    /// Looks `name` up in this frame only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.read().get(name).cloned()
    }

    #[cfg(test)]
    pub(crate) fn contains_local(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    #[cfg(test)]
    pub(crate) fn is_root(&self) -> bool {
        self.enclosing.is_none()
    }

    /// Number of frames in the chain, `self` included.
    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.walker().count()
    }

    /// The names bound directly in this frame, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn walker(&self) -> FrameWalker<'_> {
        FrameWalker {
            current: Some(self),
        }
    }

    // A panic while a lock is held can only come from a bug in a builtin;
    // the map itself is still consistent, so keep using it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Value>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Value>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Constructs a parentless frame from an iterator.
impl FromIterator<(String, Value)> for Frame {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (String, Value)>,
    {
        Frame {
            values: RwLock::new(iter.into_iter().collect()),
            enclosing: None,
        }
    }
}

struct FrameWalker<'a> {
    current: Option<&'a Frame>,
}

impl<'a> Iterator for FrameWalker<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.current;
        self.current = self.current.and_then(|f| f.enclosing.as_deref());
        frame
    }
}
