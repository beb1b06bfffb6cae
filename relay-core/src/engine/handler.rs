//! Handler trait and the per-dispatch scratch space

use crate::event::Event;
use anyhow::Result;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Something that reacts to events
///
/// Handlers run on the single dispatch thread, one after another, so they
/// must not block for long. Returning an error (or panicking) skips the rest
/// of the chain for the current event only.
pub trait Handler: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    fn handle(&self, event: &Event, scratch: &mut Scratch) -> Result<()>;
}

/// Identity of one registration, returned by `register`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

impl HandlerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// Key/value space shared by the handlers of one dispatch
///
/// A fresh, empty scratch is created for every event. Values are typed: an
/// upstream handler can leave an `OrderReq` or a derived price for the next
/// one, which reads it back with `get::<T>`.
#[derive(Default)]
pub struct Scratch {
    values: HashMap<String, Box<dyn Any + Send>>,
    ended: bool,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning true if a previous value was replaced
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) -> bool {
        self.values.insert(key.into(), Box::new(value)).is_some()
    }

    /// None when the key is absent or holds another type
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Take the value out; a value of another type is left in place
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.values.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.values
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stop the chain after the current handler without reporting a failure
    pub fn end_chain(&mut self) {
        self.ended = true;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl fmt::Debug for Scratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Scratch")
            .field("keys", &keys)
            .field("ended", &self.ended)
            .finish()
    }
}

/// Adapts a closure into a [`Handler`]
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Event, &mut Scratch) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Convenience for registering: wraps the closure in an `Arc<dyn Handler>`
    pub fn shared(name: impl Into<String>, f: F) -> Arc<dyn Handler>
    where
        F: 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Event, &mut Scratch) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &Event, scratch: &mut Scratch) -> Result<()> {
        (self.f)(event, scratch)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}
