//! Handler registry
//!
//! Registrations are bucketed by `(EventKind, topic)`. Within a bucket handlers
//! run by descending priority, ties broken by registration order. The chain for
//! an event is its exact topic bucket followed by the [`ALL_TOPICS`] bucket.
//!
//! Lookups return an owned snapshot so the loop can iterate a chain while a
//! handler registers or unregisters others.

use super::handler::{Handler, HandlerId};
use crate::event::{EventKind, ALL_TOPICS};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    handler: Arc<dyn Handler>,
    priority: i32,
}

/// Ordered snapshot of the handlers that should see one event
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Handler>> {
        self.handlers.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.name().to_string()).collect()
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[inline]
fn same_handler(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

pub struct HandlerRegistry {
    buckets: RwLock<HashMap<(EventKind, String), Vec<Registration>>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a registration; registering the same handler twice yields two entries
    pub fn register(
        &self,
        handler: Arc<dyn Handler>,
        kind: EventKind,
        topic: &str,
        priority: i32,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry((kind, topic.to_string())).or_default();

        // Ids grow monotonically, so landing after equal priorities keeps FIFO ties
        let pos = bucket.partition_point(|r| r.priority >= priority);
        tracing::debug!(
            handler = handler.name(),
            %kind,
            topic,
            priority,
            %id,
            "Registered handler"
        );
        bucket.insert(
            pos,
            Registration {
                id,
                handler,
                priority,
            },
        );
        id
    }

    /// Remove every registration of `handler` in the `(kind, topic)` bucket
    ///
    /// Handlers are matched by pointer identity. Returns the number removed.
    pub fn unregister(&self, handler: &Arc<dyn Handler>, kind: EventKind, topic: &str) -> usize {
        let mut buckets = self.buckets.write();
        let key = (kind, topic.to_string());
        let Some(bucket) = buckets.get_mut(&key) else {
            return 0;
        };

        let before = bucket.len();
        bucket.retain(|r| !same_handler(&r.handler, handler));
        let removed = before - bucket.len();
        if bucket.is_empty() {
            buckets.remove(&key);
        }

        if removed > 0 {
            tracing::debug!(handler = handler.name(), %kind, topic, removed, "Unregistered handler");
        }
        removed
    }

    /// Remove exactly one registration by id
    pub fn unregister_id(&self, id: HandlerId) -> bool {
        let mut buckets = self.buckets.write();
        let mut emptied = None;
        let mut found = false;

        for (key, bucket) in buckets.iter_mut() {
            if let Some(pos) = bucket.iter().position(|r| r.id == id) {
                bucket.remove(pos);
                found = true;
                if bucket.is_empty() {
                    emptied = Some(key.clone());
                }
                break;
            }
        }

        if let Some(key) = emptied {
            buckets.remove(&key);
        }
        found
    }

    /// Snapshot of the handlers for an event of `kind` published on `topic`
    pub fn chain_for(&self, kind: EventKind, topic: &str) -> HandlerChain {
        let buckets = self.buckets.read();
        let mut handlers = Vec::new();

        if let Some(bucket) = buckets.get(&(kind, topic.to_string())) {
            handlers.extend(bucket.iter().map(|r| Arc::clone(&r.handler)));
        }
        if topic != ALL_TOPICS {
            if let Some(bucket) = buckets.get(&(kind, ALL_TOPICS.to_string())) {
                handlers.extend(bucket.iter().map(|r| Arc::clone(&r.handler)));
            }
        }

        HandlerChain { handlers }
    }

    /// Topics with at least one registration for `kind`, sorted
    pub fn topics(&self, kind: EventKind) -> Vec<String> {
        let buckets = self.buckets.read();
        let mut topics: Vec<String> = buckets
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, topic)| topic.clone())
            .collect();
        topics.sort();
        topics
    }

    /// Total number of registrations
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
