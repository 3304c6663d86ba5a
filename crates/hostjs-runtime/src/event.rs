//! Named event callbacks between script and host.

use crate::value::ScriptValue;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// Host callback receiving the event parameters
pub type EventCallback = Arc<dyn Fn(&[ScriptValue]) + Send + Sync>;

/// Event name to callback map. At most one callback per name; registering
/// again replaces the previous one.
#[derive(Default)]
pub struct EventBridge {
    callbacks: DashMap<String, EventCallback>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, callback: EventCallback) {
        self.callbacks.insert(name.into(), callback);
    }

    /// Returns true if a callback was registered
    pub fn remove(&self, name: &str) -> bool {
        self.callbacks.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    /// Invoke the callback for `name` on the calling thread.
    ///
    /// Returns false without doing anything if no callback is registered.
    pub fn trigger(&self, name: &str, params: &[ScriptValue]) -> bool {
        // Clone out so no map lock is held while the callback runs.
        let callback = self.callbacks.get(name).map(|entry| entry.value().clone());
        match callback {
            Some(callback) => {
                trace!(event = name, params = params.len(), "trigger");
                callback(params);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_trigger_unregistered_is_noop() {
        let bridge = EventBridge::new();
        assert!(!bridge.trigger("missing", &[]));
    }

    #[test]
    fn test_set_trigger_remove() {
        let bridge = EventBridge::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        bridge.set(
            "done",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(bridge.trigger("done", &[]));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(bridge.remove("done"));
        assert!(!bridge.trigger("done", &[]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!bridge.remove("done"));
    }

    #[test]
    fn test_reregistering_replaces() {
        let bridge = EventBridge::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = first.clone();
        bridge.set("e", Arc::new(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        let s = second.clone();
        bridge.set("e", Arc::new(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.trigger("e", &[]);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(bridge.contains("e"));
    }

    #[test]
    fn test_callback_can_remove_itself() {
        let bridge = Arc::new(EventBridge::new());
        let inner = Arc::downgrade(&bridge);
        bridge.set(
            "once",
            Arc::new(move |_| {
                if let Some(bridge) = inner.upgrade() {
                    bridge.remove("once");
                }
            }),
        );

        assert!(bridge.trigger("once", &[]));
        assert!(!bridge.contains("once"));
        assert!(!bridge.trigger("once", &[]));
    }
}
