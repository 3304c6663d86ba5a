//! Opaque handles to native script values.

use std::collections::HashMap;
use std::num::NonZeroU64;

/// Opaque reference to one value rooted inside a binding.
///
/// The value stays alive until the handle is released. Handles are only
/// meaningful to the binding that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeValueHandle(NonZeroU64);

impl NativeValueHandle {
    pub fn id(self) -> u64 {
        self.0.get()
    }
}

/// Slot map from handle to a backend-rooted value.
#[derive(Debug)]
pub struct HandleTable<V> {
    next: NonZeroU64,
    slots: HashMap<NativeValueHandle, V>,
}

impl<V> Default for HandleTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HandleTable<V> {
    pub fn new() -> Self {
        Self {
            next: NonZeroU64::MIN,
            slots: HashMap::new(),
        }
    }

    pub fn insert(&mut self, value: V) -> NativeValueHandle {
        let handle = NativeValueHandle(self.next);
        self.next = self.next.checked_add(1).unwrap_or(NonZeroU64::MIN);
        self.slots.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: NativeValueHandle) -> Option<&V> {
        self.slots.get(&handle)
    }

    pub fn remove(&mut self, handle: NativeValueHandle) -> Option<V> {
        self.slots.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove every slot, returning the values so the caller controls when
    /// they are dropped.
    pub fn drain(&mut self) -> Vec<V> {
        self.slots.drain().map(|(_, value)| value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");

        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.len(), 2);

        assert_eq!(table.remove(a), Some("a"));
        assert_eq!(table.get(a), None);
        assert_eq!(table.remove(a), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_handles_are_not_reused() {
        let mut table = HandleTable::new();
        let first = table.insert(1);
        table.remove(first);
        let second = table.insert(2);
        assert_ne!(first, second);
        assert_eq!(table.get(first), None);
    }

    #[test]
    fn test_drain_empties_table() {
        let mut table = HandleTable::new();
        table.insert(1);
        table.insert(2);

        let mut values = table.drain();
        values.sort();
        assert_eq!(values, vec![1, 2]);
        assert!(table.is_empty());
    }
}
