//! Typed key/value Event Store for decoupled component communication.
//!
//! Architecture:
//! - Each key is a marker type implementing [`Channel`] (key string + payload type)
//! - set() stores the value under the key, then invokes every listener of `"<key>:set"`
//! - get() returns the last stored value, if any
//!
//! Callback order: FIFO (first-registered, first-called) within one event name.
//! Registering the same [`Listener`] handle twice does not duplicate delivery.
//!
//! Emission runs on a snapshot of the listener set taken after the value is
//! stored. No lock is held while listeners run, so a listener may freely
//! `set()` a different channel; that nested emission completes before the
//! outer `set()` returns. A nested `set()` on the channel that is currently
//! emitting only stores the value.

use indexmap::IndexMap;
use log::{trace, warn};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// A named, strongly typed slot in the store.
///
/// Implemented on zero-sized marker types, see [`crate::core::channels`].
pub trait Channel: 'static {
    /// Payload carried by `set()` and returned by `get()`.
    type Value: Clone + Send + Sync + 'static;

    /// Store key, e.g. `"timeline.uTime"`.
    const KEY: &'static str;

    /// Event name listeners are registered under: `"<KEY>:set"`.
    fn event_name() -> String {
        format!("{}:set", Self::KEY)
    }
}

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a listener handle. Shared by all clones of one [`Listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Callback handle with a stable identity.
///
/// Keep a clone around to `off()` it later.
pub struct Listener<T> {
    id: ListenerId,
    callback: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Listener<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            id: ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed)),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback directly (bypasses the store).
    pub fn call(&self, value: &T) {
        (self.callback)(value);
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id.0).finish()
    }
}

/// Type-erased callback
type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

type ValueMap = HashMap<&'static str, Box<dyn Any + Send + Sync>>;
type ListenerMap = HashMap<String, IndexMap<ListenerId, Callback>>;

#[derive(Default)]
struct Inner {
    values: RwLock<ValueMap>,
    listeners: RwLock<ListenerMap>,
    /// Keys whose listeners are running right now
    emitting: Mutex<HashSet<&'static str>>,
}

/// Removes the key from the emitting set even if a listener panics.
struct EmitGuard<'a> {
    inner: &'a Inner,
    key: &'static str,
}

impl Drop for EmitGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .emitting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.key);
    }
}

/// Keyed value store with per-event listener sets.
///
/// Cheap to clone: clones share the same values and listeners. Create one per
/// session and hand clones to every component that needs it.
#[derive(Clone, Default)]
pub struct EventStore {
    inner: Arc<Inner>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Subscription ==========

    /// Register `listener` for `C::event_name()`.
    ///
    /// Idempotent per listener identity.
    pub fn on<C: Channel>(&self, listener: &Listener<C::Value>) {
        let event = C::event_name();
        let mut listeners = self.inner.listeners.write().unwrap_or_else(|e| e.into_inner());
        let set = listeners.entry(event).or_default();
        if set.contains_key(&listener.id()) {
            trace!("EventStore: listener {:?} already on {}", listener.id(), C::KEY);
            return;
        }
        let handle = listener.clone();
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(value) = any.downcast_ref::<C::Value>() {
                handle.call(value);
            }
        });
        set.insert(listener.id(), wrapped);
    }

    /// Remove `listener` from `C::event_name()`.
    ///
    /// Drops the event entry entirely once its last listener is gone.
    /// Unknown events or listeners are ignored.
    pub fn off<C: Channel>(&self, listener: &Listener<C::Value>) {
        let event = C::event_name();
        let mut listeners = self.inner.listeners.write().unwrap_or_else(|e| e.into_inner());
        let now_empty = match listeners.get_mut(&event) {
            Some(set) => {
                set.shift_remove(&listener.id());
                set.is_empty()
            }
            None => return,
        };
        if now_empty {
            listeners.remove(&event);
        }
    }

    // ========== Values ==========

    /// Store `value` under `C::KEY`, then call every listener registered at
    /// this moment, in registration order.
    ///
    /// Every call emits, even when the value did not change.
    pub fn set<C: Channel>(&self, value: C::Value) {
        self.inner
            .values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(C::KEY, Box::new(value.clone()));

        let newly_emitting = self
            .inner
            .emitting
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(C::KEY);
        if !newly_emitting {
            warn!("EventStore: nested set on '{}' stored without emitting", C::KEY);
            return;
        }
        let _guard = EmitGuard {
            inner: &self.inner,
            key: C::KEY,
        };

        let snapshot: Vec<Callback> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&C::event_name())
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default();

        trace!("EventStore: {} -> {} listener(s)", C::KEY, snapshot.len());
        for cb in &snapshot {
            cb(&value);
        }
    }

    /// Last value stored under `C::KEY`, or None if never set.
    pub fn get<C: Channel>(&self) -> Option<C::Value> {
        self.inner
            .values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(C::KEY)
            .and_then(|v| v.downcast_ref::<C::Value>())
            .cloned()
    }

    // ========== Introspection & Utilities ==========

    /// Check if any listener is registered under `event` (e.g. `"timeline.uTime:set"`)
    pub fn has_listeners(&self, event: &str) -> bool {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(event)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// All event names that currently have listeners, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Clear all values and listeners
    pub fn clear(&self) {
        self.inner.values.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.inner.listeners.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl fmt::Debug for EventStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStore")
            .field("values", &self.inner.values.read().map(|v| v.len()).unwrap_or(0))
            .field("events", &self.event_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Num;
    impl Channel for Num {
        type Value = i32;
        const KEY: &'static str = "test.num";
    }

    struct Text;
    impl Channel for Text {
        type Value = String;
        const KEY: &'static str = "test.text";
    }

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, Listener<i32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let listener = Listener::new(move |v: &i32| s.lock().unwrap().push(*v));
        (seen, listener)
    }

    #[test]
    fn test_event_name_format() {
        assert_eq!(Num::event_name(), "test.num:set");
    }

    #[test]
    fn test_get_unset_is_none() {
        let store = EventStore::new();
        assert_eq!(store.get::<Num>(), None);
    }

    #[test]
    fn test_set_stores_before_emit() {
        let store = EventStore::new();
        let observed = Arc::new(Mutex::new(None));
        let o = Arc::clone(&observed);
        let s = store.clone();
        let listener = Listener::new(move |_: &i32| {
            *o.lock().unwrap() = s.get::<Num>();
        });
        store.on::<Num>(&listener);

        store.set::<Num>(7);
        assert_eq!(*observed.lock().unwrap(), Some(7));
        assert_eq!(store.get::<Num>(), Some(7));
    }

    #[test]
    fn test_fan_out_only_to_same_key() {
        let store = EventStore::new();
        let (seen_a, a) = recorder();
        let (seen_b, b) = recorder();
        let text_calls = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&text_calls);
        let other = Listener::new(move |_: &String| {
            t.fetch_add(1, Ordering::SeqCst);
        });

        store.on::<Num>(&a);
        store.on::<Num>(&b);
        store.on::<Text>(&other);

        store.set::<Num>(3);
        assert_eq!(*seen_a.lock().unwrap(), vec![3]);
        assert_eq!(*seen_b.lock().unwrap(), vec![3]);
        assert_eq!(text_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_registration_order() {
        let store = EventStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..4 {
            let o = Arc::clone(&order);
            store.on::<Num>(&Listener::new(move |_: &i32| o.lock().unwrap().push(tag)));
        }
        store.set::<Num>(0);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_duplicate_on_is_idempotent() {
        let store = EventStore::new();
        let (seen, listener) = recorder();
        store.on::<Num>(&listener);
        store.on::<Num>(&listener.clone());
        assert_eq!(store.listener_count("test.num:set"), 1);

        store.set::<Num>(1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_no_dedup_on_unchanged_value() {
        let store = EventStore::new();
        let (seen, listener) = recorder();
        store.on::<Num>(&listener);
        store.set::<Num>(5);
        store.set::<Num>(5);
        assert_eq!(*seen.lock().unwrap(), vec![5, 5]);
    }

    #[test]
    fn test_off_last_listener_removes_event() {
        let store = EventStore::new();
        let (_, a) = recorder();
        let (_, b) = recorder();
        store.on::<Num>(&a);
        store.on::<Num>(&b);

        store.off::<Num>(&a);
        assert!(store.has_listeners("test.num:set"));
        store.off::<Num>(&b);
        assert!(!store.has_listeners("test.num:set"));
        assert!(store.event_names().is_empty());
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let store = EventStore::new();
        let (_, a) = recorder();
        store.off::<Num>(&a);
        assert!(store.event_names().is_empty());
    }

    #[test]
    fn test_listener_added_during_emit_waits_for_next_pass() {
        let store = EventStore::new();
        let (late_seen, late) = recorder();
        let s = store.clone();
        let adder = Listener::new(move |_: &i32| s.on::<Num>(&late));
        store.on::<Num>(&adder);

        store.set::<Num>(1);
        assert!(late_seen.lock().unwrap().is_empty());

        store.set::<Num>(2);
        assert_eq!(*late_seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_nested_set_on_other_key_completes_inline() {
        let store = EventStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        store.on::<Text>(&Listener::new(move |t: &String| {
            o.lock().unwrap().push(format!("text {t}"));
        }));

        let s = store.clone();
        let o = Arc::clone(&order);
        store.on::<Num>(&Listener::new(move |v: &i32| {
            s.set::<Text>(format!("{v}"));
            o.lock().unwrap().push(format!("num {v}"));
        }));

        store.set::<Num>(9);
        assert_eq!(*order.lock().unwrap(), vec!["text 9".to_string(), "num 9".to_string()]);
    }

    #[test]
    fn test_nested_set_on_same_key_does_not_recurse() {
        let store = EventStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let s = store.clone();
        store.on::<Num>(&Listener::new(move |v: &i32| {
            c.fetch_add(1, Ordering::SeqCst);
            s.set::<Num>(v + 1);
        }));

        store.set::<Num>(0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Inner write is stored, just not re-emitted
        assert_eq!(store.get::<Num>(), Some(1));

        // Guard is released afterwards
        store.set::<Num>(10);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear() {
        let store = EventStore::new();
        let (_, a) = recorder();
        store.on::<Num>(&a);
        store.set::<Num>(1);
        store.clear();
        assert_eq!(store.get::<Num>(), None);
        assert!(store.event_names().is_empty());
    }
}
