// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multi-subscriber registry with first/last lifecycle hooks.
//!
//! The hooks gate an expensive resource (a sensor session): it runs exactly
//! while the registry has at least one subscriber.

use crate::sync_utils::lock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Subscriber callback for events of type `E`.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`ListenerRegistry::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle callbacks fired on subscriber-count transitions.
///
/// Hooks run synchronously inside `subscribe`/`unsubscribe` and must not
/// subscribe to or unsubscribe from the registry that invoked them.
pub trait SessionHooks: Send + Sync {
    /// Subscriber count went 0 → 1.
    fn on_first_subscriber(&self);

    /// Subscriber count went 1 → 0.
    fn on_last_unsubscribed(&self);

    /// A subscriber joined a non-empty registry.
    fn on_subscriber_joined(&self) {}
}

/// Hooks that do nothing, for registries without a backing resource.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SessionHooks for NoHooks {
    fn on_first_subscriber(&self) {}
    fn on_last_unsubscribed(&self) {}
}

/// Registry of listeners for one topic.
pub struct ListenerRegistry<E> {
    topic: &'static str,
    /// Serializes subscribe/unsubscribe so hooks fire in mutation order.
    lifecycle: Mutex<()>,
    listeners: Mutex<Vec<(SubscriptionId, Listener<E>)>>,
    hooks: Box<dyn SessionHooks>,
}

impl<E> ListenerRegistry<E> {
    pub fn new(topic: &'static str, hooks: impl SessionHooks + 'static) -> Self {
        Self {
            topic,
            lifecycle: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            hooks: Box::new(hooks),
        }
    }

    /// Registry without lifecycle hooks.
    pub fn without_hooks(topic: &'static str) -> Self {
        Self::new(topic, NoHooks)
    }

    /// Add a listener. Fires `on_first_subscriber` before returning if this
    /// is the only listener.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let _lifecycle = lock(&self.lifecycle);
        let id = SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed));
        let first = {
            let mut listeners = lock(&self.listeners);
            listeners.push((id, Arc::new(listener)));
            listeners.len() == 1
        };

        if first {
            tracing::debug!(topic = self.topic, "First listener, starting session");
            self.hooks.on_first_subscriber();
        } else {
            self.hooks.on_subscriber_joined();
        }
        id
    }

    /// Remove a listener. Unknown ids are ignored. Returns whether a
    /// listener was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let _lifecycle = lock(&self.lifecycle);
        let (removed, now_empty) = {
            let mut listeners = lock(&self.listeners);
            let before = listeners.len();
            listeners.retain(|(existing, _)| *existing != id);
            (listeners.len() < before, listeners.is_empty())
        };

        if removed && now_empty {
            tracing::debug!(topic = self.topic, "No more listeners, stopping session");
            self.hooks.on_last_unsubscribed();
        }
        removed
    }

    /// Call every listener registered at the time of the call.
    ///
    /// Listeners added or removed during dispatch do not affect this pass.
    pub fn dispatch(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.listeners).is_empty()
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Counts hook calls and flags any double start / stop.
    #[derive(Default)]
    struct CountingHooks {
        started: AtomicUsize,
        stopped: AtomicUsize,
        joined: AtomicUsize,
        running: AtomicBool,
        violations: AtomicUsize,
    }

    impl SessionHooks for Arc<CountingHooks> {
        fn on_first_subscriber(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            if self.running.swap(true, Ordering::SeqCst) {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_last_unsubscribed(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            if !self.running.swap(false, Ordering::SeqCst) {
                self.violations.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_subscriber_joined(&self) {
            self.joined.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> (ListenerRegistry<u32>, Arc<CountingHooks>) {
        let hooks = Arc::new(CountingHooks::default());
        (ListenerRegistry::new("test", Arc::clone(&hooks)), hooks)
    }

    #[test]
    fn test_first_subscriber_fires_once() {
        let (registry, hooks) = registry();
        let a = registry.subscribe(|_| {});
        let b = registry.subscribe(|_| {});
        let c = registry.subscribe(|_| {});

        assert_eq!(hooks.started.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.joined.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 3);

        registry.unsubscribe(a);
        registry.unsubscribe(b);
        assert_eq!(hooks.stopped.load(Ordering::SeqCst), 0);

        registry.unsubscribe(c);
        assert_eq!(hooks.stopped.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_hooks_fire_again_after_empty() {
        let (registry, hooks) = registry();
        let a = registry.subscribe(|_| {});
        registry.unsubscribe(a);
        let b = registry.subscribe(|_| {});
        registry.unsubscribe(b);

        assert_eq!(hooks.started.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.stopped.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.violations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_unsubscribe_is_noop() {
        let (registry, hooks) = registry();
        let a = registry.subscribe(|_| {});
        assert!(registry.unsubscribe(a));
        assert!(!registry.unsubscribe(a));
        assert_eq!(hooks.stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_reaches_all_listeners() {
        let registry: ListenerRegistry<u32> = ListenerRegistry::without_hooks("sum");
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = Arc::clone(&total);
            registry.subscribe(move |value| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }

        registry.dispatch(&5);
        assert_eq!(total.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn test_dispatch_uses_snapshot() {
        let registry: Arc<ListenerRegistry<u32>> =
            Arc::new(ListenerRegistry::without_hooks("snapshot"));
        let late_calls = Arc::new(AtomicUsize::new(0));

        let reg = Arc::clone(&registry);
        let late = Arc::clone(&late_calls);
        registry.subscribe(move |_| {
            let late = Arc::clone(&late);
            reg.subscribe(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        registry.dispatch(&1);
        // Added during the first pass: not called in it
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);

        registry.dispatch(&2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_subscribe_unsubscribe_keeps_session_exact() {
        let (registry, hooks) = registry();
        let registry = Arc::new(registry);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..200u32 {
                        let id = registry.subscribe(|_| {});
                        registry.dispatch(&i);
                        registry.unsubscribe(id);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert!(registry.is_empty());
        assert_eq!(hooks.violations.load(Ordering::SeqCst), 0);
        assert_eq!(
            hooks.started.load(Ordering::SeqCst),
            hooks.stopped.load(Ordering::SeqCst)
        );
        assert!(!hooks.running.load(Ordering::SeqCst));
    }
}
