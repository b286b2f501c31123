//! Change notification for live settings objects.
//!
//! Settings that affect rendering (a threshold value, a band selection) own a
//! [`ChangeNotifier`]. Anything that must react to changes, typically a
//! [`MapChannel`](crate::channel::MapChannel), registers a
//! [`ChangeListener`] and keeps the returned [`Subscription`] alive for as
//! long as it wants to hear about changes. Dropping the subscription
//! unregisters the listener.
//!
//! A listener registered several times (a channel whose pipelines share one
//! settings object) is still notified once per change; it stays registered
//! until its last subscription is dropped.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Receives change notifications.
pub trait ChangeListener: Send + Sync {
    /// Called once per effective settings change.
    fn settings_changed(&self);
}

struct Entry {
    id: u64,
    listener: Weak<dyn ChangeListener>,
    holders: usize,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Entry>,
}

fn same_listener(a: &Weak<dyn ChangeListener>, b: &Weak<dyn ChangeListener>) -> bool {
    std::ptr::eq(a.as_ptr() as *const (), b.as_ptr() as *const ())
}

/// Registry of listeners for one settings object.
#[derive(Default)]
pub struct ChangeNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeNotifier {
    /// Create a notifier with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    ///
    /// The notifier only holds a weak reference; the listener stays
    /// registered until every [`Subscription`] returned for it is dropped or
    /// the listener itself is freed. Subscribing an already registered
    /// listener does not add a second notification.
    pub fn subscribe(&self, listener: Weak<dyn ChangeListener>) -> Subscription {
        let mut registry = self.registry.lock();
        let existing = registry
            .listeners
            .iter_mut()
            .find(|e| e.listener.strong_count() > 0 && same_listener(&e.listener, &listener));
        let id = match existing {
            Some(entry) => {
                entry.holders += 1;
                entry.id
            }
            None => {
                registry.next_id += 1;
                let id = registry.next_id;
                registry.listeners.push(Entry {
                    id,
                    listener,
                    holders: 1,
                });
                id
            }
        };
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Notify every live listener once. Returns how many were notified.
    pub fn notify(&self) -> usize {
        // Collect first so listeners may subscribe/unsubscribe re-entrantly
        let live: Vec<Arc<dyn ChangeListener>> = {
            let mut registry = self.registry.lock();
            registry.listeners.retain(|e| e.listener.strong_count() > 0);
            registry
                .listeners
                .iter()
                .filter_map(|e| e.listener.upgrade())
                .collect()
        };

        for listener in &live {
            listener.settings_changed();
        }
        live.len()
    }

    /// Number of registered listeners that are still alive.
    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .listeners
            .iter()
            .filter(|e| e.listener.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a listener registered; unregisters on drop.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock();
            if let Some(pos) = registry.listeners.iter().position(|e| e.id == self.id) {
                registry.listeners[pos].holders -= 1;
                if registry.listeners[pos].holders == 0 {
                    registry.listeners.remove(pos);
                }
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
