use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of listeners for one notification channel
pub struct Observers<T> {
    listeners: RwLock<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the id was not subscribed
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invoke every listener in registration order. A panicking listener is
    /// logged and skipped.
    pub fn notify(&self, value: &T) {
        // Listeners may unsubscribe from inside the callback
        let listeners = self.listeners.read().clone();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                warn!(listener_id = id.0, "Listener panicked");
            }
        }
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let observers = Observers::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            observers.subscribe(move |value| seen.lock().push(format!("{}:{}", tag, value)));
        }

        observers.notify(&7);
        assert_eq!(*seen.lock(), vec!["first:7", "second:7", "third:7"]);
    }

    #[test]
    fn test_unsubscribe() {
        let observers = Observers::<u32>::new();
        let count = Arc::new(Mutex::new(0));

        let counter = count.clone();
        let id = observers.subscribe(move |_| *counter.lock() += 1);
        observers.notify(&1);

        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&2);

        assert_eq!(*count.lock(), 1);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let observers = Observers::<u32>::new();
        let reached = Arc::new(Mutex::new(false));

        observers.subscribe(|_| panic!("listener failure"));
        let flag = reached.clone();
        observers.subscribe(move |_| *flag.lock() = true);

        observers.notify(&1);
        assert!(*reached.lock());
    }
}
