//! Change notifications and the handles that stop them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::runtime::TimerHandle;

/// Stops a listener, poller or channel port.
///
/// `unsubscribe` can be called any number of times; dropping the handle
/// unsubscribes too.
#[must_use = "dropping a Subscription stops it immediately"]
pub struct Subscription {
    stops: RefCell<Vec<Box<dyn FnOnce()>>>,
    timers: RefCell<Vec<TimerHandle>>,
    active: Cell<bool>,
}

impl Subscription {
    pub fn new(stop: impl FnOnce() + 'static) -> Self {
        Self {
            stops: RefCell::new(vec![Box::new(stop)]),
            timers: RefCell::new(Vec::new()),
            active: Cell::new(true),
        }
    }

    /// Subscription that only owns a poll timer
    pub fn from_timer(timer: TimerHandle) -> Self {
        Self {
            stops: RefCell::new(Vec::new()),
            timers: RefCell::new(vec![timer]),
            active: Cell::new(true),
        }
    }

    /// One handle stopping every part
    pub fn merge(parts: Vec<Subscription>) -> Self {
        let merged = Self {
            stops: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
            active: Cell::new(true),
        };
        merged.stops.borrow_mut().push(Box::new(move || {
            for part in parts {
                part.unsubscribe();
            }
        }));
        merged
    }

    /// Also cancel `timer` when this subscription stops
    pub fn with_timer(self, timer: TimerHandle) -> Self {
        self.timers.borrow_mut().push(timer);
        self
    }

    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        for timer in self.timers.borrow_mut().drain(..) {
            timer.cancel();
        }
        let stops: Vec<_> = self.stops.borrow_mut().drain(..).collect();
        for stop in stops {
            stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Callback receiving the storage key that changed
pub type KeyListener = Box<dyn Fn(&str)>;

/// Announces writes to storage keys.
///
/// In a browser, same-document listeners hear a custom event and other
/// documents hear the native `storage` event.
pub trait ChangeNotifier {
    fn notify(&self, key: &str);
    fn listen(&self, listener: KeyListener) -> Subscription;
}

type ListenerList = Rc<RefCell<Vec<(u64, Rc<dyn Fn(&str)>)>>>;

/// In-process notifier; every listener hears every write
#[derive(Default, Clone)]
pub struct MemoryNotifier {
    listeners: ListenerList,
    next_id: Rc<Cell<u64>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl ChangeNotifier for MemoryNotifier {
    fn notify(&self, key: &str) {
        let listeners: Vec<_> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(key);
        }
    }

    fn listen(&self, listener: KeyListener) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::from(listener)));

        let listeners = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(i, _)| *i != id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let notifier = MemoryNotifier::new();
        let heard = Rc::new(RefCell::new(Vec::new()));
        let h = heard.clone();
        let sub = notifier.listen(Box::new(move |key| h.borrow_mut().push(key.to_string())));

        notifier.notify("impostor-game-ABC123");
        sub.unsubscribe();
        sub.unsubscribe();
        notifier.notify("impostor-game-ABC123");

        assert_eq!(heard.borrow().len(), 1);
        assert!(!sub.is_active());
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier = MemoryNotifier::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        {
            let _sub = notifier.listen(Box::new(move |_| c.set(c.get() + 1)));
            notifier.notify("k");
        }
        notifier.notify("k");
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_merge_stops_all_parts() {
        let stopped = Rc::new(Cell::new(0));
        let parts = (0..3)
            .map(|_| {
                let s = stopped.clone();
                Subscription::new(move || s.set(s.get() + 1))
            })
            .collect();
        let merged = Subscription::merge(parts);
        merged.unsubscribe();
        merged.unsubscribe();
        assert_eq!(stopped.get(), 3);
    }
}
