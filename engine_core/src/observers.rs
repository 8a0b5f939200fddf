//! Per-entity observer lists.
//!
//! Notification walks a snapshot of the list taken when `notify` starts.
//! Observers removed while a notification is running are skipped if their
//! turn has not come yet; observers added during a notification first hear
//! the next event.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

type Callback<E> = Rc<RefCell<dyn FnMut(&E)>>;

pub struct Observers<E> {
    entries: Rc<RefCell<Vec<(ObserverId, Callback<E>)>>>,
    next_id: u64,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
            next_id: 0,
        }
    }
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: impl FnMut(&E) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(observer))));
        id
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.entries.borrow().iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.borrow_mut().clear();
    }

    /// Returns how many observers were called.
    pub fn notify(&self, event: &E) -> usize {
        let snapshot: Vec<(ObserverId, Callback<E>)> = self
            .entries
            .borrow()
            .iter()
            .map(|(id, callback)| (*id, Rc::clone(callback)))
            .collect();
        let mut called = 0usize;
        for (id, callback) in snapshot {
            if !self.contains(id) {
                continue;
            }
            // A re-entrant notify from inside this observer would double-borrow.
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (callback)(event);
                called += 1;
            }
        }
        called
    }

    /// Handle that can remove observers while a notification is running.
    pub fn remover(&self) -> ObserverRemover<E> {
        ObserverRemover {
            entries: Rc::clone(&self.entries),
        }
    }
}

pub struct ObserverRemover<E> {
    entries: Rc<RefCell<Vec<(ObserverId, Callback<E>)>>>,
}

impl<E> Clone for ObserverRemover<E> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<E> ObserverRemover<E> {
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn notify_calls_in_insertion_order() {
        let mut observers = Observers::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3u32 {
            let log = Rc::clone(&log);
            observers.add(move |event| log.borrow_mut().push((tag, *event)));
        }
        assert_eq!(observers.notify(&9), 3);
        assert_eq!(*log.borrow(), vec![(0, 9), (1, 9), (2, 9)]);
    }

    #[test]
    fn removed_during_notify_is_skipped() {
        let mut observers = Observers::<()>::new();
        let remover = observers.remover();
        let later_called = Rc::new(Cell::new(false));
        let victim = Rc::new(Cell::new(None));
        let victim_for_first = Rc::clone(&victim);
        observers.add(move |_| {
            if let Some(id) = victim_for_first.get() {
                remover.remove(id);
            }
        });
        let flag = Rc::clone(&later_called);
        let id = observers.add(move |_| flag.set(true));
        victim.set(Some(id));

        assert_eq!(observers.notify(&()), 1);
        assert!(!later_called.get());
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn remove_unknown_returns_false() {
        let mut observers = Observers::<()>::new();
        let id = observers.add(|_| {});
        assert!(observers.remove(id));
        assert!(!observers.remove(id));
        assert!(observers.is_empty());
    }
}
