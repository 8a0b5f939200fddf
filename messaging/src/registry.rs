use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Handlers of one payload type, oldest first.
pub(crate) struct HandlerList<H: ?Sized> {
    entries: Vec<Weak<H>>,
    dispatch_depth: usize,
}

impl<H: ?Sized> HandlerList<H> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            dispatch_depth: 0,
        }
    }

    fn position(&self, handler: &Weak<H>) -> Option<usize> {
        let target = handler.as_ptr() as *const ();
        self.entries
            .iter()
            .position(|entry| entry.as_ptr() as *const () == target)
    }

    fn prune_dead(&mut self) {
        self.entries.retain(|entry| entry.strong_count() > 0);
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    lists: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
}

pub(crate) enum Insert {
    Added,
    Duplicate,
}

impl Registry {
    /// Runs `f` on the list for `H`, creating it on first use.
    fn with_list<H, T>(&self, f: impl FnOnce(&mut HandlerList<H>) -> T) -> T
    where
        H: ?Sized + Send + Sync + 'static,
    {
        let mut lists = self.lists.lock();
        let slot = lists
            .entry(TypeId::of::<H>())
            .or_insert_with(|| Box::new(HandlerList::<H>::new()));
        if let Some(list) = slot.downcast_mut::<HandlerList<H>>() {
            return f(list);
        }
        let mut list = HandlerList::<H>::new();
        let result = f(&mut list);
        *slot = Box::new(list);
        result
    }

    /// Runs `f` on the list for `H` only if one exists.
    fn with_existing<H, T>(&self, f: impl FnOnce(&mut HandlerList<H>) -> T) -> Option<T>
    where
        H: ?Sized + Send + Sync + 'static,
    {
        let mut lists = self.lists.lock();
        lists
            .get_mut(&TypeId::of::<H>())
            .and_then(|slot| slot.downcast_mut::<HandlerList<H>>())
            .map(f)
    }

    pub(crate) fn insert<H>(&self, handler: Weak<H>) -> Insert
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.with_list::<H, _>(|list| {
            list.prune_dead();
            if list.position(&handler).is_some() {
                return Insert::Duplicate;
            }
            list.entries.push(handler);
            Insert::Added
        })
    }

    pub(crate) fn contains<H>(&self, handler: &Weak<H>) -> bool
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.with_existing::<H, _>(|list| list.position(handler).is_some())
            .unwrap_or(false)
    }

    pub(crate) fn remove<H>(&self, handler: &Weak<H>) -> bool
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.with_existing::<H, _>(|list| match list.position(handler) {
            Some(index) => {
                list.entries.remove(index);
                true
            }
            None => false,
        })
        .unwrap_or(false)
    }

    /// Clears the list unless a dispatch for this type is running.
    pub(crate) fn clear<H>(&self) -> Result<usize, usize>
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.with_existing::<H, _>(|list| {
            if list.dispatch_depth > 0 {
                return Err(list.dispatch_depth);
            }
            let removed = list.entries.len();
            list.entries.clear();
            Ok(removed)
        })
        .unwrap_or(Ok(0))
    }

    /// Live handlers; dead entries are dropped on the way.
    pub(crate) fn count<H>(&self) -> usize
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.with_existing::<H, _>(|list| {
            list.prune_dead();
            list.entries.len()
        })
        .unwrap_or(0)
    }

    pub(crate) fn is_dispatching<H>(&self) -> bool
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.with_existing::<H, _>(|list| list.dispatch_depth > 0)
            .unwrap_or(false)
    }

    /// Starts a dispatch: prunes dead entries and returns the live handlers
    /// newest first. The guard ends the dispatch when dropped.
    pub(crate) fn begin_dispatch<H>(&self) -> (Vec<Arc<H>>, DispatchGuard<'_, H>)
    where
        H: ?Sized + Send + Sync + 'static,
    {
        let snapshot = self.with_list::<H, _>(|list| {
            list.prune_dead();
            list.dispatch_depth += 1;
            list.entries
                .iter()
                .rev()
                .filter_map(Weak::upgrade)
                .collect::<Vec<_>>()
        });
        (
            snapshot,
            DispatchGuard {
                registry: self,
                _handler: PhantomData,
            },
        )
    }

    pub(crate) fn still_registered<H>(&self, handler: &Arc<H>) -> bool
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.contains(&Arc::downgrade(handler))
    }

    fn end_dispatch<H>(&self)
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.with_existing::<H, _>(|list| {
            list.dispatch_depth = list.dispatch_depth.saturating_sub(1);
        });
    }
}

pub(crate) struct DispatchGuard<'a, H>
where
    H: ?Sized + Send + Sync + 'static,
{
    registry: &'a Registry,
    _handler: PhantomData<fn(&H)>,
}

impl<H> Drop for DispatchGuard<'_, H>
where
    H: ?Sized + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.registry.end_dispatch::<H>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Ping: Send + Sync {}

    struct Pinger;

    impl Ping for Pinger {}

    fn stored_entries(registry: &Registry) -> Option<usize> {
        registry.with_existing::<dyn Ping, _>(|list| list.entries.len())
    }

    #[test]
    fn queries_do_not_create_lists() {
        let registry = Registry::default();
        let strong: Arc<dyn Ping> = Arc::new(Pinger);
        let weak = Arc::downgrade(&strong);
        assert_eq!(registry.count::<dyn Ping>(), 0);
        assert!(!registry.contains(&weak));
        assert!(!registry.remove(&weak));
        assert!(!registry.is_dispatching::<dyn Ping>());
        assert_eq!(registry.clear::<dyn Ping>(), Ok(0));
        assert!(registry.lists.lock().is_empty());
    }

    #[test]
    fn count_drops_dead_entries() {
        let registry = Registry::default();
        let kept: Arc<dyn Ping> = Arc::new(Pinger);
        let dropped: Arc<dyn Ping> = Arc::new(Pinger);
        registry.insert(Arc::downgrade(&kept));
        registry.insert(Arc::downgrade(&dropped));
        assert_eq!(stored_entries(&registry), Some(2));
        drop(dropped);
        assert_eq!(registry.count::<dyn Ping>(), 1);
        assert_eq!(stored_entries(&registry), Some(1));
    }
}
