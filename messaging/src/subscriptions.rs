use std::any::type_name;
use std::sync::{Arc, Weak};

use engine_core::logging;

use crate::bus::{
    Handler, Message, MessageBus, MessagingError, Registration, Request, Responder,
};

type RegisterFn = Box<dyn Fn(&MessageBus) -> Result<Registration, MessagingError> + Send + Sync>;
type UnregisterFn = Box<dyn Fn(&MessageBus) -> bool + Send + Sync>;

struct Subscription {
    register: RegisterFn,
    unregister: UnregisterFn,
}

/// Explicit list of the payload types an object handles.
#[derive(Default)]
pub struct Subscriptions {
    entries: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message<M, T>(mut self, handler: &Arc<T>) -> Self
    where
        M: Message,
        T: Handler<M> + 'static,
    {
        let weak: Weak<T> = Arc::downgrade(handler);
        let weak_for_unregister = weak.clone();
        self.entries.push(Subscription {
            register: Box::new(move |bus| match weak.upgrade() {
                Some(handler) => bus.register::<M, T>(&handler),
                None => Err(MessagingError::DeadHandler {
                    payload: type_name::<M>(),
                }),
            }),
            unregister: Box::new(move |bus| match weak_for_unregister.upgrade() {
                Some(handler) => bus.unregister::<M, T>(&handler),
                None => false,
            }),
        });
        self
    }

    pub fn request<R, T>(mut self, responder: &Arc<T>) -> Self
    where
        R: Request,
        T: Responder<R> + 'static,
    {
        let weak: Weak<T> = Arc::downgrade(responder);
        let weak_for_unregister = weak.clone();
        self.entries.push(Subscription {
            register: Box::new(move |bus| match weak.upgrade() {
                Some(responder) => bus.register_responder::<R, T>(&responder),
                None => Err(MessagingError::DeadHandler {
                    payload: type_name::<R>(),
                }),
            }),
            unregister: Box::new(move |bus| match weak_for_unregister.upgrade() {
                Some(responder) => bus.unregister_responder::<R, T>(&responder),
                None => false,
            }),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Objects that declare every handler capability they implement.
pub trait Subscriber: Send + Sync + 'static {
    fn subscriptions(self: &Arc<Self>) -> Subscriptions;
}

impl MessageBus {
    /// Registers every capability the subscriber declares; returns how many
    /// were newly added.
    pub fn register_subscriber<S: Subscriber>(
        &self,
        subscriber: &Arc<S>,
    ) -> Result<usize, MessagingError> {
        let subscriptions = subscriber.subscriptions();
        if subscriptions.is_empty() {
            logging::warn(
                "messaging",
                format!("{} declares no handler capabilities", type_name::<S>()),
            );
        }
        let mut added = 0usize;
        for entry in &subscriptions.entries {
            if (entry.register)(self)? == Registration::Added {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Returns how many capabilities were removed.
    pub fn unregister_subscriber<S: Subscriber>(&self, subscriber: &Arc<S>) -> usize {
        subscriber
            .subscriptions()
            .entries
            .iter()
            .filter(|entry| (entry.unregister)(self))
            .count()
    }
}
