use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};

use engine_core::logging;
use engine_core::owner_thread::{DispatchError, OwnerHandle};

use crate::registry::{Insert, Registry};

const TARGET: &str = "messaging";

/// Broadcast payload delivered by shared reference to every handler.
pub trait Message: Send + 'static {}

/// Payload owned by the broadcaster and fulfilled in place by responders.
pub trait Request: Send + 'static {}

pub trait Handler<M: Message>: Send + Sync {
    fn handle(&self, message: &M);
}

pub trait Responder<R: Request>: Send + Sync {
    fn respond(&self, request: &mut R);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyRegistered,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagingError {
    /// The weak handler no longer points at a live object.
    DeadHandler { payload: &'static str },
    /// `unregister_all` was called while that payload type was dispatching.
    ClearDuringDispatch { payload: &'static str },
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagingError::DeadHandler { payload } => {
                write!(f, "handler for {} must be alive to register", payload)
            }
            MessagingError::ClearDuringDispatch { payload } => {
                write!(f, "cannot clear {} handlers while dispatching", payload)
            }
        }
    }
}

impl std::error::Error for MessagingError {}

/// Type-keyed publish/subscribe registry.
///
/// Cloning yields another handle to the same registry. Handlers are held
/// weakly; dropping the last strong reference to a handler unsubscribes it.
/// Broadcasts run newest-registered first over a snapshot of the list.
#[derive(Clone)]
pub struct MessageBus {
    registry: Arc<Registry>,
    owner: OwnerHandle,
}

impl MessageBus {
    pub fn new(owner: OwnerHandle) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            owner,
        }
    }

    pub fn owner(&self) -> &OwnerHandle {
        &self.owner
    }

    pub fn register<M, T>(&self, handler: &Arc<T>) -> Result<Registration, MessagingError>
    where
        M: Message,
        T: Handler<M> + 'static,
    {
        self.register_weak::<M>(message_weak::<M, T>(handler))
    }

    pub fn register_weak<M: Message>(
        &self,
        handler: Weak<dyn Handler<M>>,
    ) -> Result<Registration, MessagingError> {
        insert_checked(&self.registry, handler)
    }

    pub fn is_registered<M, T>(&self, handler: &Arc<T>) -> bool
    where
        M: Message,
        T: Handler<M> + 'static,
    {
        self.registry.contains(&message_weak::<M, T>(handler))
    }

    pub fn unregister<M, T>(&self, handler: &Arc<T>) -> bool
    where
        M: Message,
        T: Handler<M> + 'static,
    {
        remove_logged(&self.registry, &message_weak::<M, T>(handler))
    }

    pub fn unregister_all<M: Message>(&self) -> Result<usize, MessagingError> {
        clear_checked::<dyn Handler<M>>(&self.registry)
    }

    pub fn count_registered<M: Message>(&self) -> usize {
        self.registry.count::<dyn Handler<M>>()
    }

    pub fn is_dispatching<M: Message>(&self) -> bool {
        self.registry.is_dispatching::<dyn Handler<M>>()
    }

    /// Dispatches on the calling thread; returns how many handlers ran.
    pub fn broadcast<M: Message>(&self, message: &M) -> usize {
        let (snapshot, _guard) = self.registry.begin_dispatch::<dyn Handler<M>>();
        let mut delivered = 0usize;
        for handler in snapshot {
            if !self.registry.still_registered(&handler) {
                continue;
            }
            handler.handle(message);
            delivered += 1;
        }
        delivered
    }

    /// Queues a broadcast on the owning thread and returns immediately.
    pub fn post<M: Message>(&self, message: M) -> Result<(), DispatchError> {
        let bus = self.clone();
        self.owner.post(move || {
            bus.broadcast(&message);
        })
    }

    pub fn register_responder<R, T>(
        &self,
        responder: &Arc<T>,
    ) -> Result<Registration, MessagingError>
    where
        R: Request,
        T: Responder<R> + 'static,
    {
        self.register_responder_weak::<R>(request_weak::<R, T>(responder))
    }

    pub fn register_responder_weak<R: Request>(
        &self,
        responder: Weak<dyn Responder<R>>,
    ) -> Result<Registration, MessagingError> {
        insert_checked(&self.registry, responder)
    }

    pub fn is_responder_registered<R, T>(&self, responder: &Arc<T>) -> bool
    where
        R: Request,
        T: Responder<R> + 'static,
    {
        self.registry.contains(&request_weak::<R, T>(responder))
    }

    pub fn unregister_responder<R, T>(&self, responder: &Arc<T>) -> bool
    where
        R: Request,
        T: Responder<R> + 'static,
    {
        remove_logged(&self.registry, &request_weak::<R, T>(responder))
    }

    pub fn unregister_all_responders<R: Request>(&self) -> Result<usize, MessagingError> {
        clear_checked::<dyn Responder<R>>(&self.registry)
    }

    pub fn count_responders<R: Request>(&self) -> usize {
        self.registry.count::<dyn Responder<R>>()
    }

    /// Lets every responder fulfil `request` on the calling thread.
    pub fn request<R: Request>(&self, request: &mut R) -> usize {
        let (snapshot, _guard) = self.registry.begin_dispatch::<dyn Responder<R>>();
        let mut delivered = 0usize;
        for responder in snapshot {
            if !self.registry.still_registered(&responder) {
                continue;
            }
            responder.respond(request);
            delivered += 1;
        }
        delivered
    }

    /// Runs the request on the owning thread and blocks until it returns.
    pub fn send<R: Request>(&self, request: R) -> Result<R, DispatchError> {
        let bus = self.clone();
        self.owner.send(move || {
            let mut request = request;
            bus.request(&mut request);
            request
        })
    }
}

fn message_weak<M, T>(handler: &Arc<T>) -> Weak<dyn Handler<M>>
where
    M: Message,
    T: Handler<M> + 'static,
{
    let handler: Arc<dyn Handler<M>> = handler.clone();
    Arc::downgrade(&handler)
}

fn request_weak<R, T>(responder: &Arc<T>) -> Weak<dyn Responder<R>>
where
    R: Request,
    T: Responder<R> + 'static,
{
    let responder: Arc<dyn Responder<R>> = responder.clone();
    Arc::downgrade(&responder)
}

fn insert_checked<H>(registry: &Registry, handler: Weak<H>) -> Result<Registration, MessagingError>
where
    H: ?Sized + Send + Sync + 'static,
{
    if handler.strong_count() == 0 {
        return Err(MessagingError::DeadHandler {
            payload: type_name::<H>(),
        });
    }
    match registry.insert(handler) {
        Insert::Added => Ok(Registration::Added),
        Insert::Duplicate => {
            logging::warn(
                TARGET,
                format!("{} handler is already registered", type_name::<H>()),
            );
            Ok(Registration::AlreadyRegistered)
        }
    }
}

fn remove_logged<H>(registry: &Registry, handler: &Weak<H>) -> bool
where
    H: ?Sized + Send + Sync + 'static,
{
    let removed = registry.remove(handler);
    if !removed {
        logging::warn(
            TARGET,
            format!("{} handler to be removed was not registered", type_name::<H>()),
        );
    }
    removed
}

fn clear_checked<H>(registry: &Registry) -> Result<usize, MessagingError>
where
    H: ?Sized + Send + Sync + 'static,
{
    registry
        .clear::<H>()
        .map_err(|_| MessagingError::ClearDuringDispatch {
            payload: type_name::<H>(),
        })
}
