//! Type-keyed message and request registries.
//!
//! Messages are broadcast by reference to every registered [`Handler`];
//! requests are owned by the caller and fulfilled in place by every
//! [`Responder`]. Cross-thread callers hand work to the owning thread through
//! [`MessageBus::post`] (non-blocking) and [`MessageBus::send`] (blocking).
#![forbid(unsafe_code)]

mod bus;
mod registry;
mod subscriptions;

pub use bus::{
    Handler, Message, MessageBus, MessagingError, Registration, Request, Responder,
};
pub use engine_core::owner_thread::{DispatchError, OwnerHandle, OwnerThread};
pub use subscriptions::{Subscriber, Subscriptions};
