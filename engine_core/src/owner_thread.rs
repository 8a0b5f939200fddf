//! Executor that serializes work onto one owning thread.
//!
//! The owner is created on the thread that must run the work (the simulation
//! thread) and drains queued tasks with [`OwnerThread::pump`]. Any thread can
//! hold an [`OwnerHandle`] and either `post` (fire-and-forget) or `send`
//! (block until the owner has run the task).
//!
//! A panicking task never takes the owner down. It is logged and kept as the
//! executor's last panic until someone takes it.

use std::any::Any;
use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::logging;

const LOG_TARGET: &str = "owner_thread";

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The owning thread dropped its executor; the task will never run.
    Closed,
    /// The task panicked while running on the owning thread.
    Panicked,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Closed => write!(f, "owner thread closed"),
            DispatchError::Panicked => write!(f, "task panicked on owner thread"),
        }
    }
}

impl std::error::Error for DispatchError {}

pub struct OwnerThread {
    receiver: Mutex<mpsc::Receiver<Task>>,
    handle: OwnerHandle,
}

#[derive(Clone)]
pub struct OwnerHandle {
    owner: ThreadId,
    sender: mpsc::Sender<Task>,
    pending: Arc<AtomicUsize>,
    last_panic: Arc<Mutex<Option<String>>>,
}

impl OwnerThread {
    /// Captures the calling thread as the owner.
    pub fn capture() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            receiver: Mutex::new(receiver),
            handle: OwnerHandle {
                owner: thread::current().id(),
                sender,
                pending: Arc::new(AtomicUsize::new(0)),
                last_panic: Arc::new(Mutex::new(None)),
            },
        }
    }

    pub fn handle(&self) -> OwnerHandle {
        self.handle.clone()
    }

    pub fn pending(&self) -> usize {
        self.handle.pending.load(Ordering::Relaxed)
    }

    /// Message of the most recent task panic, if any.
    pub fn last_panic(&self) -> Option<String> {
        lock_unpoisoned(&self.handle.last_panic).clone()
    }

    pub fn take_last_panic(&self) -> Option<String> {
        lock_unpoisoned(&self.handle.last_panic).take()
    }

    /// Runs every queued task; returns how many ran. Must be called on the
    /// owning thread, otherwise nothing runs.
    pub fn pump(&self) -> usize {
        if !self.handle.is_owner_thread() {
            return 0;
        }
        let receiver = lock_unpoisoned(&self.receiver);
        let mut count = 0usize;
        loop {
            match receiver.try_recv() {
                Ok(task) => {
                    self.handle.pending.fetch_sub(1, Ordering::Relaxed);
                    self.handle.run_guarded(task);
                    count = count.saturating_add(1);
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }
        count
    }
}

impl OwnerHandle {
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Queues `task` for the owning thread and returns immediately.
    pub fn post<F>(&self, task: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.sender.send(Box::new(task)).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Relaxed);
            DispatchError::Closed
        })
    }

    /// Runs `task` on the owning thread and blocks until it finished.
    ///
    /// Called from the owning thread itself, the task runs inline so the
    /// caller cannot deadlock waiting on its own pump.
    pub fn send<R, F>(&self, task: F) -> Result<R, DispatchError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_owner_thread() {
            return panic::catch_unwind(panic::AssertUnwindSafe(task)).map_err(|payload| {
                self.record_panic(payload.as_ref());
                DispatchError::Panicked
            });
        }
        let last_panic = Arc::clone(&self.last_panic);
        let (reply_tx, reply_rx) = mpsc::sync_channel::<Result<R, DispatchError>>(1);
        self.post(move || {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(task)).map_err(|payload| {
                store_panic(&last_panic, payload.as_ref());
                DispatchError::Panicked
            });
            let _ = reply_tx.send(result);
        })?;
        match reply_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Closed),
        }
    }
}

impl OwnerHandle {
    fn run_guarded(&self, task: Task) {
        if let Err(payload) = panic::catch_unwind(panic::AssertUnwindSafe(task)) {
            self.record_panic(payload.as_ref());
        }
    }

    fn record_panic(&self, payload: &(dyn Any + Send)) {
        store_panic(&self.last_panic, payload);
    }
}

fn store_panic(slot: &Mutex<Option<String>>, payload: &(dyn Any + Send)) {
    let message = format!("owner thread task panic ({})", payload_text(payload));
    logging::error(LOG_TARGET, &message);
    *lock_unpoisoned(slot) = Some(message);
}

fn payload_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        *text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "non-string payload"
    }
}

/// A panicking task must not wedge the executor's own locks.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
