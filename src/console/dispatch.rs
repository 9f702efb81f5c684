//! Owner-thread task queue.
//!
//! Display state is only ever mutated by whoever holds it exclusively. Other
//! threads post closures through a [`DispatchHandle`]; the holder runs them
//! the next time it calls [`Dispatcher::drain`].
//!
//! The owner thread is the one that created the dispatcher or, after the
//! dispatcher has been moved, the one that last drained it.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, ThreadId};

type Task<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Queue of work for the owner thread
pub struct Dispatcher<T> {
    owner: ThreadId,
    tx: Sender<Task<T>>,
    rx: Receiver<Task<T>>,
}

/// Cloneable, `Send` handle for posting work to a [`Dispatcher`]
pub struct DispatchHandle<T> {
    tx: Sender<Task<T>>,
}

impl<T> Clone for DispatchHandle<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> DispatchHandle<T> {
    /// Queue a task. Returns false if the dispatcher is gone.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

impl<T> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Dispatcher<T> {
    /// Create a dispatcher owned by the calling thread
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            owner: thread::current().id(),
            tx,
            rx,
        }
    }

    /// Whether the caller is the current owner thread
    pub fn check_access(&self) -> bool {
        thread::current().id() == self.owner
    }

    pub fn handle(&self) -> DispatchHandle<T> {
        DispatchHandle { tx: self.tx.clone() }
    }

    /// Post a task from anywhere
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let _ = self.tx.send(Box::new(task));
    }

    /// Run every queued task against `target`, in posting order.
    ///
    /// Exclusive access makes the calling thread the owner. Returns the
    /// number of tasks run.
    pub fn drain(&mut self, target: &mut T) -> usize {
        self.owner = thread::current().id();
        let mut count = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(target);
            count += 1;
        }
        count
    }
}
