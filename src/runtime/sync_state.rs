//! Rust model of the SyncState primitive behind go-bindings.
//!
//! Mirrors the emitted Go support code: a one-slot channel written once by
//! the dispatched task, and a once-gate so that exactly one first reader
//! performs the receive while concurrent first readers wait for it.

use log::warn;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc::{sync_channel, Receiver, SyncSender},
        Arc, Mutex, OnceLock,
    },
    thread::{self, JoinHandle},
};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("dispatched task failed: {0}")]
    Failed(String),
    #[error("sync state was already settled")]
    AlreadySettled,
}

#[derive(Clone, Debug)]
enum Outcome<T> {
    Value(T),
    Failed(String),
}

pub struct SyncState<T> {
    sender: SyncSender<Outcome<T>>,
    receiver: Mutex<Receiver<Outcome<T>>>,
    outcome: OnceLock<Outcome<T>>,
    settled: AtomicBool,
    receives: AtomicUsize,
}

impl<T> Default for SyncState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncState<T> {
    pub fn new() -> Self {
        let (sender, receiver) = sync_channel(1);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            outcome: OnceLock::new(),
            settled: AtomicBool::new(false),
            receives: AtomicUsize::new(0),
        }
    }

    pub fn put(&self, value: T) -> Result<(), SyncError> {
        self.settle(Outcome::Value(value))
    }

    pub fn fail(&self, failure: impl Into<String>) -> Result<(), SyncError> {
        self.settle(Outcome::Failed(failure.into()))
    }

    fn settle(&self, outcome: Outcome<T>) -> Result<(), SyncError> {
        if self.settled.swap(true, Ordering::AcqRel) {
            return Err(SyncError::AlreadySettled);
        }
        // Capacity one and a single writer: never blocks, and the receiver
        // lives as long as `self`.
        self.sender
            .send(outcome)
            .map_err(|_| SyncError::Failed("sync state receiver dropped".into()))
    }

    /// Number of channel receives performed so far; at most one.
    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::Acquire)
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

impl<T: Clone> SyncState<T> {
    /// Blocks until the task delivers, then returns the memoized outcome on
    /// this and every later call.
    pub fn get(&self) -> Result<T, SyncError> {
        let outcome = self.outcome.get_or_init(|| {
            self.receives.fetch_add(1, Ordering::AcqRel);
            let receiver = match self.receiver.lock() {
                Ok(receiver) => receiver,
                Err(poisoned) => poisoned.into_inner(),
            };
            receiver
                .recv()
                .unwrap_or_else(|_| Outcome::Failed("sync state sender dropped".into()))
        });
        match outcome {
            Outcome::Value(value) => Ok(value.clone()),
            Outcome::Failed(message) => Err(SyncError::Failed(message.clone())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

fn deliver<T>(state: &SyncState<T>, value: T) {
    if let Err(err) = state.put(value) {
        warn!("dropping task result: {err}");
    }
}

fn fan_out<T>(state: &SyncState<T>, message: &str) {
    if let Err(err) = state.fail(message) {
        warn!("dropping task failure: {err}");
    }
}

/// Runs `task` on its own thread and delivers its result to `state`, the
/// way a lowered single-name go-binding does.
pub fn dispatch<T, F>(state: Arc<SyncState<T>>, task: F) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::spawn(move || match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(value) => deliver(&state, value),
        Err(payload) => fan_out(&state, &panic_message(payload.as_ref())),
    })
}

/// Two-name form: a failure reaches both states.
pub fn dispatch2<A, B, F>(
    states: (Arc<SyncState<A>>, Arc<SyncState<B>>),
    task: F,
) -> JoinHandle<()>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    F: FnOnce() -> (A, B) + Send + 'static,
{
    let (first, second) = states;
    thread::spawn(move || match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok((a, b)) => {
            deliver(&first, a);
            deliver(&second, b);
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            fan_out(&first, &message);
            fan_out(&second, &message);
        }
    })
}
