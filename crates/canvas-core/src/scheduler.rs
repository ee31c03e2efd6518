//! Timer port for the debounce
//!
//! The controller never touches a clock directly. It asks a [`Scheduler`]
//! to run a task after a delay and cancels it when a newer edit arrives.
//! [`TokioScheduler`] backs this with `tokio::time`; [`ManualScheduler`]
//! keeps a virtual clock that tests advance explicitly.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Task run when a timer fires
pub type Task = Box<dyn FnOnce() + Send>;

/// Handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

/// Delayed task execution
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Cancel a timer. Returns false if it already fired or never existed.
    fn cancel(&self, handle: TimerHandle) -> bool;
}

struct ManualTimer {
    handle: TimerHandle,
    deadline: Duration,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    timers: Vec<ManualTimer>,
}

/// Scheduler driven by an explicit virtual clock
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
    next_id: AtomicU64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since creation
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Move the clock forward and fire every timer that became due, in
    /// deadline order. Tasks run without the scheduler lock held, so they
    /// may schedule or cancel timers; timers they schedule fire in the same
    /// call if they fall inside the window. Returns the number fired.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.state.lock().now + delta;
        let mut fired = 0;

        loop {
            let due = {
                let mut state = self.state.lock();
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.handle))
                    .map(|(i, _)| i);
                match next {
                    Some(i) => {
                        let timer = state.timers.remove(i);
                        state.now = timer.deadline;
                        Some(timer.task)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match due {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => break,
            }
        }

        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state.lock();
        let deadline = state.now + delay;
        state.timers.push(ManualTimer {
            handle,
            deadline,
            task,
        });
        handle
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let mut state = self.state.lock();
        let before = state.timers.len();
        state.timers.retain(|t| t.handle != handle);
        state.timers.len() != before
    }
}

/// Scheduler backed by the tokio timer
///
/// Must be used from within a tokio runtime.
#[derive(Default)]
pub struct TokioScheduler {
    tasks: std::sync::Arc<Mutex<HashMap<TimerHandle, tokio::task::JoinHandle<()>>>>,
    next_id: AtomicU64,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tasks = self.tasks.clone();

        // Hold the lock across spawn so the task cannot finish and remove
        // itself before it has been registered.
        let mut guard = self.tasks.lock();
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tasks.lock().remove(&handle).is_some() {
                task();
            }
        });
        guard.insert(handle, join);
        handle
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        match self.tasks.lock().remove(&handle) {
            Some(join) => {
                join.abort();
                true
            }
            None => false,
        }
    }
}
