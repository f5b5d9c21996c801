//! FIFO task queue drained by a single worker.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct QueueState<T> {
    tasks: VecDeque<T>,
    busy: bool,
    closed: bool,
}

/// Multi-producer queue with one consumer that reports when it is idle.
pub(crate) struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    idle: Condvar,
}

impl<T> TaskQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                busy: false,
                closed: false,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    /// Enqueue a task. Returns `false` once the queue is closed.
    pub(crate) fn push(&self, task: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.tasks.push_back(task);
        self.available.notify_one();
        true
    }

    /// Block until a task is available and mark the consumer busy. `None`
    /// once the queue is closed.
    pub(crate) fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(task) = state.tasks.pop_front() {
                state.busy = true;
                return Some(task);
            }
            self.available.wait(&mut state);
        }
    }

    /// Mark the task returned by the last `pop` as done.
    pub(crate) fn finish(&self) {
        let mut state = self.state.lock();
        state.busy = false;
        if state.tasks.is_empty() {
            self.idle.notify_all();
        }
    }

    /// Wait until the queue is empty and no task is running. Returns `false`
    /// on timeout.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.busy || !state.tasks.is_empty() {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return !state.busy && state.tasks.is_empty();
            }
        }
        true
    }

    /// Drop pending tasks and wake the consumer so it can exit.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.tasks.clear();
        self.available.notify_all();
        self.idle.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }
}
