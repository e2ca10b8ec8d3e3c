use crate::core::context::StepContext;
use crate::core::lock;
use log::{error, trace};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a task did not produce a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task was cancelled before it ran")]
    Cancelled,

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was dropped before it ran")]
    Abandoned,
}

enum TaskState<V> {
    Pending,
    Running,
    Cancelled,
    Finished(Result<V, TaskError>),
    Taken,
}

/// Result slot shared between a queued task and its handle
struct TaskSlot<V> {
    state: Mutex<TaskState<V>>,
    done: Condvar,
}

impl<V> TaskSlot<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Pending),
            done: Condvar::new(),
        }
    }

    /// Pending -> Running. False if the task was cancelled first.
    fn begin(&self) -> bool {
        let mut state = lock(&self.state);
        match *state {
            TaskState::Pending => {
                *state = TaskState::Running;
                true
            }
            _ => false,
        }
    }

    fn finish(&self, result: Result<V, TaskError>) {
        let mut state = lock(&self.state);
        if matches!(*state, TaskState::Pending | TaskState::Running) {
            *state = TaskState::Finished(result);
        }
        self.done.notify_all();
    }

    fn take(state: &mut TaskState<V>) -> Option<Result<V, TaskError>> {
        match std::mem::replace(state, TaskState::Taken) {
            TaskState::Finished(result) => Some(result),
            TaskState::Cancelled => {
                *state = TaskState::Cancelled;
                Some(Err(TaskError::Cancelled))
            }
            TaskState::Taken => Some(Err(TaskError::Abandoned)),
            other => {
                *state = other;
                None
            }
        }
    }
}

/// Type-erased queued task
pub(crate) trait Runnable: Send {
    /// Claims the task for execution; false if it was cancelled
    fn begin(&self) -> bool;

    /// Runs the payload and publishes its outcome
    fn run(self: Box<Self>, ctx: &mut StepContext<'_>);
}

struct Task<V, F> {
    payload: Option<F>,
    slot: Arc<TaskSlot<V>>,
}

impl<V, F> Runnable for Task<V, F>
where
    V: Send + 'static,
    F: FnOnce(&mut StepContext<'_>) -> V + Send + 'static,
{
    fn begin(&self) -> bool {
        self.slot.begin()
    }

    fn run(mut self: Box<Self>, ctx: &mut StepContext<'_>) {
        let payload = match self.payload.take() {
            Some(payload) => payload,
            None => return,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| payload(ctx)));
        let result = outcome.map_err(|cause| {
            let message = panic_message(cause.as_ref());
            error!("Enqueued task panicked: {}", message);
            TaskError::Panicked(message)
        });
        self.slot.finish(result);
    }
}

impl<V, F> Drop for Task<V, F> {
    fn drop(&mut self) {
        if self.payload.is_some() {
            // Never ran: the queue was cleared or the task was skipped
            let mut state = lock(&self.slot.state);
            if matches!(*state, TaskState::Pending) {
                *state = TaskState::Finished(Err(TaskError::Abandoned));
            }
            self.slot.done.notify_all();
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Future-like handle to the outcome of an enqueued task.
///
/// Waiting blocks until the owning thread drains the queue at its next
/// step; waiting on the owning thread itself before calling `update` never
/// returns.
pub struct TaskHandle<V> {
    slot: Arc<TaskSlot<V>>,
}

impl<V> TaskHandle<V> {
    /// Cancels the task if it has not started. Returns whether it was cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = lock(&self.slot.state);
        match *state {
            TaskState::Pending => {
                *state = TaskState::Cancelled;
                self.slot.done.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Returns whether the task was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(*lock(&self.slot.state), TaskState::Cancelled)
    }

    /// Returns whether the task completed in any way (ran, failed, cancelled, abandoned)
    pub fn is_done(&self) -> bool {
        !matches!(*lock(&self.slot.state), TaskState::Pending | TaskState::Running)
    }

    /// Blocks until the task completes and returns its outcome
    pub fn wait(self) -> Result<V, TaskError> {
        let mut state = lock(&self.slot.state);
        loop {
            if let Some(result) = TaskSlot::take(&mut state) {
                return result;
            }
            state = self
                .slot
                .done
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Waits up to `timeout` for the outcome. A task still pending at the
    /// deadline gives the handle back so it can be waited on again.
    pub fn wait_timeout(self, timeout: Duration) -> std::result::Result<Result<V, TaskError>, Self> {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.slot.state);
        loop {
            if let Some(result) = TaskSlot::take(&mut state) {
                return Ok(result);
            }
            let now = Instant::now();
            if now >= deadline {
                drop(state);
                return Err(self);
            }
            state = self
                .slot
                .done
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .0;
        }
    }
}

impl<V> fmt::Debug for TaskHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("done", &self.is_done())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// FIFO of work to run at the next pre-tick of one space.
///
/// Any thread may push; only the step driving the space drains. A drain
/// takes the whole queue at once, so tasks pushed while draining run at the
/// following step.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Arc<Mutex<VecDeque<Box<dyn Runnable>>>>,
}

impl TaskQueue {
    /// Creates a new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `work` and returns a handle to its outcome
    pub fn push<V, F>(&self, work: F) -> TaskHandle<V>
    where
        V: Send + 'static,
        F: FnOnce(&mut StepContext<'_>) -> V + Send + 'static,
    {
        let slot = Arc::new(TaskSlot::new());
        let task = Task {
            payload: Some(work),
            slot: Arc::clone(&slot),
        };
        lock(&self.tasks).push_back(Box::new(task));
        TaskHandle { slot }
    }

    /// Returns the number of queued tasks, cancelled ones included
    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Returns whether the queue is empty
    pub fn is_empty(&self) -> bool {
        lock(&self.tasks).is_empty()
    }

    /// Drops every queued task; their handles resolve to `Abandoned`
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *lock(&self.tasks));
        drop(dropped);
    }

    /// Runs every task queued at this instant. Returns how many ran.
    pub(crate) fn drain(&self, ctx: &mut StepContext<'_>) -> usize {
        let batch = std::mem::take(&mut *lock(&self.tasks));
        let mut ran = 0;
        for task in batch {
            if !task.begin() {
                trace!("Skipping cancelled task");
                continue;
            }
            task.run(ctx);
            ran += 1;
        }
        ran
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}
